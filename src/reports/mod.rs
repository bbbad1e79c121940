pub mod aggregator;
pub mod formatters;

pub use aggregator::RiskAggregator;
pub use formatters::{
    formatter_for, JsonFormatter, MarkdownFormatter, ReportFormatter, TextFormatter,
};
