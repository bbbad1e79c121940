pub mod autosomal;
pub mod mitochondrial;
pub mod rules;
pub mod x_linked;

pub use rules::{Classification, ConditionView, PatternEvaluator, RuleEngine, ViewMember};
