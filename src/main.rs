use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pedigree_engine::{
    config::EngineConfig,
    extract::{CancelSignal, ExtractionInput, ExtractionParser},
    pipeline::PedigreePipeline,
    reports::formatter_for,
    schema,
    schema::record::SourceKind,
    types::{ConflictSeverity, SessionReport},
};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pedigree-engine")]
#[command(about = "Family health history extraction and inheritance-pattern analysis")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full analysis session on raw input
    Analyze {
        /// Input file (structured JSON or free text); reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Source of free-text input (conversation, document)
        #[arg(short, long, default_value = "conversation")]
        source: String,

        /// Output format (json, markdown, text)
        #[arg(short = 'o', long, default_value = "markdown")]
        output: String,

        /// Output file path (defaults to stdout)
        #[arg(short = 'f', long)]
        output_file: Option<PathBuf>,
    },

    /// Extract a pedigree record without running pattern analysis
    Extract {
        /// Input file (structured JSON or free text); reads stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Source of free-text input (conversation, document)
        #[arg(short, long, default_value = "conversation")]
        source: String,

        /// Output file path (defaults to stdout)
        #[arg(short = 'f', long)]
        output_file: Option<PathBuf>,
    },

    /// Validate a stored pedigree record and list structural conflicts
    Validate {
        /// Record file (JSON, any supported schema version)
        input: PathBuf,
    },

    /// Migrate a stored payload to the current schema version
    Migrate {
        /// Record file (JSON, any supported schema version)
        input: PathBuf,

        /// Output file path (defaults to stdout)
        #[arg(short = 'f', long)]
        output_file: Option<PathBuf>,
    },

    /// Health check of the configured collaborators
    HealthCheck,

    /// Initialize configuration file
    Init {
        /// Configuration file path
        #[arg(short, long, default_value = "pedigree-engine.yml")]
        config_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level)?;

    let config = load_config(cli.config.as_ref()).await?;

    match cli.command {
        Commands::Analyze {
            input,
            source,
            output,
            output_file,
        } => {
            analyze(config, input, source, output, output_file).await?;
        }

        Commands::Extract {
            input,
            source,
            output_file,
        } => {
            extract(config, input, source, output_file).await?;
        }

        Commands::Validate { input } => {
            validate(config, input).await?;
        }

        Commands::Migrate { input, output_file } => {
            migrate(input, output_file).await?;
        }

        Commands::HealthCheck => {
            health_check(config).await?;
        }

        Commands::Init { config_file } => {
            init_config(config_file).await?;
        }
    }

    Ok(())
}

/// Initialize tracing with the specified log level
fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("Failed to create env filter")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}

/// Load configuration from file, or from PEDIGREE_* environment variables
async fn load_config(config_path: Option<&PathBuf>) -> Result<EngineConfig> {
    if let Some(path) = config_path {
        if path.exists() {
            info!("Loading configuration from: {:?}", path);
            return EngineConfig::load_from_file(path)
                .await
                .with_context(|| format!("Failed to load config file: {:?}", path));
        }
        warn!("Configuration file not found: {:?}. Using defaults.", path);
    }

    EngineConfig::load_from_env().context("Failed to load configuration from environment")
}

/// Read raw input from a file or stdin and classify it. Content that parses
/// as a JSON object goes down the structured path; everything else is
/// treated as recognized text from the given source.
async fn read_input(input: Option<&PathBuf>, source: &str) -> Result<ExtractionInput> {
    let content = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read input file: {:?}", path))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("Failed to read input from stdin")?;
            buffer
        }
    };

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
        if value.is_object() {
            return Ok(ExtractionInput::Structured(value));
        }
    }

    let kind = match source.to_lowercase().as_str() {
        "conversation" => SourceKind::Conversation,
        "document" => SourceKind::Document,
        other => anyhow::bail!("Unknown input source '{}' (expected conversation or document)", other),
    };

    Ok(ExtractionInput::RecognizedText {
        text: content,
        source: kind,
    })
}

/// Run the full pipeline and emit a formatted session report
async fn analyze(
    config: EngineConfig,
    input: Option<PathBuf>,
    source: String,
    output_format: String,
    output_file: Option<PathBuf>,
) -> Result<()> {
    let extraction_input = read_input(input.as_ref(), &source).await?;

    let pipeline = PedigreePipeline::new(config).context("Failed to create pipeline")?;

    let report = pipeline
        .run_session(extraction_input, CancelSignal::never())
        .await
        .context("Analysis session failed")?;

    output_report(&report, &output_format, output_file.as_ref()).await?;

    info!("Analysis completed");
    Ok(())
}

/// Extraction only: parse input into a normalized record and print it with
/// its extraction report
async fn extract(
    config: EngineConfig,
    input: Option<PathBuf>,
    source: String,
    output_file: Option<PathBuf>,
) -> Result<()> {
    let extraction_input = read_input(input.as_ref(), &source).await?;

    let parser = ExtractionParser::new(&config).context("Failed to create extraction parser")?;

    let outcome = parser
        .extract(extraction_input, CancelSignal::never())
        .await
        .context("Extraction failed")?;

    let content = serde_json::to_string_pretty(&serde_json::json!({
        "record": outcome.record,
        "extraction": outcome.report,
    }))?;

    write_output(&content, output_file.as_ref()).await?;

    info!("Extraction completed");
    Ok(())
}

/// Validate a stored record: normalize it, then list every structural
/// conflict with its severity
async fn validate(config: EngineConfig, input: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read record file: {:?}", input))?;
    let raw: serde_json::Value =
        serde_json::from_str(&content).context("Record file is not valid JSON")?;

    let (record, messages) =
        schema::normalize(&raw).context("Record could not be normalized")?;

    for message in &messages {
        println!(
            "{}: {}",
            if message.is_error() { "error" } else { "warning" },
            message.message
        );
    }

    let pipeline = PedigreePipeline::new(config).context("Failed to create pipeline")?;
    let conflicts = pipeline.validate_record(&record);

    if conflicts.is_empty() {
        println!("No structural conflicts found ({} individuals)", record.individuals.len());
        return Ok(());
    }

    let blocking = conflicts
        .iter()
        .filter(|c| c.severity == ConflictSeverity::Blocking)
        .count();

    for conflict in &conflicts {
        let severity = match conflict.severity {
            ConflictSeverity::Blocking => "blocking",
            ConflictSeverity::Advisory => "advisory",
        };
        println!("[{}] conflict {}: {}", severity, conflict.id, conflict.description);
    }

    println!(
        "{} conflict(s): {} blocking, {} advisory",
        conflicts.len(),
        blocking,
        conflicts.len() - blocking
    );

    if blocking > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Migrate a stored payload to the current schema version and write the
/// normalized record
async fn migrate(input: PathBuf, output_file: Option<PathBuf>) -> Result<()> {
    let content = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read record file: {:?}", input))?;
    let raw: serde_json::Value =
        serde_json::from_str(&content).context("Record file is not valid JSON")?;

    let (record, messages) = schema::normalize(&raw).context("Migration failed")?;

    for message in &messages {
        warn!("{}", message.message);
    }

    let serialized = serde_json::to_string_pretty(&record)?;
    write_output(&serialized, output_file.as_ref()).await?;

    info!(
        "Migrated record to schema version {}",
        schema::CURRENT_SCHEMA_VERSION
    );
    Ok(())
}

/// Check availability of the configured collaborators
async fn health_check(config: EngineConfig) -> Result<()> {
    info!("Performing health check");

    let pipeline = PedigreePipeline::new(config).context("Failed to create pipeline")?;
    let status = pipeline.health_check().await;

    println!(
        "System Status: {}",
        if status.healthy { "Healthy" } else { "Unhealthy" }
    );
    for component in &status.components {
        println!(
            "  {}: {}",
            component.name,
            if component.healthy { "ok" } else { "unavailable" }
        );
    }

    if !status.healthy {
        std::process::exit(1);
    }

    Ok(())
}

/// Write a default configuration file
async fn init_config(config_file: PathBuf) -> Result<()> {
    if config_file.exists() {
        anyhow::bail!("Configuration file already exists: {:?}", config_file);
    }

    EngineConfig::default()
        .save_to_file(&config_file)
        .await
        .with_context(|| format!("Failed to write configuration file: {:?}", config_file))?;

    println!("Configuration file created: {:?}", config_file);
    println!("Edit this file to customize extraction and validation behavior.");

    Ok(())
}

/// Format a session report and write it to a file or stdout
async fn output_report(
    report: &SessionReport,
    format: &str,
    output_file: Option<&PathBuf>,
) -> Result<()> {
    let formatter = formatter_for(format)?;
    let content = formatter.format(report)?;
    write_output(&content, output_file).await
}

async fn write_output(content: &str, output_file: Option<&PathBuf>) -> Result<()> {
    if let Some(path) = output_file {
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write output to: {:?}", path))?;
        info!("Output written to: {:?}", path);
    } else {
        println!("{}", content);
    }
    Ok(())
}
