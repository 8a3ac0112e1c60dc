use std::path::PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crate::config::{self, AttestConfig, ProviderKind};
use crate::errors::AttestError;

#[derive(Parser)]
#[command(name = "attest", version, about = "AI-assisted audit compliance engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log line format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP REST API server
    Serve(ServeArgs),
    /// Evaluate one evidence document against its requirements
    Check(CheckArgs),
    /// Evaluate a document against the other active frameworks
    Fanout(FanoutArgs),
    /// Run a SEBI auditor report for an audit
    Sebi(SebiArgs),
    /// Load frameworks, requirements and audits from a YAML catalog
    Import(ImportArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Options every command shares; flags win over the config file.
#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// SQLite database path
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// LLM provider: ollama, openai-compatible
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// LLM model identifier
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// LLM endpoint base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

impl GlobalArgs {
    pub async fn load_config(&self) -> Result<AttestConfig, AttestError> {
        let path = self.config.as_ref().map(PathBuf::from);
        let config = config::load_or_default(path.as_deref()).await?;
        self.apply(config)
    }

    pub fn apply(&self, mut config: AttestConfig) -> Result<AttestConfig, AttestError> {
        if let Some(raw) = &self.provider {
            config.llm.provider = ProviderKind::parse(raw)
                .ok_or_else(|| AttestError::Config(format!("Unknown LLM provider: {}", raw)))?;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.llm.base_url = base_url.clone();
        }
        if let Some(db) = &self.db {
            config.database = Some(db.clone());
        }
        Ok(config)
    }
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Listen port
    #[arg(long, default_value = "8080")]
    pub port: u16,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Max concurrent background jobs
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Clone)]
pub struct CheckArgs {
    /// Tenant the audit belongs to
    #[arg(long, default_value = "1")]
    pub tenant: i64,

    /// Audit ID
    #[arg(long)]
    pub audit: i64,

    /// Evidence document ID
    #[arg(long)]
    pub document: i64,

    /// Restrict to these compliance IDs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub compliance: Vec<i64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct FanoutArgs {
    #[arg(long, default_value = "1")]
    pub tenant: i64,

    /// Evidence document ID
    #[arg(long)]
    pub document: i64,

    /// Framework the document was uploaded under
    #[arg(long)]
    pub framework: i64,

    /// Audit ID, for logging and notifications
    #[arg(long)]
    pub audit: Option<i64>,

    /// Target frameworks (comma-separated); defaults to every other active framework
    #[arg(long, value_delimiter = ',')]
    pub targets: Vec<i64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct SebiArgs {
    /// Report: filing-accuracy, timeliness-sla, risk-score, patterns, evidence-pack, dashboard
    pub report: String,

    #[arg(long, default_value = "1")]
    pub tenant: i64,

    /// Audit ID
    #[arg(long)]
    pub audit: i64,

    /// Target document for filing-accuracy
    #[arg(long)]
    pub document: Option<i64>,

    /// Evidence pack use case: sebi_inspection, adjudication, investor_grievance, enforcement
    #[arg(long)]
    pub use_case: Option<String>,

    /// Signals JSON file with externally computed risk inputs
    #[arg(long)]
    pub signals: Option<String>,
}

#[derive(Args, Clone)]
pub struct ImportArgs {
    /// Catalog YAML file
    pub file: String,

    #[arg(long, default_value = "1")]
    pub tenant: i64,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
