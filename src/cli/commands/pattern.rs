//! Learned pattern CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::FleetResult;
use crate::domain::ids::PatternId;
use crate::domain::models::LearnedPattern;
use crate::service::FleetService;
use crate::services::PatternTypeMetrics;

#[derive(Args, Debug)]
pub struct PatternArgs {
    #[command(subcommand)]
    pub command: PatternCommands,
}

#[derive(Subcommand, Debug)]
pub enum PatternCommands {
    /// List patterns of a given type
    List { pattern_type: String },
    /// Record a new learned pattern
    Create {
        pattern_type: String,
        approach: String,
        #[arg(short, long, value_delimiter = ',')]
        trigger_words: Vec<String>,
    },
    /// Show a single pattern
    Show { id: String },
    /// Permanently remove a pattern
    Delete { id: String },
    /// Counts, average effectiveness, total usage, and trend per pattern type
    Metrics,
}

#[derive(Debug, Serialize)]
pub struct PatternOutput {
    pub id: String,
    pub pattern_type: String,
    pub trigger_words: Vec<String>,
    pub approach: String,
    pub effectiveness: f64,
    pub usage_count: u32,
    pub version: u32,
    pub archived: bool,
}

impl From<&LearnedPattern> for PatternOutput {
    fn from(p: &LearnedPattern) -> Self {
        Self {
            id: p.id.to_string(),
            pattern_type: p.pattern_type.clone(),
            trigger_words: p.trigger_words.clone(),
            approach: p.approach.clone(),
            effectiveness: p.effectiveness.0,
            usage_count: p.usage_count,
            version: p.version,
            archived: p.archived,
        }
    }
}

impl CommandOutput for PatternOutput {
    fn to_human(&self) -> String {
        format!(
            "{} [{}] effectiveness={:.2} usage={} v{}{}",
            self.id,
            self.pattern_type,
            self.effectiveness,
            self.usage_count,
            self.version,
            if self.archived { " (archived)" } else { "" }
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl CommandOutput for PatternTypeMetrics {
    fn to_human(&self) -> String {
        format!(
            "{}: {} pattern(s), avg_effectiveness={:.2}, total_usage={}, trend={}",
            self.pattern_type, self.pattern_count, self.avg_effectiveness, self.total_usage, self.trend
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsListOutput {
    pub metrics: Vec<PatternTypeMetrics>,
}

impl CommandOutput for MetricsListOutput {
    fn to_human(&self) -> String {
        if self.metrics.is_empty() {
            return "No pattern metrics yet.".to_string();
        }
        self.metrics.iter().map(PatternTypeMetrics::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct PatternListOutput {
    pub patterns: Vec<PatternOutput>,
}

impl CommandOutput for PatternListOutput {
    fn to_human(&self) -> String {
        if self.patterns.is_empty() {
            return "No patterns found.".to_string();
        }
        self.patterns.iter().map(PatternOutput::to_human).collect::<Vec<_>>().join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn run(args: PatternArgs, service: &FleetService, json: bool) -> FleetResult<()> {
    match args.command {
        PatternCommands::List { pattern_type } => {
            let patterns = service.list_patterns(&pattern_type).await?;
            output(&PatternListOutput { patterns: patterns.iter().map(PatternOutput::from).collect() }, json);
        }
        PatternCommands::Create { pattern_type, approach, trigger_words } => {
            let pattern = service.create_pattern(&pattern_type, trigger_words, &approach).await?;
            output(&PatternOutput::from(&pattern), json);
        }
        PatternCommands::Show { id } => {
            let id: PatternId = id.parse()?;
            let pattern =
                service.get_pattern(id).await?.ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("pattern {id}")))?;
            output(&PatternOutput::from(&pattern), json);
        }
        PatternCommands::Delete { id } => {
            let id: PatternId = id.parse()?;
            service.delete_pattern(id).await?;
        }
        PatternCommands::Metrics => {
            let metrics = service.get_learning_metrics().await?;
            output(&MetricsListOutput { metrics }, json);
        }
    }
    Ok(())
}
