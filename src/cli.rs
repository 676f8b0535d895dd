//! Command-line surface
//!
//! Each subcommand maps onto one orchestrator entry point. The catalog and
//! the confirmation channel are passed in so the whole surface can run
//! against the in-memory catalog.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::catalog::UpdateRepository;
use crate::cleanup::{
    CleanupSummary, Confirm, DeclineMode, Orchestrator, PassKind, PatternOutcome, PatternStatus,
    SupersessionReport, SurveyLine,
};
use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "catalog-sweep")]
#[command(author, version, about = "Declines obsolete and superseded updates in an update catalog")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "catalog-sweep.toml")]
    pub config: String,

    /// Catalog admin API URL (overrides config file)
    #[arg(long, env = "CATALOG_SWEEP_URL")]
    pub url: Option<String>,

    /// API token (overrides config file)
    #[arg(long, env = "CATALOG_SWEEP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Decline without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Log every decline
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply flag and environment overrides on top of the file config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.catalog.url = url.clone();
        }
        if let Some(token) = &self.token {
            config.catalog.api_token = Some(token.clone());
        }
    }

    pub fn mode(&self) -> DeclineMode {
        if self.yes {
            DeclineMode::Forced
        } else {
            DeclineMode::Interactive
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Title, product and driver passes followed by supersession
    DeepClean,

    /// Decline updates superseded by an approved update
    Supersede {
        /// Repeat until a pass declines nothing (bounded by supersession.max_passes)
        #[arg(long)]
        until_stable: bool,
    },

    /// Decline approved updates whose title matches a configured pattern
    DeclineTitles,

    /// Decline approved updates whose product matches a configured pattern
    DeclineProducts,

    /// Decline approved driver updates, without confirmation
    DeclineDrivers,

    /// Count approved matches for every pattern; declines nothing
    Count,

    /// Print the effective configuration
    ShowConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Execute a subcommand and render its report
pub async fn execute<R>(
    cli: &Cli,
    config: &Config,
    repo: &R,
    confirm: &dyn Confirm,
) -> anyhow::Result<String>
where
    R: UpdateRepository + ?Sized,
{
    let plan = config.cleanup_plan()?;
    let orchestrator = Orchestrator::new(repo, confirm).with_verbose(cli.verbose);
    let mode = cli.mode();

    let summary = match &cli.command {
        Commands::DeepClean => orchestrator.deep_clean(&plan, mode).await?,
        Commands::Supersede { until_stable } => {
            orchestrator
                .supersede_only(*until_stable, config.supersession.max_passes)
                .await?
        }
        Commands::DeclineTitles => orchestrator.run_pass(&plan, PassKind::Titles, mode).await?,
        Commands::DeclineProducts => orchestrator.run_pass(&plan, PassKind::Products, mode).await?,
        Commands::DeclineDrivers => {
            orchestrator
                .run_pass(&plan, PassKind::Classifications, DeclineMode::Forced)
                .await?
        }
        Commands::Count => {
            let lines = orchestrator.survey(&plan).await?;
            return render(cli.format, lines.as_slice(), format_survey);
        }
        Commands::ShowConfig => {
            return config.to_toml().context("Failed to render configuration");
        }
    };

    render(cli.format, &summary, format_summary)
}

fn render<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    text: fn(&T) -> String,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(text(value)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("Failed to serialize report")
        }
    }
}

/// Format a cleanup summary for display
pub fn format_summary(summary: &CleanupSummary) -> String {
    let mut output = String::new();

    for pass in &summary.passes {
        let heading = format!("{:?} pass ({:?})", pass.kind, pass.mode);
        output.push_str(&heading);
        output.push('\n');
        output.push_str(&"=".repeat(heading.len()));
        output.push('\n');

        if pass.outcomes.is_empty() {
            output.push_str("  no patterns configured\n");
        }
        for outcome in &pass.outcomes {
            output.push_str(&format_outcome(outcome));
        }
        output.push_str(&format!("  declined: {}\n\n", pass.declined()));
    }

    for (index, report) in summary.supersession.iter().enumerate() {
        output.push_str(&format_supersession(index + 1, report));
    }

    output.push_str(&format!("Total declined: {}\n", summary.grand_total));
    output
}

fn format_outcome(outcome: &PatternOutcome) -> String {
    let status = match outcome.status {
        PatternStatus::NoMatches => "no matches".to_string(),
        PatternStatus::Declined => format!("declined {} of {}", outcome.declined, outcome.matched),
        PatternStatus::Refused => format!("skipped {} (not confirmed)", outcome.matched),
    };

    let mut line = format!("  {} '{}': {}\n", outcome.field, outcome.pattern, status);
    for failure in &outcome.rejected {
        line.push_str(&format!("    refused {}: {}\n", failure.id, failure.reason));
    }
    line
}

fn format_supersession(pass: usize, report: &SupersessionReport) -> String {
    let mut output = format!(
        "Supersession pass {}: examined {}, declined {}\n",
        pass, report.examined, report.declined
    );
    for failure in &report.rejected {
        output.push_str(&format!("    refused {}: {}\n", failure.id, failure.reason));
    }
    output
}

/// Format dry-run counts for display
pub fn format_survey(lines: &[SurveyLine]) -> String {
    if lines.is_empty() {
        return "No patterns configured".to_string();
    }

    let mut output = String::new();
    output.push_str("Approved matches\n");
    output.push_str("================\n\n");

    for line in lines {
        output.push_str(&format!(
            "{:>6}  {} '{}'\n",
            line.matched, line.field, line.pattern
        ));
    }

    let total: usize = lines.iter().map(|l| l.matched).sum();
    output.push_str(&format!(
        "\n{:>6}  total (a record matched by several patterns counts once per pattern)\n",
        total
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryRepository, UpdateRecord};
    use crate::cleanup::ScriptedConfirm;

    fn config() -> Config {
        let mut config = Config::default();
        config.patterns.titles = vec!["Windows XP".to_string()];
        config.patterns.products = vec!["Office 2003".to_string()];
        config
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "catalog-sweep",
            "--url",
            "http://wsus.example:8530",
            "--token",
            "secret",
            "--yes",
            "--format",
            "json",
            "supersede",
            "--until-stable",
        ]);

        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.catalog.url, "http://wsus.example:8530");
        assert_eq!(config.catalog.api_token.as_deref(), Some("secret"));
        assert_eq!(cli.mode(), DeclineMode::Forced);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Supersede { until_stable: true }));
    }

    #[tokio::test]
    async fn test_count_command_text() {
        let repo = MemoryRepository::new()
            .with_record(UpdateRecord::approved("xp", "Windows XP SP3"));
        let confirm = ScriptedConfirm::default();
        let cli = Cli::parse_from(["catalog-sweep", "count"]);

        let output = execute(&cli, &config(), &repo, &confirm).await.unwrap();

        assert!(output.contains("title 'Windows XP'"));
        assert!(repo.decline_requests().is_empty());
    }

    #[tokio::test]
    async fn test_deep_clean_json() {
        let repo = MemoryRepository::new()
            .with_record(UpdateRecord::approved("xp", "Windows XP SP3"));
        let confirm = ScriptedConfirm::always(true);
        let cli = Cli::parse_from(["catalog-sweep", "--format", "json", "deep-clean"]);

        let output = execute(&cli, &config(), &repo, &confirm).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["grand_total"], 1);
        assert_eq!(value["passes"][0]["outcomes"][0]["status"], "declined");
    }

    #[tokio::test]
    async fn test_show_config_needs_no_catalog() {
        let repo = MemoryRepository::new();
        repo.set_available(false);
        let confirm = ScriptedConfirm::default();
        let cli = Cli::parse_from(["catalog-sweep", "show-config"]);

        let output = execute(&cli, &config(), &repo, &confirm).await.unwrap();
        assert!(output.contains("[catalog]"));
    }
}
