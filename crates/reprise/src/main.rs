mod logging;

use anyhow::{Context, bail};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use reprise_desktop::DesktopBackend;
use reprise_engine::analysis::{Analysis, preview};
use reprise_engine::backend::Backends;
use reprise_engine::cli::{self, OutputHandlers, ReplOptions, ReplState};
use reprise_engine::common::{InteractionRecord, ReplayResult};
use reprise_engine::config::{ConfigLoader, ReplayConfig};
use reprise_engine::filter::{RecordFilter, TextMatch};
use reprise_engine::formatter::{format_outcome, format_summary};
use reprise_engine::loader::{RecordLoader, parse_timestamp};
use reprise_engine::ReplaySession;
use reprise_web::WebDriverBackend;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "reprise", version, about = "Replay recorded UI interactions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay the selected records
    Run {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        backends: BackendArgs,
        /// Position of the first record to replay, after filtering
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Position after the last record to replay
        #[arg(long)]
        end: Option<usize>,
        /// Override timing.speed_multiplier
        #[arg(long)]
        speed: Option<f64>,
        /// Write the full result as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Summarize the recording without replaying it
    Analyze {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Show the first records as a table
    Preview {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Replay one record per Enter
    Step {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Explore and replay from a prompt
    Interactive {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        backends: BackendArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Recorded interactions (CSV)
    records: PathBuf,
    /// Configuration file (YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Default)]
struct SelectionArgs {
    /// Only records whose process name contains this text
    #[arg(long)]
    process: Option<String>,
    /// Only records whose application contains this text
    #[arg(long)]
    application: Option<String>,
    /// Only records of this event kind
    #[arg(long)]
    event: Option<String>,
    /// Only records starting at or after this time
    #[arg(long)]
    from: Option<String>,
    /// Only records starting at or before this time
    #[arg(long)]
    to: Option<String>,
}

impl SelectionArgs {
    fn to_filter(&self) -> anyhow::Result<RecordFilter> {
        let mut filter = RecordFilter::new();
        if let Some(process) = &self.process {
            filter = filter.process_name(TextMatch::contains(process));
        }
        if let Some(application) = &self.application {
            filter = filter.application(TextMatch::contains(application));
        }
        if let Some(event) = &self.event {
            filter = filter.event(event.as_str());
        }
        if self.from.is_some() || self.to.is_some() {
            filter = filter.time_range(timestamp(&self.from)?, timestamp(&self.to)?);
        }
        Ok(filter)
    }
}

fn timestamp(value: &Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    match value {
        Some(text) => match parse_timestamp(text) {
            Some(ts) => Ok(Some(ts)),
            None => bail!("Unrecognized timestamp '{}'", text),
        },
        None => Ok(None),
    }
}

#[derive(Args, Clone, Copy)]
struct BackendArgs {
    /// Do not start the browser backend
    #[arg(long)]
    no_web: bool,
    /// Do not start the desktop backend
    #[arg(long)]
    no_desktop: bool,
}

impl BackendArgs {
    fn build(self, config: &ReplayConfig) -> Backends {
        let mut backends = Backends::new();
        if !self.no_web {
            backends.set_web(Box::new(WebDriverBackend::new(config.selenium.clone())));
        }
        if !self.no_desktop {
            backends.set_desktop(Box::new(DesktopBackend::new(
                config.desktop_automation.clone(),
            )));
        }
        backends
    }
}

fn print_out(msg: &str) {
    println!("{}", msg);
}

fn print_err(msg: &str) {
    eprintln!("{}", msg);
}

const OUTPUT: OutputHandlers = OutputHandlers {
    out: print_out,
    err: print_err,
};

async fn load_config(path: Option<&Path>) -> anyhow::Result<ReplayConfig> {
    let config = match path {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    Ok(config)
}

/// Config plus records, with logging installed in between so record loading
/// is logged at the configured level.
async fn prepare(
    common: &CommonArgs,
) -> anyhow::Result<(ReplayConfig, Vec<InteractionRecord>)> {
    let config = load_config(common.config.as_deref()).await?;
    logging::init(&config.logging, common.verbose)?;
    let records = RecordLoader::from_path(&common.records)
        .await
        .with_context(|| format!("Failed to load records {}", common.records.display()))?;
    Ok((config, records))
}

fn exit_code(result: &ReplayResult) -> ExitCode {
    if result.failed() > 0 || result.aborted().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn write_report(path: &Path, result: &ReplayResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            common,
            selection,
            backends,
            start,
            end,
            speed,
            report,
        } => {
            let (mut config, records) = prepare(&common).await?;
            if let Some(speed) = speed {
                config.timing.speed_multiplier = speed;
            }
            let session = ReplaySession::new(config.clone(), backends.build(&config))?
                .with_filter(selection.to_filter()?)
                .with_range(start, end);

            let result = cli::run_with_interrupt(session, &records).await?;
            for outcome in result.outcomes() {
                println!("{}", format_outcome(outcome));
            }
            println!("\n{}", format_summary(&result));
            if let Some(path) = report {
                write_report(&path, &result).await?;
            }
            Ok(exit_code(&result))
        }
        Command::Analyze { common, selection } => {
            let (_, records) = prepare(&common).await?;
            let selected = selection.to_filter()?.apply(&records);
            println!("{}", Analysis::of(&selected).render());
            Ok(ExitCode::SUCCESS)
        }
        Command::Preview {
            common,
            selection,
            count,
        } => {
            let (_, records) = prepare(&common).await?;
            let selected = selection.to_filter()?.apply(&records);
            println!("{}", preview(&selected, count));
            Ok(ExitCode::SUCCESS)
        }
        Command::Step {
            common,
            selection,
            backends,
        } => {
            let (config, records) = prepare(&common).await?;
            let stepping = ReplaySession::new(config.clone(), backends.build(&config))?
                .with_filter(selection.to_filter()?)
                .start_stepping(&records)
                .await?;
            println!(
                "{} records selected. Enter (or 'next') replays the next one; 'status', 'quit'.",
                stepping.len()
            );
            let result = cli::run_stepping(stepping, OUTPUT)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("\n{}", format_summary(&result));
            Ok(exit_code(&result))
        }
        Command::Interactive { common, backends } => {
            let (config, records) = prepare(&common).await?;
            let count = records.len();
            let mut state = ReplState::new(records, config, move |config: &ReplayConfig| {
                backends.build(config)
            });
            let banner = format!("Loaded {} records. Type 'help' for commands.", count);
            let banner_lines = [banner.as_str()];
            let options = ReplOptions {
                banner_lines: &banner_lines,
                prompt: "reprise> ",
                exit_commands: &["exit", "quit"],
                handle_ctrl_c: true,
                ctrl_c_message: Some("Use 'quit' to exit."),
            };
            cli::run_repl(&mut state, OUTPUT, options)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
