use crate::analysis::{Analysis, preview};
use crate::backend::Backends;
use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::filter::{RecordFilter, TextMatch};
use crate::formatter::{describe_record, format_delay, format_outcome, format_summary};
use crate::loader::parse_timestamp;
use crate::session::{ReplaySession, SessionState, SteppingSession};
use reprise_common::{InteractionRecord, ReplayResult};
use std::error::Error;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Clone, Copy)]
pub struct OutputHandlers {
    pub out: fn(&str),
    pub err: fn(&str),
}

pub struct ReplOptions<'a> {
    pub banner_lines: &'a [&'a str],
    pub prompt: &'a str,
    pub exit_commands: &'a [&'a str],
    pub handle_ctrl_c: bool,
    pub ctrl_c_message: Option<&'a str>,
}

/// Builds a fresh set of backends for every session the REPL starts.
pub trait BackendFactory {
    fn build(&self, config: &ReplayConfig) -> Backends;
}

impl<F> BackendFactory for F
where
    F: Fn(&ReplayConfig) -> Backends,
{
    fn build(&self, config: &ReplayConfig) -> Backends {
        self(config)
    }
}

type StdinLines = Lines<BufReader<Stdin>>;

/// Run `session` to completion, aborting cooperatively on Ctrl-C.
pub async fn run_with_interrupt(
    session: ReplaySession,
    records: &[InteractionRecord],
) -> Result<ReplayResult, ReplayError> {
    let handle = session.abort_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current record");
            handle.abort();
        }
    });
    let result = session.run(records).await;
    watcher.abort();
    result
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Analyze,
    Preview(usize),
    Filter(RecordFilter),
    ClearFilter,
    Run { start: usize, end: Option<usize> },
    Step,
    Help,
}

pub fn parse_command(line: &str) -> Result<ReplCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".into());
    };
    let args: Vec<&str> = parts.collect();

    match head.to_lowercase().as_str() {
        "analyze" | "analyse" => Ok(ReplCommand::Analyze),
        "preview" => {
            let n = match args.first() {
                Some(n) => n
                    .parse()
                    .map_err(|_| format!("invalid count '{}'", n))?,
                None => 10,
            };
            Ok(ReplCommand::Preview(n))
        }
        "filter" => {
            if args.is_empty() || args == ["clear"] {
                return Ok(ReplCommand::ClearFilter);
            }
            parse_filter(&args).map(ReplCommand::Filter)
        }
        "run" => {
            let start = match args.first() {
                Some(s) => s.parse().map_err(|_| format!("invalid start '{}'", s))?,
                None => 0,
            };
            let end = match args.get(1) {
                Some(e) => Some(e.parse().map_err(|_| format!("invalid end '{}'", e))?),
                None => None,
            };
            Ok(ReplCommand::Run { start, end })
        }
        "step" => Ok(ReplCommand::Step),
        "help" | "?" => Ok(ReplCommand::Help),
        other => Err(format!("unknown command '{}'. Type 'help'.", other)),
    }
}

/// Parse `key=value` pairs. Text predicates use case-insensitive substring
/// matching.
pub fn parse_filter(args: &[&str]) -> Result<RecordFilter, String> {
    let mut filter = RecordFilter::new();
    let mut from = None;
    let mut to = None;

    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(format!("expected key=value, got '{}'", arg));
        };
        match key.to_lowercase().as_str() {
            "process" | "process_name" => filter = filter.process_name(TextMatch::contains(value)),
            "application" | "app" => filter = filter.application(TextMatch::contains(value)),
            "event" => filter = filter.event(value),
            "from" => {
                from = Some(
                    parse_timestamp(value)
                        .ok_or_else(|| format!("invalid timestamp '{}'", value))?,
                )
            }
            "to" => {
                to = Some(
                    parse_timestamp(value)
                        .ok_or_else(|| format!("invalid timestamp '{}'", value))?,
                )
            }
            other => return Err(format!("unknown filter key '{}'", other)),
        }
    }
    if from.is_some() || to.is_some() {
        filter = filter.time_range(from, to);
    }
    Ok(filter)
}

const HELP: &str = "Commands:
  analyze              summarize the loaded records
  preview [N]          show the first N selected records
  filter k=v ...       select records (process, application, event, from, to)
  filter clear         drop the current filter
  run [START [END]]    replay the selection
  step                 replay the selection one record at a time
  quit                 leave";

/// Possible outcomes from reading a single REPL line.
enum ReadLineResult {
    /// A non-empty input line to process.
    Input(String),
    /// Empty line or no input yet -- skip and re-prompt.
    Skip,
    /// EOF or exit command -- terminate the loop.
    Exit,
    /// I/O error while reading.
    Error(io::Error),
}

async fn read_line(
    reader: &mut StdinLines,
    exit_commands: &[&str],
    handle_ctrl_c: bool,
    ctrl_c_message: Option<&str>,
    output: OutputHandlers,
) -> ReadLineResult {
    if handle_ctrl_c {
        tokio::select! {
            line = reader.next_line() => {
                classify_line(line, exit_commands)
            }
            _ = tokio::signal::ctrl_c() => {
                if let Some(message) = ctrl_c_message {
                    (output.out)(message);
                }
                ReadLineResult::Exit
            }
        }
    } else {
        classify_line(reader.next_line().await, exit_commands)
    }
}

fn classify_line(
    result: Result<Option<String>, io::Error>,
    exit_commands: &[&str],
) -> ReadLineResult {
    match result {
        Ok(Some(input)) => {
            let trimmed = input.trim().to_string();
            if trimmed.is_empty() {
                ReadLineResult::Skip
            } else if exit_commands.contains(&trimmed.as_str()) {
                ReadLineResult::Exit
            } else {
                ReadLineResult::Input(trimmed)
            }
        }
        Ok(None) => ReadLineResult::Exit,
        Err(e) => ReadLineResult::Error(e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCommand {
    Next,
    Status,
    Quit,
    Unknown,
}

pub fn parse_step_command(line: &str) -> StepCommand {
    match line.trim().to_lowercase().as_str() {
        "" | "n" | "next" => StepCommand::Next,
        "s" | "status" => StepCommand::Status,
        "q" | "quit" | "exit" => StepCommand::Quit,
        _ => StepCommand::Unknown,
    }
}

fn step_status(stepping: &SteppingSession) -> String {
    let state = match stepping.state() {
        SessionState::Running => "running".to_string(),
        SessionState::Completed => "completed".to_string(),
        SessionState::Aborted(reason) => format!("aborted ({})", reason),
    };
    format!(
        "Position {}/{}, {} remaining, {}",
        stepping.position(),
        stepping.len(),
        stepping.remaining(),
        state
    )
}

async fn drive_stepping(
    mut stepping: SteppingSession,
    reader: &mut StdinLines,
    output: OutputHandlers,
) -> Result<ReplayResult, Box<dyn Error>> {
    let mut stdout = io::stdout();
    loop {
        let Some(next) = stepping.peek() else {
            break;
        };
        let delay = stepping.next_delay().unwrap_or_default();
        (output.out)(&format!(
            "next: {} (delay {})",
            describe_record(next),
            format_delay(delay)
        ));
        print!("step> ");
        stdout.flush()?;

        let line = match reader.next_line().await? {
            Some(line) => line,
            None => {
                stepping.abort();
                break;
            }
        };
        match parse_step_command(&line) {
            StepCommand::Next => {
                if let Some(outcome) = stepping.step().await {
                    (output.out)(&format_outcome(&outcome));
                }
            }
            StepCommand::Status => (output.out)(&step_status(&stepping)),
            StepCommand::Quit => {
                stepping.abort();
                break;
            }
            StepCommand::Unknown => (output.err)("Commands: next (Enter), status, quit"),
        }
    }
    Ok(stepping.finish().await)
}

/// Drive `stepping` from stdin until the selection is exhausted or the user
/// quits.
pub async fn run_stepping(
    stepping: SteppingSession,
    output: OutputHandlers,
) -> Result<ReplayResult, Box<dyn Error>> {
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    drive_stepping(stepping, &mut reader, output).await
}

/// Interactive session over a loaded record set.
pub struct ReplState<F> {
    records: Vec<InteractionRecord>,
    config: ReplayConfig,
    filter: RecordFilter,
    factory: F,
}

impl<F: BackendFactory> ReplState<F> {
    pub fn new(records: Vec<InteractionRecord>, config: ReplayConfig, factory: F) -> Self {
        Self {
            records,
            config,
            filter: RecordFilter::default(),
            factory,
        }
    }

    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    fn selection(&self) -> Vec<InteractionRecord> {
        self.filter.apply(&self.records)
    }

    fn session(&self) -> Result<ReplaySession, ReplayError> {
        let backends = self.factory.build(&self.config);
        Ok(ReplaySession::new(self.config.clone(), backends)?.with_filter(self.filter.clone()))
    }

    async fn execute(
        &mut self,
        command: ReplCommand,
        reader: &mut StdinLines,
        output: OutputHandlers,
    ) -> Result<String, String> {
        match command {
            ReplCommand::Analyze => Ok(Analysis::of(&self.selection()).render()),
            ReplCommand::Preview(n) => Ok(preview(&self.selection(), n)),
            ReplCommand::Filter(filter) => {
                self.filter = filter;
                Ok(format!("{} records selected", self.selection().len()))
            }
            ReplCommand::ClearFilter => {
                self.filter = RecordFilter::default();
                Ok(format!("Filter cleared, {} records", self.records.len()))
            }
            ReplCommand::Run { start, end } => {
                let session = self.session().map_err(|e| e.to_string())?;
                let result = run_with_interrupt(session.with_range(start, end), &self.records)
                    .await
                    .map_err(|e| e.to_string())?;
                for outcome in result.outcomes() {
                    (output.out)(&format_outcome(outcome));
                }
                Ok(format_summary(&result))
            }
            ReplCommand::Step => {
                let stepping = self
                    .session()
                    .map_err(|e| e.to_string())?
                    .start_stepping(&self.records)
                    .await
                    .map_err(|e| e.to_string())?;
                let result = drive_stepping(stepping, reader, output)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(format_summary(&result))
            }
            ReplCommand::Help => Ok(HELP.to_string()),
        }
    }
}

pub async fn run_repl<F: BackendFactory>(
    state: &mut ReplState<F>,
    output: OutputHandlers,
    options: ReplOptions<'_>,
) -> Result<(), Box<dyn Error>> {
    for line in options.banner_lines {
        (output.out)(line);
    }

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin).lines();
    let mut stdout = io::stdout();

    loop {
        print!("{}", options.prompt);
        stdout.flush()?;

        match read_line(
            &mut reader,
            options.exit_commands,
            options.handle_ctrl_c,
            options.ctrl_c_message,
            output,
        )
        .await
        {
            ReadLineResult::Input(line) => {
                let result = match parse_command(&line) {
                    Ok(command) => state.execute(command, &mut reader, output).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(text) => (output.out)(&text),
                    Err(err) => (output.err)(&format!("Error: {}", err)),
                }
            }
            ReadLineResult::Skip => continue,
            ReadLineResult::Exit => break,
            ReadLineResult::Error(e) => return Err(e.into()),
        }
    }
    Ok(())
}
