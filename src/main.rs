use std::{io::Write, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args as ClapArgs, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colored::Colorize;
use log::{debug, warn};
use prettytable::{color, format, Attr, Cell, Row, Table};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use postpone::config::{self, Config};
use postpone::hooks::{self, Hook};
use postpone::time::{DurationExt, UNITS};
use postpone::{Control, Mode, Outcome, Progress, Rejection, Scheduler, Timeout};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Command,
  /// Config file to use. [default: ${XDG_CONFIG_DIR}/postpone/config.toml]
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,
  #[command(flatten)]
  verbose: Verbosity<WarnLevel>,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Wait once, then exit
  After(TimerArgs),
  /// Fire on a fixed period until stopped
  Every(TimerArgs),
  /// Fire repeatedly, waiting a full period after each fire finishes
  Recur(TimerArgs),
  /// Print how long each time expression is
  Parse {
    /// Expressions like "5 minutes and 30 s" or "1h, 15m"
    #[arg(required = true)]
    times: Vec<String>,
  },
  /// Print every recognised time unit
  Units,
}

/// Options shared by every timer command
///
/// While the timer runs, each line on stdin is a control command:
/// pause, play, stop, reset, trigger, clear, complete,
/// postpone <TIME>, advance <TIME>, times <N>, status.
#[derive(Debug, ClapArgs)]
struct TimerArgs {
  /// How long to wait, e.g. "25 minutes" or "1m, 30s"
  time: String,
  /// Values reported with every event
  payload: Vec<String>,
  /// Resolve after this many fires
  #[arg(short, long)]
  times: Option<u32>,
  /// Show a progress bar
  #[arg(short, long, default_value_t = false)]
  progress: bool,
  /// Print one JSON object per event
  #[arg(short, long, default_value_t = false)]
  json: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
  Progress {
    at: String,
    count: u32,
    args: &'a [String],
  },
  Resolved {
    at: String,
    args: &'a [String],
  },
  Rejected {
    at: String,
    reason: String,
  },
  Status {
    at: String,
    mode: Mode,
    remaining_ms: i64,
    paused: bool,
    count: u32,
    limit: Option<u32>,
  },
}

struct Program {
  config: Config,
  json: bool,
  progress: bool,
}

impl Program {
  fn new(config: Config, timer_args: &TimerArgs) -> Self {
    Self {
      config,
      json: timer_args.json,
      progress: timer_args.progress,
    }
  }

  async fn run(&self, mode: Mode, timer_args: &TimerArgs) -> Result<()> {
    let scheduler = Scheduler::new(self.config.parser());
    let timeout = scheduler.schedule(mode, timer_args.time.as_str(), timer_args.payload.clone());

    if mode != Mode::Once {
      if let Some(n) = timer_args.times.or(self.config.default_times) {
        timeout.times(n);
      }
    }

    let mut progress = timeout.subscribe();
    let promise = timeout.promise();
    let outcome = promise.outcome();
    tokio::pin!(outcome);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut progress_open = true;

    let mut redraw = tokio::time::interval(self.config.refresh_interval.max(Duration::from_millis(10)));

    loop {
      tokio::select! {
        biased;

        event = progress.recv(), if progress_open => match event {
          Ok(event) => self.report_progress(&event)?,
          Err(RecvError::Lagged(missed)) => warn!("Missed {missed} progress events"),
          Err(RecvError::Closed) => progress_open = false,
        },
        settled = &mut outcome => return self.report_outcome(&settled),
        line = lines.next_line(), if stdin_open => match line.context("Unable to read control commands from stdin")? {
          Some(line) if line.trim().is_empty() => {},
          Some(line) => self.control(&timeout, &line)?,
          None => {
            debug!("stdin closed, no more control commands");
            stdin_open = false;
          },
        },
        _ = redraw.tick(), if self.progress => self.print_progress_bar(&timeout)?,
      }
    }
  }

  fn control(&self, timeout: &Timeout<Vec<String>>, line: &str) -> Result<()> {
    match line.parse::<Control>() {
      Ok(Control::Status) => self.print_status(timeout),
      Ok(control) => {
        debug!("Applying {control}");
        control.apply(timeout);
        Ok(())
      },
      Err(err) => {
        self.clear_line()?;
        eprintln!("{} {}", "error:".red().bold(), err);
        Ok(())
      },
    }
  }

  fn report_progress(&self, progress: &Progress<Vec<String>>) -> Result<()> {
    let at = Local::now();

    if self.json {
      self.print_json(&Event::Progress { at: at.to_rfc3339(), count: progress.count, args: &progress.args })?;
    } else {
      self.clear_line()?;
      println!(
        "{} Fired {} {}",
        at.format("%T").to_string().dimmed(),
        format!("#{}", progress.count).magenta().bold(),
        progress.args.join(" ").yellow(),
      );
    }

    self.run_hook(Hook::Progress, &[
      (hooks::COUNT_VAR, progress.count.to_string()),
      (hooks::PAYLOAD_VAR, progress.args.join(" ")),
    ]);

    Ok(())
  }

  fn report_outcome(&self, outcome: &Outcome<Vec<String>>) -> Result<()> {
    let at = Local::now();
    self.clear_line()?;

    match outcome {
      Outcome::Resolved(args) => {
        if self.json {
          self.print_json(&Event::Resolved { at: at.to_rfc3339(), args })?;
        } else {
          println!("{} {} {}", at.format("%T").to_string().dimmed(), "Done".green().bold(), args.join(" ").yellow());
        }

        self.run_hook(Hook::Resolved, &[(hooks::PAYLOAD_VAR, args.join(" "))]);

        Ok(())
      },
      Outcome::Rejected(reason) => {
        if self.json {
          self.print_json(&Event::Rejected { at: at.to_rfc3339(), reason: reason.to_string() })?;
        }

        self.run_hook(Hook::Rejected, &[(hooks::REASON_VAR, reason.to_string())]);

        match reason {
          Rejection::InvalidTime { reason: cause, .. } | Rejection::InvalidAdjustment { reason: cause, .. } => {
            bail!("{reason} ({cause})")
          },
          _ => bail!("{reason}"),
        }
      },
    }
  }

  fn print_status(&self, timeout: &Timeout<Vec<String>>) -> Result<()> {
    let remaining = timeout.time_remaining();

    if self.json {
      return self.print_json(&Event::Status {
        at: Local::now().to_rfc3339(),
        mode: timeout.mode(),
        remaining_ms: remaining,
        paused: timeout.is_paused(),
        count: timeout.count(),
        limit: timeout.limit(),
      });
    }

    self.clear_line()?;

    let state = if timeout.is_settled() {
      "Done".red().bold()
    } else if timeout.is_paused() {
      "Paused".yellow().bold()
    } else {
      "Running".magenta().bold()
    };

    println!("Status: {}", state);
    println!("Duration: {}", timeout.duration().to_human().cyan());
    println!("Time remaining: {}", remaining_duration(remaining).to_kitchen());
    match timeout.limit() {
      Some(limit) => println!("Fired: {} of {}", timeout.count(), limit),
      None => println!("Fired: {}", timeout.count()),
    }
    println!();

    Ok(())
  }

  fn print_progress_bar(&self, timeout: &Timeout<Vec<String>>) -> Result<()> {
    if self.json || timeout.is_settled() {
      return Ok(());
    }

    let bar = progress_bar(timeout.duration(), timeout.time_remaining(), self.config.progress_bar_width);
    let paused = if timeout.is_paused() { " (paused)".dimmed().to_string() } else { String::new() };

    print!("\r{}{}", bar, paused);
    std::io::stdout().flush().context("Unable to draw progress bar")
  }

  fn clear_line(&self) -> Result<()> {
    if self.progress && !self.json {
      print!("\r\x1b[2K");
      std::io::stdout().flush().context("Unable to clear progress bar")?;
    }

    Ok(())
  }

  fn print_json(&self, event: &Event) -> Result<()> {
    let line = serde_json::to_string(event).context("Unable to format event as JSON")?;
    println!("{line}");
    Ok(())
  }

  fn run_hook(&self, hook: Hook, env: &[(&str, String)]) {
    if let Err(err) = hook.run(&self.config.hooks_directory, env) {
      warn!("{:#}", err);
    }
  }
}

fn remaining_duration(remaining_ms: i64) -> Duration {
  Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(0))
}

/// `elapsed ████░░░░ remaining`, `width` characters wide
fn progress_bar(duration: Duration, remaining_ms: i64, width: usize) -> String {
  let remaining = remaining_duration(remaining_ms).min(duration);
  let elapsed = duration.saturating_sub(remaining);

  let elapsed_ratio = if duration.is_zero() {
    1.0
  } else {
    elapsed.as_secs_f64() / duration.as_secs_f64()
  };

  let filled_count = ((width as f64) * elapsed_ratio).round() as usize;
  let unfilled_count = width.saturating_sub(filled_count);

  let filled_bar = "█".repeat(filled_count);
  let unfilled_bar = "░".repeat(unfilled_count);

  format!("{} {}{} {}", elapsed.to_kitchen(), filled_bar, unfilled_bar, remaining.to_kitchen())
}

fn print_parsed(config: &Config, times: &[String]) -> Result<()> {
  let parser = config.parser();
  let mut failed = false;

  for time in times {
    match parser.parse_str(time) {
      Ok(duration) => println!(
        "{} = {} ms ({})",
        time.yellow(),
        duration.as_millis_i64().to_string().cyan(),
        duration.to_human(),
      ),
      Err(err) => {
        failed = true;
        println!("{} = {}", time.yellow(), err.to_string().red());
      },
    }
  }

  if failed {
    bail!("Some time expressions could not be parsed");
  }

  Ok(())
}

fn print_units() {
  let mut table = Table::new();

  table.set_titles(Row::new(vec![
    Cell::new("Unit")
        .with_style(Attr::Underline(true)),
    Cell::new("Milliseconds")
        .with_style(Attr::Underline(true)),
    Cell::new("Duration")
        .with_style(Attr::Underline(true)),
  ]));

  for (unit, multiplier) in UNITS {
    table.add_row(Row::new(vec![
      Cell::new(unit).with_style(Attr::ForegroundColor(color::BLUE)),
      Cell::new(&multiplier.to_string()).style_spec("r").with_style(Attr::ForegroundColor(color::CYAN)),
      Cell::new(&Duration::from_millis(*multiplier).to_human()),
    ]));
  }
  table.set_format(*format::consts::FORMAT_CLEAN);
  table.printstd();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let args = Args::parse();

    env_logger::Builder::new()
      .filter_level(args.verbose.log_level_filter())
      .init();

    let config_path =
      if let Some(conf_path) = args.config {
        conf_path
      } else {
        config::default_config_path()?
      };

    let config = Config::init(&config_path)?;

    match &args.command {
      Command::After(timer_args) => {
        Program::new(config, timer_args).run(Mode::Once, timer_args).await?;
      },
      Command::Every(timer_args) => {
        Program::new(config, timer_args).run(Mode::Interval, timer_args).await?;
      },
      Command::Recur(timer_args) => {
        Program::new(config, timer_args).run(Mode::Recur, timer_args).await?;
      },
      Command::Parse { times } => {
        print_parsed(&config, times)?;
      },
      Command::Units => {
        print_units();
      },
    }

    Ok(())
}
