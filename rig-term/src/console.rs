//! Interactive console
//!
//! Reads one command per line from stdin and applies it to the session.
//! Validation errors are printed and never end the session.

use std::io::{self, Write};
use std::time::Duration;

use rig_engine::{EscapeScheme, RunOutcome, Session, SessionError, Transport};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// How often the console checks whether a run has finished
const RUN_WATCH_INTERVAL: Duration = Duration::from_millis(200);

const HELP: &str = "\
Commands:
  add <hold> <text>   append an entry (e.g. add 500ms AT)
  rm <n>              remove entry n (as shown by list)
  clear               remove every entry
  list                show the schedule
  send                start sending the schedule
  cancel              stop the current send
  repeat on|off       loop the schedule until cancelled
  crlf on|off         send \\r\\n for every \\n
  newline on|off      append a missing trailing newline
  escape [name]       show or pick the escape: raw, c-style, hex, binary
  status              show the current options
  help                show this text
  quit                close the port and exit
Ctrl-C cancels a send; pressing it again (or with nothing sending) quits.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { hold: String, text: String },
    /// Zero-based schedule index
    Remove(usize),
    Clear,
    List,
    Send,
    Cancel,
    Repeat(bool),
    Crlf(bool),
    Newline(bool),
    Escape(Option<String>),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not an entry number")]
    BadIndex(String),

    #[error("expected on or off, got '{0}'")]
    BadToggle(String),
}

/// Parse one console line; blank lines give `None`
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim_start();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest),
        None => (line.trim_end(), ""),
    };
    if word.is_empty() {
        return Ok(None);
    }

    let command = match word.to_ascii_lowercase().as_str() {
        "add" | "a" => {
            // text keeps its inner and trailing spaces
            let rest = rest.trim_start();
            let (hold, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if hold.is_empty() {
                return Err(CommandError::Usage("add <hold> <text>"));
            }
            Command::Add {
                hold: hold.to_string(),
                text: text.to_string(),
            }
        }
        "rm" | "remove" | "del" => {
            let arg = rest.trim();
            if arg.is_empty() {
                return Err(CommandError::Usage("rm <n>"));
            }
            match arg.parse::<usize>() {
                Ok(n) if n >= 1 => Command::Remove(n - 1),
                _ => return Err(CommandError::BadIndex(arg.to_string())),
            }
        }
        "clear" => Command::Clear,
        "list" | "ls" => Command::List,
        "send" | "go" => Command::Send,
        "cancel" | "stop" => Command::Cancel,
        "repeat" => Command::Repeat(parse_toggle(rest, "repeat on|off")?),
        "crlf" => Command::Crlf(parse_toggle(rest, "crlf on|off")?),
        "newline" => Command::Newline(parse_toggle(rest, "newline on|off")?),
        "escape" => {
            let name = rest.trim();
            Command::Escape((!name.is_empty()).then(|| name.to_string()))
        }
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_toggle(arg: &str, usage: &'static str) -> Result<bool, CommandError> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Ok(true),
        "off" | "no" | "false" | "0" => Ok(false),
        "" => Err(CommandError::Usage(usage)),
        other => Err(CommandError::BadToggle(other.to_string())),
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply one command to the session, writing feedback to `out`
pub fn execute<T: Transport>(
    session: &mut Session<T>,
    command: Command,
    out: &mut impl Write,
) -> io::Result<Flow> {
    match command {
        Command::Add { hold, text } => match session.add_action(&hold, &text) {
            Ok(index) => writeln!(out, "added entry {}", index + 1)?,
            Err(e) => writeln!(out, "rejected: {}", e)?,
        },
        Command::Remove(index) => match session.remove_action(index) {
            Ok(entry) => writeln!(out, "removed entry {}: {:?}", index + 1, entry.text)?,
            Err(e) => writeln!(out, "{}", e)?,
        },
        Command::Clear => {
            session.clear_schedule();
            writeln!(out, "schedule cleared")?;
        }
        Command::List => {
            let entries = session.schedule().entries();
            if entries.is_empty() {
                writeln!(out, "schedule is empty")?;
            }
            for (i, entry) in entries.iter().enumerate() {
                writeln!(out, "{:>3}. hold {:<10?} {:?}", i + 1, entry.hold, entry.text)?;
            }
        }
        Command::Send => match session.start_run() {
            Ok(()) => writeln!(
                out,
                "sending {} entries{}",
                session.schedule().len(),
                if session.repeat() { " (repeating)" } else { "" }
            )?,
            Err(SessionError::RunInProgress) => writeln!(out, "already sending")?,
            Err(e) => writeln!(out, "not sent: {}", e)?,
        },
        Command::Cancel => {
            if session.is_sending() {
                session.cancel_run();
                writeln!(out, "cancelling")?;
            } else {
                writeln!(out, "nothing is sending")?;
            }
        }
        Command::Repeat(on) => {
            session.set_repeat(on);
            writeln!(out, "repeat {}", on_off(on))?;
        }
        Command::Crlf(on) => {
            let mut line_ending = session.line_ending();
            line_ending.precede_lf_with_cr = on;
            session.set_line_ending(line_ending);
            writeln!(out, "crlf {}", on_off(on))?;
        }
        Command::Newline(on) => {
            let mut line_ending = session.line_ending();
            line_ending.append_missing_newline = on;
            session.set_line_ending(line_ending);
            writeln!(out, "newline {}", on_off(on))?;
        }
        Command::Escape(None) => {
            let names: Vec<_> = EscapeScheme::ALL.iter().map(|s| s.name()).collect();
            writeln!(
                out,
                "escape is {} (available: {})",
                session.scheme(),
                names.join(", ")
            )?;
        }
        Command::Escape(Some(name)) => match session.select_scheme(&name) {
            Ok(scheme) => writeln!(out, "escape {}", scheme)?,
            Err(e) => writeln!(out, "{}", e)?,
        },
        Command::Status => {
            let line_ending = session.line_ending();
            writeln!(
                out,
                "{}: {} entries, escape {}, repeat {}, crlf {}, newline {}, {}",
                session.device(),
                session.schedule().len(),
                session.scheme(),
                on_off(session.repeat()),
                on_off(line_ending.precede_lf_with_cr),
                on_off(line_ending.append_missing_newline),
                if session.is_sending() { "sending" } else { "idle" }
            )?;
        }
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Print the result of a run that has finished since the last check
pub async fn report_finished_run<T: Transport>(
    session: &mut Session<T>,
    out: &mut impl Write,
) -> io::Result<()> {
    if session.is_sending() {
        return Ok(());
    }
    match session.wait_run().await {
        None => {}
        Some(Ok(report)) => match report.outcome {
            RunOutcome::Completed => writeln!(
                out,
                "send finished: {} writes, {} bytes",
                report.writes, report.bytes
            )?,
            RunOutcome::Cancelled => writeln!(
                out,
                "send cancelled after {} writes ({} full passes)",
                report.writes, report.passes
            )?,
        },
        Some(Err(e)) => writeln!(out, "send failed: {}", e)?,
    }
    Ok(())
}

/// Parse and apply one console line
///
/// The outcome of a run that finished since the last report is printed
/// before a new `send` replaces it.
pub async fn handle_line<T: Transport>(
    session: &mut Session<T>,
    line: &str,
    out: &mut impl Write,
) -> io::Result<Flow> {
    match parse_command(line) {
        Ok(None) => Ok(Flow::Continue),
        Ok(Some(command)) => {
            if command == Command::Send {
                report_finished_run(session, out).await?;
            }
            execute(session, command, out)
        }
        Err(e) => {
            writeln!(out, "{}", e)?;
            Ok(Flow::Continue)
        }
    }
}

/// Forward stdin lines from a dedicated thread
///
/// A blocking reader thread is used instead of `tokio::io::stdin` so the
/// runtime can shut down while a read is still pending.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("stdin reader finished");
    });
    rx
}

/// Run the console until `quit`, end of input, or a second Ctrl-C
pub async fn run<T: Transport>(session: &mut Session<T>) -> io::Result<()> {
    let mut out = io::stdout();
    let mut lines = spawn_stdin_reader();
    let mut watch = tokio::time::interval(RUN_WATCH_INTERVAL);
    let mut cancel_requested = false;

    writeln!(out, "{} open; type 'help' for commands", session.device())?;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let was_sending = session.is_sending();
                if handle_line(session, &line, &mut out).await? == Flow::Quit {
                    break;
                }
                if !was_sending && session.is_sending() {
                    cancel_requested = false;
                }
            }

            result = tokio::signal::ctrl_c() => {
                result?;
                if session.is_sending() && !cancel_requested {
                    session.cancel_run();
                    cancel_requested = true;
                    writeln!(out, "\ncancelling; press Ctrl-C again to quit")?;
                } else {
                    break;
                }
            }

            _ = watch.tick() => {
                if !session.is_sending() {
                    cancel_requested = false;
                }
                report_finished_run(session, &mut out).await?;
            }
        }
        out.flush()?;
    }

    Ok(())
}
