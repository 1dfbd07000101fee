//! Command line arguments

use std::path::PathBuf;

use clap::Parser;
use rig_engine::{parse_hold, EscapeScheme};

use crate::serial::{parse_data_bits, parse_stop_bits, Parity};
use crate::settings::Settings;

/// Send timed byte sequences to a serial device and log everything it says back
#[derive(Parser, Debug)]
#[command(name = "sendrig")]
#[command(version, long_about = None)]
#[command(after_help = "EXAMPLES:
    sendrig --port /dev/ttyUSB0 --baud 9600
    sendrig -p /dev/ttyUSB0 --escape hex -a 0s='41 54 0d' -a 1s='41 54 49 0d' --send --once
    sendrig -p COM3 --schedule poll.json --repeat --send")]
pub struct Args {
    /// Serial device (defaults to the last one used)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Data bits (5-8)
    #[arg(long, value_parser = parse_data_bits)]
    pub data_bits: Option<u8>,

    /// Stop bits (1 or 2)
    #[arg(long, value_parser = parse_stop_bits)]
    pub stop_bits: Option<u8>,

    /// Parity: none, odd or even
    #[arg(long, value_parser = parse_parity)]
    pub parity: Option<Parity>,

    /// Escape scheme for payload text: raw, c-style, hex or binary
    #[arg(short, long, value_parser = parse_escape)]
    pub escape: Option<EscapeScheme>,

    /// Schedule entry as HOLD=TEXT (repeatable, e.g. 500ms=AT)
    #[arg(short = 'a', long = "action", value_parser = parse_action)]
    pub actions: Vec<ActionArg>,

    /// Load schedule entries from a JSON file
    #[arg(short, long)]
    pub schedule: Option<PathBuf>,

    /// Repeat the schedule until cancelled
    #[arg(short, long)]
    pub repeat: bool,

    /// Send \r\n for every \n
    #[arg(long)]
    pub cr_before_lf: bool,

    /// Do not append a newline to payloads that lack one
    #[arg(long)]
    pub no_append_newline: bool,

    /// Directory for the send/recv log file
    #[arg(long, conflicts_with = "no_log")]
    pub log_dir: Option<PathBuf>,

    /// Do not write a log file
    #[arg(long)]
    pub no_log: bool,

    /// Start sending as soon as the port is open
    #[arg(long)]
    pub send: bool,

    /// Exit after the first run instead of opening the console
    #[arg(long, requires = "send")]
    pub once: bool,

    /// Remember these options as the new defaults
    #[arg(long)]
    pub save: bool,
}

/// `HOLD=TEXT` from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionArg {
    pub hold: String,
    pub text: String,
}

fn parse_action(s: &str) -> Result<ActionArg, String> {
    let (hold, text) = s
        .split_once('=')
        .ok_or_else(|| format!("expected HOLD=TEXT, got '{}'", s))?;
    parse_hold(hold).map_err(|e| e.to_string())?;
    Ok(ActionArg {
        hold: hold.to_string(),
        text: text.to_string(),
    })
}

fn parse_parity(s: &str) -> Result<Parity, String> {
    s.parse()
}

fn parse_escape(s: &str) -> Result<EscapeScheme, String> {
    EscapeScheme::lookup(s).map_err(|_| {
        format!(
            "Unknown escape '{}'. Available: raw, c-style, hex, binary",
            s
        )
    })
}

impl Args {
    /// Layer the flags that were given over the saved settings
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if let Some(bits) = self.data_bits {
            settings.data_bits = bits;
        }
        if let Some(bits) = self.stop_bits {
            settings.stop_bits = bits;
        }
        if let Some(parity) = self.parity {
            settings.parity = parity;
        }
        if let Some(escape) = self.escape {
            settings.escape = escape;
        }
        if self.cr_before_lf {
            settings.precede_lf_with_cr = true;
        }
        if self.no_append_newline {
            settings.append_missing_newline = false;
        }
        if let Some(dir) = &self.log_dir {
            settings.log_dir = Some(dir.clone());
            settings.save_log = true;
        }
        if self.no_log {
            settings.save_log = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("sendrig").chain(args.iter().copied()))
    }

    #[test]
    fn test_minimal() {
        let args = parse(&["--port", "/dev/ttyUSB0"]).unwrap();
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB0"));
        assert!(args.actions.is_empty());
        assert!(!args.send);
    }

    #[test]
    fn test_actions() {
        let args = parse(&["-a", "0s=ping", "-a", "1.5s=a=b", "--action", "2m="]).unwrap();
        assert_eq!(
            args.actions,
            vec![
                ActionArg {
                    hold: "0s".into(),
                    text: "ping".into()
                },
                ActionArg {
                    hold: "1.5s".into(),
                    text: "a=b".into()
                },
                ActionArg {
                    hold: "2m".into(),
                    text: String::new()
                },
            ]
        );

        assert!(parse(&["-a", "ping"]).is_err());
        assert!(parse(&["-a", "-1s=ping"]).is_err());
        assert!(parse(&["-a", "soon=ping"]).is_err());
    }

    #[test]
    fn test_line_options() {
        let args = parse(&[
            "--data-bits",
            "7",
            "--stop-bits",
            "2",
            "--parity",
            "even",
            "--escape",
            "c-style",
        ])
        .unwrap();
        assert_eq!(args.data_bits, Some(7));
        assert_eq!(args.stop_bits, Some(2));
        assert_eq!(args.parity, Some(Parity::Even));
        assert_eq!(args.escape, Some(EscapeScheme::CStyle));

        assert!(parse(&["--parity", "mark"]).is_err());
        assert!(parse(&["--data-bits", "9"]).is_err());
        assert!(parse(&["--escape", "morse"]).is_err());
    }

    #[test]
    fn test_flag_conflicts() {
        assert!(parse(&["--once"]).is_err());
        assert!(parse(&["--send", "--once"]).is_ok());
        assert!(parse(&["--no-log", "--log-dir", "/tmp"]).is_err());
    }

    #[test]
    fn test_apply_to_settings() {
        let args = parse(&[
            "-p",
            "COM3",
            "-b",
            "9600",
            "--cr-before-lf",
            "--no-append-newline",
            "--no-log",
        ])
        .unwrap();
        let mut settings = Settings::default();
        args.apply_to(&mut settings);

        assert_eq!(settings.port.as_deref(), Some("COM3"));
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, 8);
        assert!(settings.precede_lf_with_cr);
        assert!(!settings.append_missing_newline);
        assert!(!settings.save_log);
    }

    #[test]
    fn test_unset_flags_keep_settings() {
        let mut settings = Settings {
            baud_rate: 4800,
            precede_lf_with_cr: true,
            ..Settings::default()
        };
        parse(&[]).unwrap().apply_to(&mut settings);
        assert_eq!(settings.baud_rate, 4800);
        assert!(settings.precede_lf_with_cr);
        assert!(settings.append_missing_newline);
    }
}
