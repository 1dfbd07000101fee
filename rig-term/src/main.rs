//! sendrig
//!
//! Opens a serial device, replays a schedule of timed writes to it and logs
//! everything sent and received.

mod cli;
mod console;
mod schedule_file;
mod serial;
mod settings;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use rig_engine::{log_file_name, FanoutSink, FileSink, LogSink, Session, TracingSink};
use tokio_serial::SerialStream;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Args;
use schedule_file::ScheduleFile;
use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Include all our crates in the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sendrig=info,rig_engine=info,rig_escape=info,rig_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut settings = Settings::load();
    args.apply_to(&mut settings);

    let Some(port) = settings.port.clone() else {
        bail!("no serial port given; pass --port");
    };
    let (stream, sink) = connect(&settings, &port)?;

    if args.save {
        match settings.save() {
            Ok(path) => info!("Saved settings to {}", path.display()),
            Err(e) => warn!("{}", e),
        }
    }

    let mut session = Session::open(port, stream, sink);
    session.set_scheme(settings.escape);
    session.set_line_ending(settings.line_ending());
    session.set_repeat(args.repeat);

    let loaded = load_schedule(&args, &mut session);
    if let Err(e) = loaded {
        session.close().await?;
        return Err(e);
    }

    if args.send {
        if let Err(e) = session.start_run() {
            session.close().await?;
            return Err(e).context("failed to start sending");
        }
    }

    let outcome = if args.once {
        match session.wait_run().await {
            Some(Err(e)) => Err(anyhow::Error::new(e).context("send failed")),
            Some(Ok(report)) => {
                info!(
                    "Sent {} bytes in {} writes ({:?})",
                    report.bytes, report.writes, report.outcome
                );
                Ok(())
            }
            None => Ok(()),
        }
    } else {
        console::run(&mut session).await.map_err(anyhow::Error::from)
    };

    session.close().await?;
    outcome
}

/// Open the port, then the log; no log file is left behind for a port that
/// fails to open
fn connect(settings: &Settings, port: &str) -> anyhow::Result<(SerialStream, Arc<dyn LogSink>)> {
    let line = settings.line_config(port.to_string());
    let stream = serial::open(&line).with_context(|| format!("failed to open {}", line))?;
    let sink = build_sink(settings, port)?;
    Ok((stream, sink))
}

/// Tracing always; a log file unless disabled
fn build_sink(settings: &Settings, port: &str) -> anyhow::Result<Arc<dyn LogSink>> {
    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if settings.save_log {
        let Some(dir) = settings.log_directory() else {
            bail!("could not determine a log directory; pass --log-dir or --no-log");
        };
        let path = log_file_name(&dir, port, chrono::Local::now());
        let file = FileSink::create(&path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        info!("Logging to {}", path.display());
        sink.push(Arc::new(file));
    }
    Ok(Arc::new(sink))
}

/// Schedule file first, then `--action` entries in order
fn load_schedule<T: rig_engine::Transport>(
    args: &Args,
    session: &mut Session<T>,
) -> anyhow::Result<()> {
    if let Some(path) = &args.schedule {
        let file = ScheduleFile::load(path)?;
        let count = file.apply(path, session)?;
        info!("Loaded {} entries from {}", count, path.display());
    }
    for (i, action) in args.actions.iter().enumerate() {
        session
            .add_action(&action.hold, &action.text)
            .with_context(|| format!("--action #{} ({}={})", i + 1, action.hold, action.text))?;
    }
    Ok(())
}
