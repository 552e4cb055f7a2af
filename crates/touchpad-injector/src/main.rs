//! Touchpad-Remote entry point.
//!
//! Loads the config, wires the injection stack together, then feeds touch
//! frames from a file or stdin through the gesture classifier until the
//! stream ends or Ctrl-C is pressed.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                    -- TOML, defaults on first run
//!  └─ SystemSinkFactory + InputService -- backends are probed lazily
//!  └─ TouchSession::new()              -- classifier + intent dispatcher
//!  └─ frame loop
//!       ├─ FrameReader::next_frame()   -> TouchSession::handle()
//!       ├─ every backend exhausted     -> exit with error
//!       └─ Ctrl-C / end of stream      -> InputService::shutdown()
//! ```
//!
//! # Usage
//!
//! ```text
//! touchpad-remote [--config PATH] [TOUCH_STREAM]
//! ```
//!
//! Without `TOUCH_STREAM` frames are read from stdin.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use touchpad_injector::application::dispatch_intents::{IntentDispatcher, TouchSession};
use touchpad_injector::application::input_service::InputService;
use touchpad_injector::application::select_backend::BackendState;
use touchpad_injector::infrastructure::command::TokioCommandRunner;
use touchpad_injector::infrastructure::devices::ProcInputDevices;
use touchpad_injector::infrastructure::injection::SystemSinkFactory;
use touchpad_injector::infrastructure::replay::{FrameReader, ReplayError};
use touchpad_injector::infrastructure::storage::config::{
    load_config, load_config_from, AppConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Touchpad-Remote pointer injector.
///
/// Reads touch frames as JSON lines and turns them into pointer events on
/// the configured display.
#[derive(Debug, Parser)]
#[command(
    name = "touchpad-remote",
    about = "Drives a remote display's pointer from a stream of touch frames",
    version
)]
struct Cli {
    /// Config file to use instead of the one in the XDG config directory.
    ///
    /// When given, a missing or unreadable file is a fatal error.
    #[arg(long, short, env = "TOUCHPAD_REMOTE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-lines touch stream; stdin when omitted or `-`.
    stream: Option<PathBuf>,
}

impl Cli {
    /// The touch stream path, or `None` for stdin.
    fn stream_path(&self) -> Option<&Path> {
        self.stream
            .as_deref()
            .filter(|path| *path != Path::new("-"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Config is read before logging starts because it names the log level;
    // a failure is reported once the subscriber is up.
    let loaded = match &args.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let log_level = loaded
        .as_ref()
        .map(|c| c.service.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let config = match loaded {
        Ok(config) => config,
        Err(e) if args.config.is_some() => {
            return Err(anyhow::Error::new(e).context("loading config"));
        }
        Err(e) => {
            warn!("could not load config ({e}); using defaults");
            AppConfig::default()
        }
    };

    info!("Touchpad-Remote starting");

    // ── Injection stack ───────────────────────────────────────────────────────
    let runner = Arc::new(TokioCommandRunner::new(config.injection.command_timeout()));
    let factory = Arc::new(SystemSinkFactory::new(
        config.injection.clone(),
        Arc::new(ProcInputDevices::new()),
        runner.clone(),
    ));
    let service = Arc::new(InputService::new(
        factory,
        runner,
        config.injection.service_settings(),
    ));

    let target = config.display.target();
    let (width, height) = (config.display.width, config.display.height);
    let mut dispatcher = IntentDispatcher::new(Arc::clone(&service), target, width, height);
    dispatcher.select_target(target, width, height).await;
    let mut session = TouchSession::new(config.gesture, dispatcher);

    // ── Touch stream ──────────────────────────────────────────────────────────
    let input: Box<dyn AsyncBufRead + Unpin + Send> = match args.stream_path() {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening touch stream {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut reader = FrameReader::new(input);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(%target, width, height, "Touchpad-Remote ready; reading touch frames");

    // ── Main frame loop ───────────────────────────────────────────────────────
    let outcome: anyhow::Result<()> = loop {
        let next = tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown signal received");
                break Ok(());
            }
            next = reader.next_frame() => next,
        };

        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!(lines = reader.line(), "touch stream ended");
                break Ok(());
            }
            Err(e @ ReplayError::Parse { .. }) => {
                warn!("skipping frame: {e}");
                continue;
            }
            Err(e) => break Err(e.into()),
        };

        let intents = session.handle(frame.action, &frame.samples()).await;
        if !intents.is_empty() {
            debug!(?intents, t = frame.t, "intents dispatched");
        }

        if service.diagnose().await.state == BackendState::Exhausted {
            break Err(anyhow::anyhow!("no injection backend is available"));
        }
    };

    let diagnostics = service.diagnose().await;
    info!(%diagnostics, "session summary");
    service.shutdown().await;

    info!("Touchpad-Remote stopped");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("touchpad-remote").chain(args.iter().copied()))
    }

    #[test]
    fn test_no_arguments_reads_stdin() {
        let cli = parse(&[]).expect("parse");
        assert!(cli.stream_path().is_none());
    }

    #[test]
    fn test_config_and_stream() {
        let cli = parse(&["--config", "/etc/touchpad.toml", "taps.jsonl"]).expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("/etc/touchpad.toml")));
        assert_eq!(cli.stream_path(), Some(Path::new("taps.jsonl")));
    }

    #[test]
    fn test_short_config_flag() {
        let cli = parse(&["-c", "alt.toml"]).expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }

    #[test]
    fn test_dash_means_stdin() {
        let cli = parse(&["-"]).expect("parse");
        assert!(cli.stream_path().is_none());
    }

    #[test]
    fn test_bad_arguments() {
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
