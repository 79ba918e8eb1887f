use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "BIZDESK_LOG";

fn log_dir() -> Option<PathBuf> {
  let dir = dirs::data_dir()?.join("bizdesk");
  std::fs::create_dir_all(&dir).ok()?;
  Some(dir)
}

/// Install the global subscriber.
///
/// Logs go to `bizdesk.log` in the user data directory so they never mix
/// with command output; `--verbose` sends them to stderr instead. The
/// filter comes from `BIZDESK_LOG` when set.
pub fn setup_tracing(verbose: bool) {
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
    if verbose {
      EnvFilter::new("bizdesk=debug,warn")
    } else {
      EnvFilter::new("warn")
    }
  });

  if !verbose {
    if let Some(log_path) = log_dir().map(|dir| dir.join("bizdesk.log")) {
      if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let file_layer = tracing_subscriber::fmt::layer()
          .with_writer(Mutex::new(file))
          .with_ansi(false)
          .with_target(true);

        tracing_subscriber::registry()
          .with(filter)
          .with(file_layer)
          .init();

        tracing::debug!(path = ?log_path, "tracing initialized");
        return;
      }
    }
  }

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
}
