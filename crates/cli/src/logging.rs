//! Dual-mode logging: ANSI console output in the foreground, a
//! non-blocking daily-rolling file appender when run as a background
//! process, both driven by an `EnvFilter` seeded from `LogConfig.level`
//! and overridable via `RUST_LOG`.

use sift_core::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn parse_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Initializes logging per `config`. Returns a guard that must stay alive
/// for the process lifetime when file logging is active (dropping it
/// stops the non-blocking writer thread).
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
  let env_filter = EnvFilter::builder().with_default_directive(parse_level(&config.level).into()).from_env_lossy();

  match &config.file_dir {
    Some(dir) => {
      if std::fs::create_dir_all(dir).is_err() {
        tracing::subscriber::set_global_default(
          tracing_subscriber::fmt().with_env_filter(env_filter).with_ansi(true).finish(),
        )
        .ok();
        return None;
      }
      let appender = tracing_appender::rolling::daily(dir, "sift.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).with_ansi(false).with_writer(writer);
      if config.json {
        subscriber.json().init();
      } else {
        subscriber.init();
      }
      Some(guard)
    }
    None => {
      let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).with_ansi(true);
      if config.json {
        subscriber.json().init();
      } else {
        subscriber.init();
      }
      None
    }
  }
}
