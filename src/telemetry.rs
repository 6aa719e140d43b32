//! Structured logging for the Curió backend.
//!
//! Log targets:
//! - `curio_backend`: startup, shutdown and failed requests
//! - `gamification`: activity reports, level ups, achievement unlocks
//! - `problem`: problem bank, daily pick and submissions
//! - `tutor`: chat sessions and reply cache warm-up
//! - `cache`: TTL cache hits, misses and evictions
//!
//! `LOG_LEVEL` overrides the directives below; `LOG_FORMAT=json` switches to JSON lines.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "info,curio_backend=debug,gamification=debug,problem=info,tutor=info,cache=info,tower_http=info,axum=info";

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
