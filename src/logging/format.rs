//! Log output: tracing events as JSON lines or plain text, plus single JSON
//! result lines (run summaries) written straight to a writer.

use crate::config::LogConfig;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber. `RUST_LOG` wins over the configured level.
    /// Logs go to stderr so stdout stays free for result lines.
    /// A second call is a no-op.
    pub fn init(config: &LogConfig) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
        let result = if config.json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
        };
        if result.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }

    /// Write one value as a single JSON line, bypassing tracing.
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(w, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Line<'a> {
        run_id: &'a str,
        roc_auc: f64,
    }

    #[test]
    fn emit_json_writes_one_line() {
        let mut buf = Vec::new();
        StructuredLogger::emit_json(&Line { run_id: "r1", roc_auc: 0.5 }, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "{\"run_id\":\"r1\",\"roc_auc\":0.5}\n");
    }

    #[test]
    fn init_twice_does_not_panic() {
        let cfg = LogConfig::default();
        StructuredLogger::init(&cfg);
        StructuredLogger::init(&cfg);
    }
}
