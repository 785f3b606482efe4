//! In-memory execution log, mirroring the original's `ListHandler` /
//! `LOG_CAPTURE_LIST`: every step emits a `tracing` event, and this layer
//! also appends a formatted line to a shared buffer so a caller (the
//! external HTTP control surface, or a test) can read back the full
//! execution log after the run finishes, win or lose.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Shared, clonable handle to the captured log lines.
#[derive(Clone, Default)]
pub struct LogSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line captured so far, in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// The whole log as one `\n`-joined string, matching the original's
    /// `"\n".join(LOG_CAPTURE_LIST)` contract.
    pub fn render(&self) -> String {
        self.lines().join("\n")
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap().clear();
    }

    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for LogSink {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        let marker = match level {
            Level::ERROR => "ERROR",
            Level::WARN => "WARN",
            Level::INFO => "INFO",
            Level::DEBUG => "DEBUG",
            Level::TRACE => "TRACE",
        };
        self.push(format!("{marker} | {}", visitor.message));
    }
}
