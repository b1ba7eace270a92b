//! Log file helpers for the binary's subscriber

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::field::{Field, Visit};
use tracing::{Event, Metadata};
use tracing_subscriber::layer::{Context, Filter};

/// Directory the dated log files are written to by default
pub const DEFAULT_LOG_DIR: &str = "logs";

/// `logs/service-monitor-<YYYY-mm-dd>.log`
pub fn default_log_path(date: NaiveDate) -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIR).join(format!("service-monitor-{}.log", date.format("%Y-%m-%d")))
}

/// Per-layer filter that keeps only events with a field containing a text
///
/// Without a text every event passes.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    needle: Option<String>,
}

impl MessageFilter {
    pub fn new(needle: Option<String>) -> Self {
        Self {
            needle: needle.filter(|n| !n.is_empty()),
        }
    }
}

struct ContainsVisitor<'a> {
    needle: &'a str,
    found: bool,
}

impl Visit for ContainsVisitor<'_> {
    fn record_str(&mut self, _field: &Field, value: &str) {
        self.found |= value.contains(self.needle);
    }

    fn record_debug(&mut self, _field: &Field, value: &dyn fmt::Debug) {
        if !self.found {
            self.found = format!("{value:?}").contains(self.needle);
        }
    }
}

impl<S> Filter<S> for MessageFilter {
    fn enabled(&self, _meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        true
    }

    fn event_enabled(&self, event: &Event<'_>, _cx: &Context<'_, S>) -> bool {
        let Some(needle) = &self.needle else {
            return true;
        };

        let mut visitor = ContainsVisitor {
            needle,
            found: false,
        };
        event.record(&mut visitor);
        visitor.found
    }
}
