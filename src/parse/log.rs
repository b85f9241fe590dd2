//! parse::log
//!
//! The daemon's `[<unix-timestamp>] <message>` log-line form.
//!
//! Only lines matching the pattern become entries; anything else is
//! skipped. A parsed entry re-renders byte-exactly.

use chrono::{DateTime, Utc};

/// One matched log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Seconds since the Unix epoch, as written by the daemon.
    pub timestamp: i64,
    /// Everything after the closing bracket and its separating space.
    pub message: String,
}

impl LogLine {
    /// Parse one line; `None` if it doesn't match the form.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let close = rest.find(']')?;
        let digits = &rest[..close];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let timestamp: i64 = digits.parse().ok()?;
        let message = rest[close + 1..].strip_prefix(' ')?;
        Some(Self {
            timestamp,
            message: message.to_string(),
        })
    }

    /// The entry's timestamp as a UTC datetime.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// Re-render the original line (without trailing newline).
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp, self.message)
    }
}

/// Parse every matching line of a log excerpt, in order.
pub fn parse_log(input: &str) -> Vec<LogLine> {
    input.lines().filter_map(LogLine::parse).collect()
}
