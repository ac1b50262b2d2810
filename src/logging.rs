//! Log capture for the `/bot_logs` command.
//!
//! A tracing layer copies every event into a bounded ring buffer so recent
//! log lines can be shown in Discord without shell access to the host.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Lines kept in memory
pub const DEFAULT_CAPACITY: usize = 500;

/// A single log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    /// Format as a string for display
    pub fn format(&self) -> String {
        format!(
            "{} {:<5} [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.target,
            self.message
        )
    }
}

/// Buffer that stores recent log entries
pub struct LogBuffer {
    recent: parking_lot::RwLock<VecDeque<LogEntry>>,
    max_entries: usize,
}

impl LogBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self {
            recent: parking_lot::RwLock::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    pub fn push(&self, entry: LogEntry) {
        let mut recent = self.recent.write();
        if recent.len() >= self.max_entries {
            recent.pop_front();
        }
        recent.push_back(entry);
    }

    /// The last `count` entries at `min_level` or more severe, oldest first
    pub fn get_recent(&self, count: usize, min_level: Level) -> Vec<LogEntry> {
        let recent = self.recent.read();
        // Level ordering in tracing: ERROR < WARN < INFO < DEBUG < TRACE
        let mut matching: Vec<LogEntry> = recent
            .iter()
            .rev()
            .filter(|entry| entry.level <= min_level)
            .take(count)
            .cloned()
            .collect();
        matching.reverse();
        matching
    }

    pub fn len(&self) -> usize {
        self.recent.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.read().is_empty()
    }
}

/// Join entries into one block no longer than `limit` characters,
/// dropping the oldest lines first.
pub fn render_block(entries: &[LogEntry], limit: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut used = 0;
    for entry in entries.iter().rev() {
        let line = entry.format();
        let len = line.chars().count() + 1;
        if used + len > limit {
            if lines.is_empty() {
                lines.push(line.chars().take(limit.saturating_sub(1)).collect());
            }
            break;
        }
        used += len;
        lines.push(line);
    }
    lines.reverse();
    lines.join("\n")
}

/// Shared log buffer type
pub type SharedLogBuffer = Arc<LogBuffer>;

pub fn create_log_buffer(max_entries: usize) -> SharedLogBuffer {
    Arc::new(LogBuffer::new(max_entries))
}

/// Tracing layer that captures logs to the buffer
pub struct LogCaptureLayer {
    buffer: SharedLogBuffer,
}

impl LogCaptureLayer {
    pub fn new(buffer: SharedLogBuffer) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.buffer.push(LogEntry {
            timestamp: chrono::Utc::now(),
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
        });
    }
}

/// Visitor to extract message from tracing events
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else if self.message.is_empty() {
            self.message = format!("{}={}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: Level, message: &str) -> LogEntry {
        LogEntry {
            timestamp: chrono::Utc::now(),
            level,
            target: "guildkeeper".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_log_buffer() {
        let buffer = create_log_buffer(3);
        buffer.push(entry(Level::INFO, "Message 1"));
        buffer.push(entry(Level::INFO, "Message 2"));

        let recent = buffer.get_recent(10, Level::TRACE);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "Message 1");
        assert_eq!(recent[1].message, "Message 2");
    }

    #[test]
    fn test_log_buffer_overflow() {
        let buffer = create_log_buffer(2);
        for i in 1..=5 {
            buffer.push(entry(Level::INFO, &format!("Message {}", i)));
        }

        let recent = buffer.get_recent(10, Level::TRACE);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "Message 4");
        assert_eq!(recent[1].message, "Message 5");
    }

    #[test]
    fn test_level_filter() {
        let buffer = create_log_buffer(10);
        buffer.push(entry(Level::DEBUG, "noise"));
        buffer.push(entry(Level::WARN, "careful"));
        buffer.push(entry(Level::INFO, "hello"));
        buffer.push(entry(Level::ERROR, "broken"));

        let warnings = buffer.get_recent(10, Level::WARN);
        let messages: Vec<_> = warnings.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["careful", "broken"]);

        let last = buffer.get_recent(1, Level::INFO);
        assert_eq!(last[0].message, "broken");
    }

    #[test]
    fn test_render_block_drops_oldest() {
        let entries: Vec<_> = (0..50)
            .map(|i| entry(Level::INFO, &format!("line number {}", i)))
            .collect();
        let block = render_block(&entries, 300);
        assert!(block.chars().count() <= 300);
        assert!(block.ends_with("line number 49"));
        assert!(!block.contains("line number 0\n"));
    }

    #[test]
    fn test_render_block_truncates_single_long_line() {
        let entries = vec![entry(Level::INFO, &"x".repeat(500))];
        let block = render_block(&entries, 100);
        assert_eq!(block.chars().count(), 99);
    }
}
