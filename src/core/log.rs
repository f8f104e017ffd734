//! Diagnostics log for the analyser
//!
//! The analyser does not write to stderr; it appends to an in-memory
//! buffer the embedder can inspect or print. The two user-facing switches
//! map onto levels: failure diagnostics log at `Error`, the step-by-step
//! invariant trace logs at `Trace`.

use alloc::string::String;

/// Log level for analyser output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// No logging
    #[default]
    Off = 0,
    /// Unsatisfied-assertion diagnostics
    Error = 1,
    /// General information
    Info = 2,
    /// Per-instruction invariant trace
    Trace = 3,
}

/// Bounded in-memory log buffer
#[derive(Debug, Clone)]
pub struct AnalysisLog {
    /// Level threshold
    pub level: LogLevel,
    /// Log buffer
    buffer: String,
    /// Maximum buffer size
    max_size: usize,
    /// Whether the buffer has been truncated
    truncated: bool,
}

impl Default for AnalysisLog {
    fn default() -> Self {
        Self::new(LogLevel::Off)
    }
}

impl AnalysisLog {
    /// Create a new log with the given threshold
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            buffer: String::new(),
            max_size: 1024 * 1024,
            truncated: false,
        }
    }

    /// Create a log with a custom maximum size
    pub fn with_max_size(level: LogLevel, max_size: usize) -> Self {
        Self {
            level,
            buffer: String::new(),
            max_size,
            truncated: false,
        }
    }

    /// Check if logging is enabled at the given level
    pub fn enabled(&self, level: LogLevel) -> bool {
        level <= self.level && level != LogLevel::Off
    }

    /// Append a message at the given level
    pub fn log(&mut self, level: LogLevel, msg: &str) {
        if !self.enabled(level) || self.truncated {
            return;
        }
        if self.buffer.len() + msg.len() + 1 > self.max_size {
            self.truncated = true;
            self.buffer.push_str("\n... log truncated ...\n");
            return;
        }
        self.buffer.push_str(msg);
        self.buffer.push('\n');
    }

    /// Log an unsatisfied-assertion diagnostic
    pub fn error(&mut self, msg: &str) {
        self.log(LogLevel::Error, msg);
    }

    /// Log general information
    pub fn info(&mut self, msg: &str) {
        self.log(LogLevel::Info, msg);
    }

    /// Log an invariant-trace line
    pub fn trace(&mut self, msg: &str) {
        self.log(LogLevel::Trace, msg);
    }

    /// Get the log contents
    pub fn contents(&self) -> &str {
        &self.buffer
    }

    /// True if nothing was logged
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the log
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.truncated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_threshold() {
        let mut log = AnalysisLog::new(LogLevel::Error);
        log.error("kept");
        log.trace("dropped");
        assert_eq!(log.contents(), "kept\n");
    }

    #[test]
    fn test_truncation() {
        let mut log = AnalysisLog::with_max_size(LogLevel::Trace, 8);
        log.trace("0123456789");
        assert!(log.contents().contains("truncated"));
    }

    #[test]
    fn test_off_logs_nothing() {
        let mut log = AnalysisLog::default();
        log.error("x");
        assert!(log.is_empty());
    }
}
