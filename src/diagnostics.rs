use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{Error, Result};

/// Severity of an engine diagnostic, and the verbosity threshold.
///
/// Lower is more verbose. A message is only handled when its level is at or
/// above the threshold, so `Mute` silences everything, errors included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    #[default]
    Warn = 2,
    Error = 3,
    Mute = 4,
}

impl TryFrom<u8> for LogLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Debug),
            1 => Ok(Self::Info),
            2 => Ok(Self::Warn),
            3 => Ok(Self::Error),
            4 => Ok(Self::Mute),
            other => Err(Error::InvalidArgument(format!("log level {other}"))),
        }
    }
}

static DEFAULT_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

/// Set the level new sessions start with.
pub fn set_log_level(level: LogLevel) {
    DEFAULT_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// The level new sessions start with.
pub fn log_level() -> LogLevel {
    LogLevel::try_from(DEFAULT_LEVEL.load(Ordering::Relaxed)).unwrap_or_default()
}

/// Diagnostic context handed to every store operation.
///
/// Debug, info and warning messages go straight to the `log` facade. Errors
/// are held back and joined into one message, which [`Diagnostics::check`]
/// turns into an [`Error::Store`].
#[derive(Debug, Clone)]
pub struct Diagnostics {
    level: LogLevel,
    pending: Vec<String>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(log_level())
    }
}

impl Diagnostics {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            pending: Vec::new(),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn report(&mut self, level: LogLevel, message: impl Into<String>) {
        if self.level == LogLevel::Mute || level < self.level {
            return;
        }
        let message = message.into();
        match level {
            LogLevel::Debug => log::debug!("{message}"),
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Warn => log::warn!("{message}"),
            LogLevel::Error => self.pending.push(message),
            LogLevel::Mute => {}
        }
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.report(LogLevel::Debug, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.report(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.report(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.report(LogLevel::Error, message);
    }

    /// Accumulated error text, if any.
    pub fn pending(&self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.join("\n"))
        }
    }

    /// Drain pending errors, failing with their text if there were any.
    pub fn check(&mut self) -> Result<()> {
        match self.pending() {
            Some(text) => {
                self.pending.clear();
                Err(Error::Store(text))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_raises_then_clears() {
        let mut diag = Diagnostics::new(LogLevel::Warn);
        diag.error("Failed to encode XMP metadata.");
        match diag.check() {
            Err(Error::Store(msg)) => assert_eq!(msg, "Failed to encode XMP metadata."),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(diag.check().is_ok());
    }

    #[test]
    fn errors_are_joined_in_order() {
        let mut diag = Diagnostics::new(LogLevel::Debug);
        diag.error("first");
        diag.error("second");
        assert_eq!(diag.pending().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn warnings_never_raise() {
        let mut diag = Diagnostics::new(LogLevel::Debug);
        diag.debug("d");
        diag.info("i");
        diag.warn("w");
        assert!(diag.check().is_ok());
    }

    #[test]
    fn mute_suppresses_errors() {
        let mut diag = Diagnostics::new(LogLevel::Mute);
        diag.error("ignored");
        assert!(diag.check().is_ok());
    }

    #[test]
    fn level_from_int() {
        assert_eq!(LogLevel::try_from(0).unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::try_from(4).unwrap(), LogLevel::Mute);
        assert!(matches!(LogLevel::try_from(5), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn level_serde_lowercase() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
        let back: LogLevel = serde_json::from_str("\"mute\"").unwrap();
        assert_eq!(back, LogLevel::Mute);
    }
}
