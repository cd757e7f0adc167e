//! Severity-tagged logging.
//!
//! The storage layer has no output device of its own: the boot layer installs a
//! [`Logger`] once and every message is forwarded to it. Until then, messages are dropped.
use spin::Once;

static LOGGER: Once<&'static dyn Logger> = Once::new();

/// Destination for log messages.
pub trait Logger: Sync {
    fn log(&self, severity: Severity, args: core::fmt::Arguments);
}

/// Install the logger.
///
/// Only the first call has an effect.
pub fn set_logger(logger: &'static dyn Logger) {
    LOGGER.call_once(|| logger);
}

#[must_use]
#[inline]
pub fn logger_installed() -> bool {
    LOGGER.is_completed()
}

pub fn log(severity: Severity, args: core::fmt::Arguments) {
    if let Some(logger) = LOGGER.get() {
        logger.log(severity, args);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warn => "WARN ",
            Self::Error => "ERROR",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str().trim_end())
    }
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(debug_assertions)]
        $crate::log::log($crate::log::Severity::Debug, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Severity::Info, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Severity::Warn, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Severity::Error, format_args!($($arg)*));
    };
}
