//! Structured Logging with Sensitive Data Redaction
//!
//! Log entries are emitted as `tracing` events. Field values are filtered
//! before they reach the subscriber:
//! - Private keys and seeds are fully redacted
//! - Proofs, call data and other long hex blobs are abbreviated
//!
//! Call [`init_tracing`] once at startup to install a `tracing-subscriber`
//! formatter driven by `RUST_LOG`.

use std::fmt;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log entry
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field to the log entry (auto-redacts sensitive data)
    pub fn field(mut self, key: &'static str, value: impl fmt::Debug) -> Self {
        let value_str = format!("{:?}", value);
        let value_str = value_str.trim_matches('"').to_string();
        let rendered = redact_if_sensitive(key, &value_str);
        self.fields.push((key, rendered));
        self
    }

    fn render_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Emit the entry through `tracing`
    pub fn log(self) {
        let fields = self.render_fields();
        let module = self.module;
        let message = self.message.as_str();

        match self.level {
            LogLevel::Debug => tracing::debug!(module, %fields, "{}", message),
            LogLevel::Info => tracing::info!(module, %fields, "{}", message),
            LogLevel::Warn => tracing::warn!(module, %fields, "{}", message),
            LogLevel::Error => tracing::error!(module, %fields, "{}", message),
        }
    }
}

impl LogLevel {
    /// Whether the installed subscriber would record an entry at this level
    pub fn enabled(self) -> bool {
        match self {
            LogLevel::Debug => tracing::enabled!(tracing::Level::DEBUG),
            LogLevel::Info => tracing::enabled!(tracing::Level::INFO),
            LogLevel::Warn => tracing::enabled!(tracing::Level::WARN),
            LogLevel::Error => tracing::enabled!(tracing::Level::ERROR),
        }
    }
}

/// Redact or abbreviate a value depending on its key
fn redact_if_sensitive(key: &str, value: &str) -> String {
    let key_lower = key.to_lowercase();

    // Keys that should always be fully redacted
    let fully_redacted_keys = [
        "private_key", "privatekey", "secret", "seed", "mnemonic",
        "password", "passphrase", "signing_key",
    ];

    for sensitive_key in &fully_redacted_keys {
        if key_lower.contains(sensitive_key) {
            return redact_value(value);
        }
    }

    // Large opaque payloads - show the edges and the size
    let blob_keys = ["proof", "data", "initializer", "calldata", "bytecode"];
    for blob_key in &blob_keys {
        if key_lower.contains(blob_key) {
            return abbreviate_blob(value);
        }
    }

    value.to_string()
}

/// Fully redact a sensitive value
fn redact_value(value: &str) -> String {
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }

    let len = value.len();
    if len <= 4 {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED:{}chars]", len)
    }
}

/// Abbreviate a hex blob (show first 10 and last 8 chars plus byte length).
/// Anything that is not plain hex is only summarized by its length.
fn abbreviate_blob(blob: &str) -> String {
    let trimmed = blob.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return format!("[NON-HEX:{}chars]", trimmed.chars().count());
    }

    if trimmed.len() <= 66 {
        return trimmed.to_string();
    }

    let prefix = &trimmed[..10];
    let suffix = &trimmed[trimmed.len() - 8..];

    format!("{}...{}[{}B]", prefix, suffix, body.len() / 2)
}

/// Build and emit a [`LogEntry`] at `$level`. Field values are taken by
/// reference and pass through the redaction rules above; nothing is
/// rendered when the level is disabled.
#[doc(hidden)]
#[macro_export]
macro_rules! log_at {
    ($level:ident, $module:expr, $msg:expr $(, $key:ident = $value:expr)* $(,)?) => {
        if $crate::utils::logging::LogLevel::$level.enabled() {
            $crate::utils::logging::LogEntry::new($crate::utils::logging::LogLevel::$level, $module, $msg)
                $(.field(stringify!($key), &$value))*
                .log()
        }
    };
}

/// `log_debug!(MODULE, "message", key = value, ...)`
#[macro_export]
macro_rules! log_debug {
    ($($args:tt)*) => { $crate::log_at!(Debug, $($args)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($args:tt)*) => { $crate::log_at!(Info, $($args)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($args:tt)*) => { $crate::log_at!(Warn, $($args)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => { $crate::log_at!(Error, $($args)*) };
}
