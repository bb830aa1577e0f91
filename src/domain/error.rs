//! Domain error types.
//!
//! Structural problems (bad configuration, unknown references, broken price
//! data) fail fast through [`TraderError`]. Numeric guards and per-condition
//! resolution failures are recovered where they happen and never surface here.

/// A parse error with position information for logic-tree parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Broad classification used for exit codes and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Rule,
    DataIntegrity,
    Io,
}

/// Top-level error type for sessiontrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid logic tree: {reason}")]
    LogicInvalid { reason: String },

    #[error("cannot resolve reference {reference}: {reason}")]
    ReferenceResolution { reference: String, reason: String },

    #[error("unknown session '{name}'")]
    UnknownSession { name: String },

    #[error("unknown indicator function '{function}' for '{name}'")]
    UnknownIndicator { name: String, function: String },

    #[error("no price data for timeframe {timeframe}")]
    DataNotFound { timeframe: String },

    #[error("timeframe {timeframe} is missing column '{column}'")]
    MissingColumn { timeframe: String, column: String },

    #[error("timeframe {timeframe}: timestamps not strictly increasing at row {row}")]
    NonMonotonicTime { timeframe: String, row: usize },

    #[error("timeframe {timeframe} has no rows")]
    EmptySeries { timeframe: String },

    #[error("timeframe {timeframe}: column '{column}' has {found} values, expected {expected}")]
    LengthMismatch {
        timeframe: String,
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("timeframe {timeframe}: row {row}: {reason}")]
    MalformedRow {
        timeframe: String,
        row: usize,
        reason: String,
    },

    #[error("insufficient data for {context} on {timeframe}: have {bars} bars, need {minimum}")]
    InsufficientData {
        context: String,
        timeframe: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TraderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::UnknownSession { .. }
            | TraderError::UnknownIndicator { .. } => ErrorKind::Configuration,
            TraderError::RuleParse(_)
            | TraderError::LogicInvalid { .. }
            | TraderError::ReferenceResolution { .. } => ErrorKind::Rule,
            TraderError::DataNotFound { .. }
            | TraderError::MissingColumn { .. }
            | TraderError::NonMonotonicTime { .. }
            | TraderError::EmptySeries { .. }
            | TraderError::LengthMismatch { .. }
            | TraderError::MalformedRow { .. }
            | TraderError::InsufficientData { .. } => ErrorKind::DataIntegrity,
            TraderError::Io(_) | TraderError::Csv(_) | TraderError::Json(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        TraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Configuration => 2,
            ErrorKind::Rule => 4,
            ErrorKind::DataIntegrity => 5,
        };
        std::process::ExitCode::from(code)
    }
}
