//! Domain error types.

/// Top-level error type for backloop.
#[derive(Debug, thiserror::Error)]
pub enum BackloopError {
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

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackloopError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        BackloopError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        BackloopError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&BackloopError> for std::process::ExitCode {
    fn from(err: &BackloopError) -> Self {
        let code: u8 = match err {
            BackloopError::Io(_) => 1,
            BackloopError::ConfigParse { .. }
            | BackloopError::ConfigMissing { .. }
            | BackloopError::ConfigInvalid { .. } => 2,
            BackloopError::Data { .. } | BackloopError::NoData { .. } | BackloopError::Csv(_) => {
                5
            }
            BackloopError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_formats_section_and_key() {
        let err = BackloopError::invalid("strategy", "window", "window must be at least 2");
        assert_eq!(
            err.to_string(),
            "invalid config value [strategy] window: window must be at least 2"
        );
    }

    #[test]
    fn missing_formats_section_and_key() {
        let err = BackloopError::missing("backtest", "symbols");
        assert_eq!(err.to_string(), "missing config key [backtest] symbols");
    }

    #[test]
    fn exit_codes_by_category() {
        use std::process::ExitCode;
        let config = BackloopError::missing("backtest", "symbols");
        let data = BackloopError::NoData {
            symbol: "AAPL".into(),
        };
        assert_eq!(ExitCode::from(&config), ExitCode::from(2));
        assert_eq!(ExitCode::from(&data), ExitCode::from(5));
    }
}
