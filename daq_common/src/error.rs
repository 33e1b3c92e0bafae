//! Error types shared across the DAQ workspace.

use thiserror::Error;

/// Errors surfaced by the firmware core.
///
/// Every variant maps to a single abort line on the serial interface; none
/// of them are fatal — the foreground loop always returns to command
/// intake afterwards.
#[derive(Debug, Error)]
pub enum DaqError {
    /// Line failed the command grammar (terminator, length or digit runs).
    #[error("malformed command line")]
    MalformedCommand,

    /// Port address is out of range or not active.
    #[error("invalid port address: {port}")]
    InvalidPort {
        /// The offending port field as parsed.
        port: i32,
    },

    /// A scheduled experiment is already running.
    #[error("experiment already running")]
    ExperimentRunning,

    /// Requested period exceeds what the timer can represent.
    #[error("period {requested}s outside 1..={max}s")]
    PeriodOutOfRange {
        /// The requested period [s].
        requested: i32,
        /// The largest accepted period [s].
        max: u32,
    },

    /// Replay requested while the data log holds no records.
    #[error("data log is empty")]
    EmptyLog,

    /// Setup-time probe of a sensor failed.
    #[error("sensor probe failed on port {port}")]
    SensorProbeFailed {
        /// 1-based port address of the failed probe.
        port: u8,
    },

    /// Host serial writer error.
    #[error("serial I/O error: {source}")]
    Io {
        /// Source I/O error.
        #[from]
        source: std::io::Error,
    },
}

/// Result type for DAQ operations.
pub type DaqResult<T> = Result<T, DaqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DaqError::InvalidPort { port: 9 };
        assert!(err.to_string().contains('9'));

        let err = DaqError::PeriodOutOfRange {
            requested: 70_000,
            max: 65_535,
        };
        assert!(err.to_string().contains("70000"));
        assert!(err.to_string().contains("65535"));
    }
}
