//! Parsed command model for the serial protocol.
//!
//! A `Command` is ephemeral — it lives for one dispatch and is never
//! persisted. Numeric fields use a negative sentinel for "absent", the
//! same convention the wire parser reports for an empty digit run.

/// Sentinel for an absent or unparseable numeric field.
pub const FIELD_INVALID: i32 = -1;

/// What a parsed line asks the device to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Bare-number query; no command letter present.
    None,
    /// Break line (four spaces): stop the running experiment.
    Break,
    /// Lettered command (`P`, `M`, `R`, `D`, ...), normalized to uppercase.
    Letter(char),
}

/// One parsed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// The requested action.
    pub action: Action,
    /// Port address field; `FIELD_INVALID` when absent.
    pub port: i32,
    /// Numeric argument field; `FIELD_INVALID` when absent.
    pub argument: i32,
}

impl Command {
    /// A break line; both numeric fields are absent.
    pub const fn break_line() -> Self {
        Self {
            action: Action::Break,
            port: FIELD_INVALID,
            argument: FIELD_INVALID,
        }
    }

    /// A bare-number query; both fields carry the same value.
    pub const fn bare(value: i32) -> Self {
        Self {
            action: Action::None,
            port: value,
            argument: value,
        }
    }

    /// A lettered command with both fields populated.
    pub const fn lettered(letter: char, port: i32, argument: i32) -> Self {
        Self {
            action: Action::Letter(letter),
            port,
            argument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_line_uses_sentinels() {
        let cmd = Command::break_line();
        assert_eq!(cmd.action, Action::Break);
        assert_eq!(cmd.port, FIELD_INVALID);
        assert_eq!(cmd.argument, FIELD_INVALID);
    }

    #[test]
    fn bare_query_mirrors_value() {
        let cmd = Command::bare(57);
        assert_eq!(cmd.action, Action::None);
        assert_eq!(cmd.port, 57);
        assert_eq!(cmd.argument, 57);
    }
}
