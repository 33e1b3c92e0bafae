//! Serial command parser.
//!
//! Grammar, resolved in this order (input is one line's bytes up to, not
//! including, the `;` terminator; the last byte must be `!`):
//!
//! 1. Break: exactly four spaces before the `!`.
//! 2. General form `<digits1><letter><digits2>!` — scanning backward from
//!    the byte before `!`, the first non-digit is the command letter;
//!    `digits1` becomes the port, `digits2` the argument.
//! 3. Bare form `<digits>!` — the scan reached the start of the line, so
//!    there is no letter; the number fills both fields.
//!
//! Pure function of the input bytes; no side effects.

use daq_common::command::{Command, FIELD_INVALID};
use daq_common::consts::LINE_MAX;
use daq_common::error::{DaqError, DaqResult};

/// Parse one command line.
///
/// # Errors
///
/// `DaqError::MalformedCommand` when the terminator is missing, the line
/// exceeds the length bound, the byte before `!` is not a digit in the
/// general form, or either digit run is empty or contains a non-digit.
pub fn parse_line(line: &[u8]) -> DaqResult<Command> {
    if line.len() < 2 || line.len() > LINE_MAX {
        return Err(DaqError::MalformedCommand);
    }
    if line[line.len() - 1] != b'!' {
        return Err(DaqError::MalformedCommand);
    }

    if line.len() == 5 && line[..4] == *b"    " {
        return Ok(Command::break_line());
    }

    // Scan backward over the argument digits; `cursor` ends on the
    // command letter, or on index 0 with `bare` set if the whole payload
    // is digits.
    let end = line.len() - 2;
    let mut cursor = end;
    let mut bare = false;
    loop {
        if !line[cursor].is_ascii_digit() {
            break;
        }
        if cursor == 0 {
            bare = true;
            break;
        }
        cursor -= 1;
    }

    if bare {
        return Ok(Command::bare(parse_number(&line[..=end])));
    }

    // A non-digit directly before `!` means the argument run is missing.
    if cursor == end {
        return Err(DaqError::MalformedCommand);
    }

    let letter = line[cursor].to_ascii_uppercase() as char;
    let port = parse_number(&line[..cursor]);
    let argument = parse_number(&line[cursor + 1..=end]);
    if port < 0 || argument < 0 {
        return Err(DaqError::MalformedCommand);
    }
    Ok(Command::lettered(letter, port, argument))
}

/// Manual base-10 parse, right to left, the way the device accumulates
/// digits. An empty run, a non-digit or a value past `i32::MAX` yields the
/// invalid sentinel.
fn parse_number(digits: &[u8]) -> i32 {
    if digits.is_empty() {
        return FIELD_INVALID;
    }
    let mut result: i64 = 0;
    let mut place: i64 = 1;
    for &byte in digits.iter().rev() {
        if !byte.is_ascii_digit() {
            return FIELD_INVALID;
        }
        result += i64::from(byte - b'0') * place;
        if result > i64::from(i32::MAX) {
            return FIELD_INVALID;
        }
        place *= 10;
    }
    result as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_common::command::Action;

    #[test]
    fn break_line() {
        let cmd = parse_line(b"    !").unwrap();
        assert_eq!(cmd.action, Action::Break);
        assert_eq!(cmd.port, FIELD_INVALID);
        assert_eq!(cmd.argument, FIELD_INVALID);
    }

    #[test]
    fn general_form() {
        let cmd = parse_line(b"1M10!").unwrap();
        assert_eq!(cmd.action, Action::Letter('M'));
        assert_eq!(cmd.port, 1);
        assert_eq!(cmd.argument, 10);

        let cmd = parse_line(b"0P100!").unwrap();
        assert_eq!(cmd.action, Action::Letter('P'));
        assert_eq!(cmd.port, 0);
        assert_eq!(cmd.argument, 100);
    }

    #[test]
    fn lowercase_letter_normalized() {
        let cmd = parse_line(b"2r3!").unwrap();
        assert_eq!(cmd.action, Action::Letter('R'));
        assert_eq!(cmd.port, 2);
        assert_eq!(cmd.argument, 3);
    }

    #[test]
    fn bare_number_fills_both_fields() {
        let cmd = parse_line(b"57!").unwrap();
        assert_eq!(cmd.action, Action::None);
        assert_eq!(cmd.port, 57);
        assert_eq!(cmd.argument, 57);

        let cmd = parse_line(b"1!").unwrap();
        assert_eq!(cmd.port, 1);
    }

    #[test]
    fn missing_argument_digits_rejected() {
        assert!(parse_line(b"1X!").is_err());
    }

    #[test]
    fn missing_port_digits_rejected() {
        assert!(parse_line(b"M10!").is_err());
    }

    #[test]
    fn missing_bang_rejected() {
        assert!(parse_line(b"1M10").is_err());
        assert!(parse_line(b"1M10;").is_err());
    }

    #[test]
    fn length_bound_enforced() {
        // 17 bytes incl. `!` is the limit; 18 is out.
        assert!(parse_line(b"123456789012345M!").is_err()); // letter adjacent to `!`
        let cmd = parse_line(b"12345678M1234567!").unwrap();
        assert_eq!(cmd.argument, 1234567);
        assert!(parse_line(b"12345678M12345678!").is_err());
    }

    #[test]
    fn empty_and_tiny_lines_rejected() {
        assert!(parse_line(b"").is_err());
        assert!(parse_line(b"!").is_err());
    }

    #[test]
    fn non_letter_separator_is_carried_through() {
        // Dispatch rejects unknown letters; the grammar itself only
        // requires a non-digit between the two runs.
        let cmd = parse_line(b"1#10!").unwrap();
        assert_eq!(cmd.action, Action::Letter('#'));
    }

    #[test]
    fn spaces_inside_digit_run_rejected() {
        assert!(parse_line(b"1M1 0!").is_err());
        assert!(parse_line(b" 1M10!").is_err());
    }

    #[test]
    fn oversized_number_is_invalid() {
        // 12 digits exceed i32; the bare form keeps the sentinel and the
        // dispatcher aborts on it.
        let cmd = parse_line(b"999999999999!").unwrap();
        assert_eq!(cmd.port, FIELD_INVALID);
        assert!(parse_line(b"1M999999999999!").is_err());
    }
}
