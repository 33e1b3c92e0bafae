//! Serial response formatting.
//!
//! Every response is one line, comma-separated, prefixed with the fixed
//! marker and the device identifier, CRLF-terminated:
//!
//! ```text
//! 00<id>,<port>                          abort / simple ack
//! 00<id>,<port>,<new_period>             period-set ack
//! 00<id>,<port>,<seconds>,<count>        measurement-start ack
//! 00<id>,<port>,<unix_time>,<value>      data report
//! ```
//!
//! Data reports carry no line ending of their own — the caller decides
//! between a line break and the `:` terminator that closes a multi-record
//! reply.

use std::io::Write;

use daq_common::consts::{ABORT_ADDRESS, REPORT_TERMINATOR, RESPONSE_MARKER};
use daq_common::error::DaqResult;
use daq_hal::sensor::Reading;

/// Writer for the serial response protocol.
pub struct Responder<W: Write> {
    out: W,
    daq_id: u8,
}

impl<W: Write> Responder<W> {
    /// Responder stamping every line with the given device id.
    pub fn new(out: W, daq_id: u8) -> Self {
        Self { out, daq_id }
    }

    /// Simple acknowledgment.
    pub fn ack(&mut self, port: u8) -> DaqResult<()> {
        write!(self.out, "{}{},{}\r\n", RESPONSE_MARKER, self.daq_id, port)?;
        Ok(())
    }

    /// Abort response: a simple ack addressed to port 0.
    pub fn abort(&mut self) -> DaqResult<()> {
        self.ack(ABORT_ADDRESS)
    }

    /// Period-set acknowledgment.
    pub fn ack_period(&mut self, port: u8, new_period: u32) -> DaqResult<()> {
        write!(
            self.out,
            "{}{},{},{}\r\n",
            RESPONSE_MARKER, self.daq_id, port, new_period
        )?;
        Ok(())
    }

    /// Measurement-start acknowledgment.
    pub fn ack_measurement(&mut self, port: u8, seconds_until_done: u32, count: u32) -> DaqResult<()> {
        write!(
            self.out,
            "{}{},{},{},{}\r\n",
            RESPONSE_MARKER, self.daq_id, port, seconds_until_done, count
        )?;
        Ok(())
    }

    /// One data report, without a line ending. Non-negative values carry
    /// an explicit `+` so the sign column is always populated.
    pub fn data_report(&mut self, port: u8, unix_time: u32, reading: Reading) -> DaqResult<()> {
        let value = reading.value();
        write!(
            self.out,
            "{}{},{},{},",
            RESPONSE_MARKER, self.daq_id, port, unix_time
        )?;
        if value >= 0.0 {
            self.out.write_all(b"+")?;
        }
        write!(self.out, "{value:.2}")?;
        Ok(())
    }

    /// The terminator closing a multi-record reply.
    pub fn terminate(&mut self) -> DaqResult<()> {
        self.out.write_all(&[REPORT_TERMINATOR])?;
        Ok(())
    }

    /// End the current line.
    pub fn end_line(&mut self) -> DaqResult<()> {
        self.out.write_all(b"\r\n")?;
        Ok(())
    }

    /// Flush the underlying writer (interactive hosts).
    pub fn flush(&mut self) -> DaqResult<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}
