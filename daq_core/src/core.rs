//! The assembled DAQ unit: command intake, routing and tick delivery.
//!
//! One `DaqCore` owns the whole firmware state — the circular log, the
//! port table and the experiment controller — and processes exactly one
//! command to completion before the next line is read. Every line produces
//! exactly one response: the command's acknowledgment, its data reply, or
//! a single abort.

use std::io::Write;

use daq_common::command::Action;
use daq_common::config::DaqConfig;
use daq_common::error::{DaqError, DaqResult};
use daq_hal::clock::RealTimeClock;
use daq_hal::sensor::SensorChannel;
use daq_hal::store::NonVolatileStore;
use daq_hal::timer::{PeriodicTimer, TickGate};
use tracing::{debug, warn};

use daq_common::consts::{ABORT_ADDRESS, PORT_MAX};

use crate::experiment::Experiment;
use crate::intake::{Intake, LineAccumulator};
use crate::memory::Memory;
use crate::parser;
use crate::port::PortTable;
use crate::responder::Responder;

/// The firmware core, generic over its hardware capabilities.
pub struct DaqCore<S, G, C, T>
where
    S: NonVolatileStore,
    G: TickGate,
    C: RealTimeClock,
    T: PeriodicTimer,
{
    memory: Memory<S, G>,
    ports: PortTable,
    experiment: Experiment<C, T>,
    intake: LineAccumulator,
}

impl<S, G, C, T> DaqCore<S, G, C, T>
where
    S: NonVolatileStore,
    G: TickGate,
    C: RealTimeClock,
    T: PeriodicTimer,
{
    /// Assemble the unit from its capabilities and the port wiring.
    pub fn new(
        config: &DaqConfig,
        store: S,
        gate: G,
        clock: C,
        timer: T,
        channels: heapless::Vec<SensorChannel, PORT_MAX>,
    ) -> Self {
        let memory = Memory::initialize(store, gate);
        let ports = PortTable::setup(channels);
        let experiment = Experiment::new(
            clock,
            timer,
            config.device.default_period,
            config.device.max_period,
        );
        Self {
            memory,
            ports,
            experiment,
            intake: LineAccumulator::new(),
        }
    }

    /// Boot-time recovery of a persisted experiment.
    pub fn boot(&mut self) {
        self.experiment.recover(&mut self.memory);
    }

    /// Feed raw serial bytes; dispatches once a full line has arrived.
    pub fn feed<W: Write>(&mut self, byte: u8, out: &mut Responder<W>) -> DaqResult<()> {
        // CR/LF from line-buffered hosts are not part of the grammar.
        if byte == b'\r' || byte == b'\n' {
            return Ok(());
        }
        match self.intake.feed(byte) {
            Intake::Pending => Ok(()),
            Intake::Complete => {
                let line = self.intake.take_line();
                self.handle_line(&line, out)
            }
            Intake::Overflow => {
                let _ = self.intake.take_line();
                warn!("command line exceeded the length bound");
                out.abort()
            }
        }
    }

    /// Parse and execute one command line, emitting exactly one response.
    pub fn handle_line<W: Write>(&mut self, line: &[u8], out: &mut Responder<W>) -> DaqResult<()> {
        match self.dispatch(line, out) {
            Ok(()) => Ok(()),
            // A dead serial link cannot carry an abort either.
            Err(err @ DaqError::Io { .. }) => Err(err),
            Err(error) => {
                warn!(%error, "command rejected");
                out.abort()
            }
        }
    }

    fn dispatch<W: Write>(&mut self, line: &[u8], out: &mut Responder<W>) -> DaqResult<()> {
        let command = parser::parse_line(line)?;
        debug!(?command, "command received");

        match command.action {
            Action::Break => {
                self.experiment.stop(&mut self.memory);
                out.ack(ABORT_ADDRESS)
            }
            Action::None => self.ports.acknowledge_active(command.port, out),
            Action::Letter('P') => {
                let period = self.experiment.set_period(command.argument)?;
                out.ack_period(0, period)
            }
            Action::Letter('M') => {
                let ack = self.experiment.start_m(
                    command.port,
                    command.argument,
                    &mut self.memory,
                    &self.ports,
                )?;
                out.ack_measurement(ack.port, ack.seconds_until_done, ack.count)
            }
            Action::Letter('R') => {
                self.experiment
                    .start_r(command.port, command.argument, &mut self.ports, out)
            }
            Action::Letter('D') => {
                self.ports
                    .send_saved_data(command.argument, &self.memory, out)
            }
            Action::Letter(letter) => {
                debug!(letter = %letter, "unknown command letter");
                Err(DaqError::MalformedCommand)
            }
        }
    }

    /// Deliver one periodic tick to the controller.
    pub fn on_tick(&mut self) -> DaqResult<()> {
        self.experiment
            .on_tick(&mut self.memory, &mut self.ports)
    }

    /// Whether an M-experiment is running.
    pub fn is_running(&self) -> bool {
        self.experiment.is_running()
    }

    /// The circular log.
    pub fn memory(&self) -> &Memory<S, G> {
        &self.memory
    }

    /// The experiment controller.
    pub fn experiment(&self) -> &Experiment<C, T> {
        &self.experiment
    }

    /// The port table.
    pub fn ports(&self) -> &PortTable {
        &self.ports
    }
}
