//! Experiment state machine.
//!
//! Idle ⇄ Running, driven by commands from the foreground loop and by the
//! periodic tick. The controller owns the single experiment header and is
//! the only writer of it; the log and the port table are borrowed per
//! call, mirroring the ownership split of the storage and dispatch layers.
//!
//! A Running experiment survives power loss: on boot the persisted header
//! is enough to recompute the current period and re-arm the timer
//! mid-period, so the sampling phase continues seamlessly.

use std::io::Write;

use daq_common::consts::PORT_MAX;
use daq_common::error::{DaqError, DaqResult};
use daq_common::records::ExperimentHeader;
use daq_hal::clock::RealTimeClock;
use daq_hal::store::NonVolatileStore;
use daq_hal::timer::{PeriodicTimer, TickGate};
use tracing::{debug, info, warn};

use crate::memory::Memory;
use crate::port::PortTable;
use crate::responder::Responder;

/// Acknowledgment data for a started M-experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementAck {
    /// Acknowledged port address.
    pub port: u8,
    /// Seconds until the last sample is taken.
    pub seconds_until_done: u32,
    /// Number of samples per port.
    pub count: u32,
}

/// The experiment controller.
pub struct Experiment<C: RealTimeClock, T: PeriodicTimer> {
    clock: C,
    timer: T,
    header: ExperimentHeader,
    current_period: u32,
    /// Period armed for the next experiment [s].
    period: u32,
    max_period: u32,
}

impl<C: RealTimeClock, T: PeriodicTimer> Experiment<C, T> {
    /// Controller in the Idle state with the power-on period.
    pub fn new(clock: C, timer: T, default_period: u32, max_period: u32) -> Self {
        Self {
            clock,
            timer,
            header: ExperimentHeader::default(),
            current_period: 0,
            period: default_period.clamp(1, max_period),
            max_period,
        }
    }

    /// Whether an M-experiment is running.
    pub fn is_running(&self) -> bool {
        self.header.is_running
    }

    /// The owned experiment header.
    pub fn header(&self) -> &ExperimentHeader {
        &self.header
    }

    /// The period the next experiment will use [s].
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Periods completed so far in the running experiment.
    pub fn current_period(&self) -> u32 {
        self.current_period
    }

    /// Attempt to resume a persisted experiment after power-up.
    ///
    /// Recomputes the current period from elapsed wall-clock time; an
    /// experiment whose target has already passed is stopped, anything
    /// else re-arms the timer with the phase offset into the current
    /// period.
    pub fn recover<S: NonVolatileStore, G: TickGate>(&mut self, memory: &mut Memory<S, G>) {
        self.header = memory.load_header();
        if !self.header.is_running {
            return;
        }
        let period = u32::from(self.header.period_length);
        if period == 0 {
            // A zero period cannot drive the timer; the header bytes are
            // stale, not a resumable experiment.
            warn!("persisted header has zero period; stopping");
            self.stop(memory);
            return;
        }

        let elapsed = self.clock.now().saturating_sub(self.header.start_time);
        self.current_period = elapsed / period;
        if self.current_period > self.header.target_count {
            info!(
                current_period = self.current_period,
                target = self.header.target_count,
                "persisted experiment already past target; stopping"
            );
            self.stop(memory);
            return;
        }

        self.period = period;
        memory.persist_header(&self.header);
        self.timer.arm(period, elapsed % period);
        info!(
            port = self.header.port,
            current_period = self.current_period,
            phase = elapsed % period,
            "experiment resumed"
        );
    }

    /// Change the period for the next experiment. Only allowed while
    /// Idle; takes effect at the next `start_m`.
    pub fn set_period(&mut self, new_period: i32) -> DaqResult<u32> {
        if self.header.is_running {
            return Err(DaqError::ExperimentRunning);
        }
        if new_period < 1 || new_period as u32 > self.max_period {
            return Err(DaqError::PeriodOutOfRange {
                requested: new_period,
                max: self.max_period,
            });
        }
        self.period = new_period as u32;
        debug!(period = self.period, "period set");
        Ok(self.period)
    }

    /// Start a scheduled, persisted M-experiment.
    ///
    /// Clears the log — the previous experiment's records are lost — and
    /// arms the timer from phase zero.
    pub fn start_m<S: NonVolatileStore, G: TickGate>(
        &mut self,
        port: i32,
        target_count: i32,
        memory: &mut Memory<S, G>,
        ports: &PortTable,
    ) -> DaqResult<MeasurementAck> {
        if self.header.is_running {
            return Err(DaqError::ExperimentRunning);
        }
        if port < 0 || port as usize > PORT_MAX || (port != 0 && !ports.is_active(port)) {
            return Err(DaqError::InvalidPort { port });
        }
        if target_count < 1 {
            return Err(DaqError::MalformedCommand);
        }
        let target_count = target_count as u32;

        memory.reset();
        self.current_period = 0;
        self.header = ExperimentHeader {
            is_running: true,
            port: port as u8,
            start_time: self.clock.now(),
            period_length: self.period as u16,
            target_count,
        };
        memory.persist_header(&self.header);
        self.timer.arm(self.period, 0);

        info!(
            port,
            target_count,
            period = self.period,
            "measurement experiment started"
        );
        Ok(MeasurementAck {
            port: port as u8,
            seconds_until_done: self.period * target_count,
            count: target_count,
        })
    }

    /// One periodic tick: advance the period, persist the header, sample
    /// and store for the configured port(s), stop when the target is
    /// reached.
    pub fn on_tick<S: NonVolatileStore, G: TickGate>(
        &mut self,
        memory: &mut Memory<S, G>,
        ports: &mut PortTable,
    ) -> DaqResult<()> {
        if !self.header.is_running {
            return Ok(());
        }
        let period_number = self.current_period;
        self.current_period += 1;
        memory.persist_header(&self.header);
        ports.save_port_data(i32::from(self.header.port), period_number, memory)?;

        if self.current_period >= self.header.target_count {
            info!(periods = self.current_period, "experiment complete");
            self.stop(memory);
        }
        Ok(())
    }

    /// Immediate blocking burst: `count` sample rounds separated by the
    /// configured period of real delay, reported but never persisted.
    /// Allowed next to a running M-experiment only for a single sample.
    pub fn start_r<W: Write>(
        &mut self,
        port: i32,
        count: i32,
        ports: &mut PortTable,
        out: &mut Responder<W>,
    ) -> DaqResult<()> {
        if self.header.is_running && count != 1 {
            return Err(DaqError::ExperimentRunning);
        }
        if count < 1 {
            return Err(DaqError::MalformedCommand);
        }

        debug!(port, count, "burst started");
        for round in 1..=count {
            ports.send_port_data(port, self.clock.now(), out)?;
            if round == count {
                out.terminate()?;
            }
            out.end_line()?;
            if count != 1 && round != count {
                self.clock.delay(self.period);
            }
        }
        Ok(())
    }

    /// Stop unconditionally: disarm the timer, clear the running flag,
    /// persist the header.
    pub fn stop<S: NonVolatileStore, G: TickGate>(&mut self, memory: &mut Memory<S, G>) {
        self.timer.disarm();
        self.header.is_running = false;
        memory.persist_header(&self.header);
    }
}
