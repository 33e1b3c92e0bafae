//! Logical port table and sensor dispatch.
//!
//! A fixed table binds each port address to one sensor channel at setup.
//! Port address 0 fans a request out over every active port; a single
//! address targets one. Readings travel as tagged values while live and as
//! 4-byte bit patterns while stored — the owning port's sensor kind is the
//! decode key on replay.

use std::io::Write;

use daq_common::config::{DaqConfig, SensorKind};
use daq_common::consts::PORT_MAX;
use daq_common::error::{DaqError, DaqResult};
use daq_common::records::DataRecord;
use daq_hal::sensor::{Reading, SensorChannel, SimPhotodiode, SimThermocouple};
use daq_hal::store::NonVolatileStore;
use daq_hal::timer::TickGate;
use tracing::debug;

use crate::memory::Memory;
use crate::responder::Responder;

/// One table slot: a sensor channel plus its activation flag.
#[derive(Debug)]
pub struct LogicalPort {
    channel: SensorChannel,
    active: bool,
}

/// The fixed port table.
pub struct PortTable {
    ports: heapless::Vec<LogicalPort, PORT_MAX>,
    /// Highest active port address (1-based); 0 when none are active.
    last_port: u8,
    active_count: u8,
}

impl PortTable {
    /// Bind sensor channels to the table and probe each for activation.
    ///
    /// Temperature ports activate only when the probe conversion reports
    /// no fault and a plausible non-zero finite value; light ports
    /// activate unconditionally. Activation is decided once — a sensor
    /// that starts failing later is not re-detected per command.
    pub fn setup(channels: heapless::Vec<SensorChannel, PORT_MAX>) -> Self {
        let mut ports = heapless::Vec::new();
        let mut last_port = 0u8;
        let mut active_count = 0u8;

        for (slot, mut channel) in channels.into_iter().enumerate() {
            let address = slot as u8 + 1;
            let active = match &mut channel {
                SensorChannel::Temperature(sensor) => {
                    let probe = sensor.measure();
                    let healthy = sensor.faults().is_empty();
                    if !healthy {
                        debug!(port = address, faults = ?sensor.faults(), "probe failed");
                    }
                    healthy && probe != 0.0 && probe.is_finite()
                }
                SensorChannel::Light(_) => true,
            };
            if active {
                last_port = address;
                active_count += 1;
            }
            if ports.push(LogicalPort { channel, active }).is_err() {
                break;
            }
        }

        debug!(active_count, last_port, "port table initialized");
        Self {
            ports,
            last_port,
            active_count,
        }
    }

    /// Build simulation channels from the configured port kinds.
    pub fn sim_channels(config: &DaqConfig) -> heapless::Vec<SensorChannel, PORT_MAX> {
        let mut channels = heapless::Vec::new();
        for port in &config.ports {
            let channel = match port.kind {
                SensorKind::Temperature => {
                    SensorChannel::Temperature(Box::new(SimThermocouple::new(21.5)))
                }
                SensorKind::Light => SensorChannel::Light(Box::new(SimPhotodiode::new(480.0))),
            };
            if channels.push(channel).is_err() {
                break;
            }
        }
        channels
    }

    /// Whether `port` names an existing, active port (1-based).
    pub fn is_active(&self, port: i32) -> bool {
        port > 0
            && (port as usize) <= self.ports.len()
            && self.ports[port as usize - 1].active
    }

    /// Number of active ports.
    pub fn active_count(&self) -> u8 {
        self.active_count
    }

    /// Highest active port address; 0 when none.
    pub fn last_port(&self) -> u8 {
        self.last_port
    }

    /// Sensor kind of a port address, if the address exists.
    pub fn kind_of(&self, port: u8) -> Option<SensorKind> {
        if port == 0 || usize::from(port) > self.ports.len() {
            return None;
        }
        Some(self.ports[usize::from(port) - 1].channel.kind())
    }

    /// Answer a bare-number activity query: ack the address when active.
    pub fn acknowledge_active<W: Write>(
        &self,
        port: i32,
        out: &mut Responder<W>,
    ) -> DaqResult<()> {
        if !self.is_active(port) {
            return Err(DaqError::InvalidPort { port });
        }
        out.ack(port as u8)
    }

    /// Emit one report per active port (address 0) or one report for a
    /// single active port. Reports carry no final line ending — the
    /// caller closes the reply.
    pub fn send_port_data<W: Write>(
        &mut self,
        port: i32,
        now: u32,
        out: &mut Responder<W>,
    ) -> DaqResult<()> {
        if port == 0 {
            return self.send_all(now, out);
        }
        if !self.is_active(port) {
            return Err(DaqError::InvalidPort { port });
        }
        let reading = self.ports[port as usize - 1].channel.measure();
        out.data_report(port as u8, now, reading)
    }

    fn send_all<W: Write>(&mut self, now: u32, out: &mut Responder<W>) -> DaqResult<()> {
        for slot in 0..self.ports.len() {
            if !self.ports[slot].active {
                continue;
            }
            let address = slot as u8 + 1;
            let reading = self.ports[slot].channel.measure();
            out.data_report(address, now, reading)?;
            if address != self.last_port {
                out.end_line()?;
            }
        }
        Ok(())
    }

    /// Sample and append to the log (address 0 fans out over active
    /// ports). The configured single port was validated when the
    /// experiment started, so only the address range is checked here.
    pub fn save_port_data<S: NonVolatileStore, G: TickGate>(
        &mut self,
        port: i32,
        period_number: u32,
        memory: &mut Memory<S, G>,
    ) -> DaqResult<()> {
        if port < 0 || port as usize > self.ports.len() {
            return Err(DaqError::InvalidPort { port });
        }
        if port == 0 {
            for slot in 0..self.ports.len() {
                if self.ports[slot].active {
                    self.save_one(slot as u8 + 1, period_number, memory);
                }
            }
            return Ok(());
        }
        self.save_one(port as u8, period_number, memory);
        Ok(())
    }

    fn save_one<S: NonVolatileStore, G: TickGate>(
        &mut self,
        address: u8,
        period_number: u32,
        memory: &mut Memory<S, G>,
    ) {
        let reading = self.ports[usize::from(address) - 1].channel.measure();
        memory.append(&DataRecord {
            period_number,
            port: address,
            data: reading.encode(),
        });
    }

    /// Replay the last `amount * active_count` stored records oldest
    /// first, reconstructing each record's wall-clock time from the
    /// persisted experiment header.
    pub fn send_saved_data<S: NonVolatileStore, G: TickGate, W: Write>(
        &self,
        amount: i32,
        memory: &Memory<S, G>,
        out: &mut Responder<W>,
    ) -> DaqResult<()> {
        if memory.is_empty() {
            return Err(DaqError::EmptyLog);
        }
        let header = memory.load_header();
        let requested = amount.saturating_mul(i32::from(self.active_count));
        let start = memory.address_from_count(requested);
        let len = memory.len();

        for logical in start..len {
            let Some(record) = memory.read(logical) else {
                break;
            };
            // Records from a port that no longer exists cannot be decoded.
            let Some(kind) = self.kind_of(record.port) else {
                continue;
            };
            let reading = Reading::decode(kind, record.data);
            let time = header.start_time
                + record.period_number * u32::from(header.period_length);
            out.data_report(record.port, time, reading)?;
            if logical + 1 == len {
                out.terminate()?;
            }
            out.end_line()?;
        }
        Ok(())
    }
}
