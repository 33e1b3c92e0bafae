//! Sensor capabilities, the per-port channel binding and simulation
//! drivers.

use bitflags::bitflags;
use daq_common::config::SensorKind;

bitflags! {
    /// Fault register of a thermocouple amplifier.
    ///
    /// Empty means the last conversion was healthy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ThermoFaults: u8 {
        /// Thermocouple not connected.
        const OPEN_CIRCUIT = 1 << 0;
        /// Thermocouple shorted to ground.
        const SHORT_TO_GND = 1 << 1;
        /// Thermocouple shorted to the supply rail.
        const SHORT_TO_VCC = 1 << 2;
    }
}

/// Temperature-class sensor: a reading plus a fault channel.
pub trait TemperatureSensor {
    /// One temperature conversion [°C].
    fn measure(&mut self) -> f32;

    /// Fault register from the last conversion.
    fn faults(&self) -> ThermoFaults;
}

/// Light-class sensor: a reading, no fault channel.
pub trait LightSensor {
    /// One illuminance conversion [lux].
    fn measure(&mut self) -> f32;
}

/// A decoded sensor reading, tagged by the owning port's sensor class.
///
/// The stored form is always the same 4-byte bit pattern; the tag is what
/// makes it meaningful again on replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Temperature [°C].
    Celsius(f32),
    /// Illuminance [lux].
    Lux(f32),
}

impl Reading {
    /// The numeric value regardless of class.
    pub fn value(self) -> f32 {
        match self {
            Self::Celsius(value) | Self::Lux(value) => value,
        }
    }

    /// The fixed-width bit pattern stored in a data record.
    pub fn encode(self) -> [u8; 4] {
        self.value().to_le_bytes()
    }

    /// Rebuild a reading from stored bits using the owning port's kind.
    pub fn decode(kind: SensorKind, data: [u8; 4]) -> Self {
        let value = f32::from_le_bytes(data);
        match kind {
            SensorKind::Temperature => Self::Celsius(value),
            SensorKind::Light => Self::Lux(value),
        }
    }
}

/// The sensor capability bound to one logical port.
///
/// Flat variants on purpose: exactly two sensor classes exist today, and a
/// new class is an additive variant rather than a new inheritance layer.
pub enum SensorChannel {
    /// Thermocouple amplifier channel.
    Temperature(Box<dyn TemperatureSensor>),
    /// Photodiode channel.
    Light(Box<dyn LightSensor>),
}

impl SensorChannel {
    /// The channel's sensor class (the decode tag for stored readings).
    pub fn kind(&self) -> SensorKind {
        match self {
            Self::Temperature(_) => SensorKind::Temperature,
            Self::Light(_) => SensorKind::Light,
        }
    }

    /// Take one reading, tagged with the channel's class.
    pub fn measure(&mut self) -> Reading {
        match self {
            Self::Temperature(sensor) => Reading::Celsius(sensor.measure()),
            Self::Light(sensor) => Reading::Lux(sensor.measure()),
        }
    }
}

impl core::fmt::Debug for SensorChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Temperature(_) => f.write_str("SensorChannel::Temperature"),
            Self::Light(_) => f.write_str("SensorChannel::Light"),
        }
    }
}

/// Scripted thermocouple for the simulation host and tests.
#[derive(Debug, Clone)]
pub struct SimThermocouple {
    value: f32,
    faults: ThermoFaults,
}

impl SimThermocouple {
    /// Healthy sensor returning a fixed value.
    pub fn new(value: f32) -> Self {
        Self {
            value,
            faults: ThermoFaults::empty(),
        }
    }

    /// Sensor with the given fault bits raised.
    pub fn faulted(faults: ThermoFaults) -> Self {
        Self { value: 0.0, faults }
    }

    /// Change the scripted value.
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }
}

impl TemperatureSensor for SimThermocouple {
    fn measure(&mut self) -> f32 {
        if self.faults.is_empty() { self.value } else { 0.0 }
    }

    fn faults(&self) -> ThermoFaults {
        self.faults
    }
}

/// Scripted photodiode for the simulation host and tests.
#[derive(Debug, Clone)]
pub struct SimPhotodiode {
    lux: f32,
}

impl SimPhotodiode {
    /// Sensor returning a fixed illuminance.
    pub fn new(lux: f32) -> Self {
        Self { lux }
    }
}

impl LightSensor for SimPhotodiode {
    fn measure(&mut self) -> f32 {
        self.lux
    }
}
