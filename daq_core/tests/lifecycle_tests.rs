//! End-to-end command loop tests: the full path from serial line to wire
//! response over simulated hardware.

use daq_common::config::DaqConfig;
use daq_common::consts::PORT_MAX;
use daq_core::core::DaqCore;
use daq_core::responder::Responder;
use daq_hal::clock::{RealTimeClock, SimClock};
use daq_hal::sensor::{SensorChannel, SimPhotodiode, SimThermocouple};
use daq_hal::store::RamStore;
use daq_hal::timer::{SimTickGate, SimTimer};

type SimCore = DaqCore<RamStore, SimTickGate, SimClock, SimTimer>;

const START: u32 = 1_420_070_400;

/// A unit with two active ports (one thermocouple, one photodiode) over a
/// RAM store.
fn sim_unit() -> (SimCore, SimClock, SimTimer) {
    sim_unit_over(RamStore::new(1048))
}

fn sim_unit_over(store: RamStore) -> (SimCore, SimClock, SimTimer) {
    let config = DaqConfig::default();
    let clock = SimClock::starting_at(START);
    let timer = SimTimer::new();

    let mut channels: heapless::Vec<SensorChannel, PORT_MAX> = heapless::Vec::new();
    channels
        .push(SensorChannel::Temperature(Box::new(SimThermocouple::new(
            21.5,
        ))))
        .ok();
    channels
        .push(SensorChannel::Light(Box::new(SimPhotodiode::new(480.0))))
        .ok();

    let core = DaqCore::new(
        &config,
        store,
        timer.gate(),
        clock.clone(),
        timer.clone(),
        channels,
    );
    (core, clock, timer)
}

fn capture() -> Responder<Vec<u8>> {
    Responder::new(Vec::new(), 2)
}

/// Run one command line through the core and return the response bytes.
fn send(core: &mut SimCore, line: &[u8]) -> Vec<u8> {
    let mut out = capture();
    for &byte in line {
        core.feed(byte, &mut out).unwrap();
    }
    out.get_ref().clone()
}

/// Advance the shared clock and timer together and drain all ticks.
fn run_seconds(core: &mut SimCore, clock: &SimClock, timer: &SimTimer, seconds: u32) {
    for _ in 0..seconds {
        clock.advance(1);
        timer.advance(1);
        while timer.take_tick() {
            core.on_tick().unwrap();
        }
    }
}

#[test]
fn full_experiment_run_and_replay() {
    let (mut core, clock, timer) = sim_unit();
    core.boot();

    assert_eq!(send(&mut core, b"0P5!;"), b"002,0,5\r\n");
    assert_eq!(send(&mut core, b"0M5!;"), b"002,0,25,5\r\n");
    assert!(core.is_running());

    run_seconds(&mut core, &clock, &timer, 25);

    // 5 ticks × 2 active ports, then the automatic transition to Idle.
    assert!(!core.is_running());
    assert_eq!(core.memory().len(), 10);

    let reply = send(&mut core, b"0D5!;");
    let text = String::from_utf8(reply).unwrap();
    let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 10);

    // Oldest first: period k stamps start_time + k*5, both ports per period.
    for (i, line) in lines.iter().enumerate() {
        let period = (i / 2) as u32;
        let port = if i % 2 == 0 { 1 } else { 2 };
        let value = if port == 1 { "+21.50" } else { "+480.00" };
        let terminator = if i == 9 { ":" } else { "" };
        assert_eq!(
            *line,
            format!("002,{port},{},{value}{terminator}", START + period * 5)
        );
    }
}

#[test]
fn bare_query_reports_active_ports() {
    let (mut core, _clock, _timer) = sim_unit();
    core.boot();

    assert_eq!(send(&mut core, b"1!;"), b"002,1\r\n");
    assert_eq!(send(&mut core, b"2!;"), b"002,2\r\n");
    // No such port: abort.
    assert_eq!(send(&mut core, b"3!;"), b"002,0\r\n");
    assert_eq!(send(&mut core, b"0!;"), b"002,0\r\n");
}

#[test]
fn set_period_while_running_aborts_and_preserves_header() {
    let (mut core, _clock, _timer) = sim_unit();
    core.boot();

    send(&mut core, b"0P5!;");
    send(&mut core, b"1M10!;");
    let header_before = core.memory().load_header();

    assert_eq!(send(&mut core, b"0P9!;"), b"002,0\r\n");
    assert_eq!(core.memory().load_header(), header_before);
    assert_eq!(core.experiment().period(), 5);
}

#[test]
fn burst_allowed_next_to_running_experiment_only_for_one_sample() {
    let (mut core, _clock, _timer) = sim_unit();
    core.boot();

    send(&mut core, b"1M10!;");
    let stored_before = core.memory().len();

    let reply = send(&mut core, b"1R1!;");
    assert_eq!(reply, format!("002,1,{START},+21.50:\r\n").into_bytes());
    assert_eq!(core.memory().len(), stored_before);

    assert_eq!(send(&mut core, b"1R3!;"), b"002,0\r\n");
}

#[test]
fn burst_fans_out_and_paces_on_the_period() {
    let (mut core, clock, _timer) = sim_unit();
    core.boot();

    send(&mut core, b"0P2!;");
    let reply = send(&mut core, b"0R2!;");
    let text = String::from_utf8(reply).unwrap();
    // Two rounds over two ports; the second round is timestamped one
    // period later and the final record carries the terminator.
    assert_eq!(
        text,
        format!(
            "002,1,{t0},+21.50\r\n002,2,{t0},+480.00\r\n\
             002,1,{t1},+21.50\r\n002,2,{t1},+480.00:\r\n",
            t0 = START,
            t1 = START + 2
        )
    );
    assert_eq!(clock.now(), START + 2);
}

#[test]
fn break_line_stops_the_experiment() {
    let (mut core, _clock, _timer) = sim_unit();
    core.boot();

    send(&mut core, b"1M10!;");
    assert!(core.is_running());
    assert_eq!(send(&mut core, b"    !;"), b"002,0\r\n");
    assert!(!core.is_running());
    assert!(!core.memory().load_header().is_running);
}

#[test]
fn malformed_and_unknown_commands_abort() {
    let (mut core, _clock, _timer) = sim_unit();
    core.boot();

    assert_eq!(send(&mut core, b"1X!;"), b"002,0\r\n"); // missing digits
    assert_eq!(send(&mut core, b"1Z1!;"), b"002,0\r\n"); // unknown letter
    assert_eq!(send(&mut core, b"1M10;"), b"002,0\r\n"); // missing bang
    assert_eq!(send(&mut core, b"7M2!;"), b"002,0\r\n"); // no such port
    assert_eq!(send(&mut core, b"0D1!;"), b"002,0\r\n"); // empty log
}

#[test]
fn overlong_line_aborts_once_then_recovers() {
    let (mut core, _clock, _timer) = sim_unit();
    core.boot();

    let reply = send(&mut core, b"111111111111111111111M10!;");
    assert_eq!(reply, b"002,0\r\n");
    assert_eq!(send(&mut core, b"1!;"), b"002,1\r\n");
}

#[test]
fn commands_split_across_reads_reassemble() {
    let (mut core, _clock, _timer) = sim_unit();
    core.boot();

    let mut out = capture();
    for &byte in b"1M" {
        core.feed(byte, &mut out).unwrap();
    }
    assert!(out.get_ref().is_empty());
    for &byte in b"10!;" {
        core.feed(byte, &mut out).unwrap();
    }
    assert_eq!(out.get_ref().as_slice(), b"002,1,10,10\r\n");
}

#[test]
fn power_loss_resumes_mid_period() {
    let (mut core, clock, timer) = sim_unit();
    core.boot();

    send(&mut core, b"0P5!;");
    send(&mut core, b"0M100!;");
    run_seconds(&mut core, &clock, &timer, 12);
    assert_eq!(core.experiment().current_period(), 2);
    assert_eq!(core.memory().len(), 4);

    // Power loss: keep the store bytes, rebuild everything else.
    let image = {
        let snapshot = core.memory();
        // 2 periods stored; header says running.
        assert!(snapshot.load_header().is_running);
        snapshot.store().image()
    };

    clock.advance(25); // dark time: periods 2..=7 pass unsampled
    let (mut revived, clock2, timer2) = sim_unit_over(RamStore::from_image(image));
    // Continue on the same timeline.
    clock2.set(clock.now());
    revived.boot();

    assert!(revived.is_running());
    assert_eq!(revived.experiment().current_period(), 7); // 37 / 5
    assert_eq!(timer2.phase(), 2); // 37 % 5

    // Three more seconds completes the interrupted period.
    run_seconds(&mut revived, &clock2, &timer2, 3);
    assert_eq!(revived.experiment().current_period(), 8);
    assert_eq!(revived.memory().len(), 6);
}
