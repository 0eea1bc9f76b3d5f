mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use ems_proto::{
    AnswerTimeout, Circuit, Config, Dispatcher, Halves, NetworkDiagnostics, Payload, Request,
    TemperatureSlot, Timezone, WorkingMode,
};

type SimDispatcher = Dispatcher<SimLink, SimClock, FakeNetwork>;

fn dispatcher(bus: &Rc<RefCell<SimBus>>) -> SimDispatcher {
    Dispatcher::new(
        sim_orchestrator(bus, Config::default()),
        FakeNetwork::at(1_760_000_000),
    )
}

#[test]
fn rejected_parameter_never_reaches_the_bus() {
    init_logger();
    let bus = SimBus::new();
    bus.borrow_mut().poll(GATEWAY);
    let mut gw = dispatcher(&bus);

    let response = gw.handle(&Request::new(11).circuit(1).mode(1).temp(81));
    assert!(!response.is_success());
    assert_eq!(response.code, 11);
    assert_eq!(response.timestamp, None);

    let response = gw.handle(&Request::new(12).temp(81));
    assert!(!response.is_success());

    let bus = bus.borrow();
    assert!(bus.sent.is_empty());
    // the poll is still queued, nothing was read
    assert_eq!(bus.pending(), 2);
    assert_eq!(bus.now_ms, 0);

    let stats = gw.orchestrator().statistics();
    assert_eq!(stats.rejected_parameters, 2);
    assert_eq!(stats.failed, 2);
}

#[test]
fn unknown_code_and_missing_parameter() {
    let bus = SimBus::new();
    let mut gw = dispatcher(&bus);

    assert!(!gw.handle(&Request::new(7)).is_success());
    assert!(!gw.handle(&Request::new(10).circuit(1)).is_success());
    assert!(bus.borrow().sent.is_empty());
    assert_eq!(gw.orchestrator().statistics().rejected_parameters, 2);
}

#[test]
fn success_carries_timestamp() {
    init_logger();
    let bus = SimBus::new();
    bus.borrow_mut()
        .poll(GATEWAY)
        .reply(BOILER, 0x18, 0, &FAST_PAYLOAD)
        .poll(GATEWAY)
        .reply(BOILER, 0x19, 0, &SLOW_PAYLOAD);
    let mut gw = dispatcher(&bus);

    let response = gw.handle(&Request::new(1));
    assert!(response.is_success());
    assert_eq!(response.code, 1);
    assert_eq!(response.timestamp, Some(1_760_000_000));
    match response.payload {
        Some(Payload::Burner(report)) => {
            assert_eq!(report.fast.selected_flow_temperature, 45);
            assert_eq!(report.slow.burner_hours, 42);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn bus_failure_has_no_timestamp() {
    let bus = SimBus::new();
    bus.borrow_mut().poll(GATEWAY);
    let mut gw = dispatcher(&bus);

    let response = gw.handle(&Request::new(9));
    assert!(!response.is_success());
    assert_eq!(response.code, 9);
    assert_eq!(response.payload, None);
    assert_eq!(response.timestamp, None);
    assert_eq!(gw.orchestrator().statistics().reply_timeouts, 1);
}

#[test]
fn set_circuit_mode() {
    let mut record = [0x00, 0x22, 0x2A, 0x1E, 0x00, 0x00, 0x00, 0x00];
    record[7] = WorkingMode::Auto as u8;
    let bus = SimBus::new();
    bus.borrow_mut()
        .poll(GATEWAY)
        .ack()
        .poll(GATEWAY)
        .reply(THERMOSTAT, 0x3D, 0, &record);
    let mut gw = dispatcher(&bus);

    let response = gw.handle(&Request::new(10).circuit(1).mode(2));
    assert_eq!(
        response.payload,
        Some(Payload::WorkingMode(Circuit::One, WorkingMode::Auto))
    );
}

#[test]
fn set_circuit_temperature_reports_degrees() {
    let record = [0x00, 0x46, 0x2A, 0x1E, 0x00, 0x00, 0x00, 0x02];
    let bus = SimBus::new();
    bus.borrow_mut()
        .poll(GATEWAY)
        .ack()
        .poll(GATEWAY)
        .reply(THERMOSTAT, 0x47, 0, &record);
    let mut gw = dispatcher(&bus);

    let response = gw.handle(&Request::new(11).circuit(2).mode(0).temp(70));
    match response.payload {
        Some(Payload::CircuitTemperature(Circuit::Two, TemperatureSlot::Night, value)) => {
            assert_eq!(value, Halves(70));
            assert_eq!(value.to_f32(), 35.0);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn statistics_and_reset() {
    let bus = SimBus::new();
    let mut gw = dispatcher(&bus);
    gw.handle(&Request::new(12).temp(99));

    let response = gw.handle(&Request::new(22));
    match response.payload {
        Some(Payload::Statistics(stats, None)) => assert_eq!(stats.rejected_parameters, 1),
        other => panic!("unexpected payload {:?}", other),
    }

    let response = gw.handle(&Request::new(23));
    match response.payload {
        Some(Payload::Statistics(_, Some(diag))) => assert_eq!(
            diag,
            NetworkDiagnostics {
                signal_strength: -67,
                reconnects: 2,
                uptime_s: 3600,
            }
        ),
        other => panic!("unexpected payload {:?}", other),
    }

    gw.network_mut().now = 1_760_000_100;
    let response = gw.handle(&Request::new(24));
    assert_eq!(
        response.payload,
        Some(Payload::StatisticsReset(1_760_000_100))
    );
    let stats = gw.orchestrator().statistics();
    assert_eq!(stats.since, Some(1_760_000_100));
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.rejected_parameters, 0);
    assert!(bus.borrow().sent.is_empty());
}

#[test]
fn set_answer_timeout() {
    let bus = SimBus::new();
    let mut gw = dispatcher(&bus);
    gw.orchestrator_mut()
        .set_answer_timeout(AnswerTimeout::new(10).unwrap());
    assert_eq!(gw.orchestrator().config().answer_timeout.as_millis(), 1000);

    let response = gw.handle(&Request::new(25).value(30));
    assert_eq!(
        response.payload,
        Some(Payload::AnswerTimeout(AnswerTimeout::new(30).unwrap()))
    );
    assert_eq!(gw.orchestrator().config().answer_timeout.as_millis(), 3000);

    assert!(!gw.handle(&Request::new(25).value(101)).is_success());
    assert_eq!(gw.orchestrator().config().answer_timeout.as_millis(), 3000);
}

#[test]
fn network_module_commands() {
    let bus = SimBus::new();
    let mut gw = dispatcher(&bus);

    assert_eq!(gw.handle(&Request::new(20)).payload, Some(Payload::Done));
    assert_eq!(
        gw.handle(&Request::new(21).timezone(1)).payload,
        Some(Payload::Done)
    );
    assert_eq!(gw.network_mut().reboots, 1);
    assert_eq!(gw.network_mut().timezone, Some(Timezone::DaylightSaving));

    gw.network_mut().refuse = true;
    let response = gw.handle(&Request::new(20));
    assert!(!response.is_success());
    assert_eq!(response.timestamp, None);
    assert!(!gw.handle(&Request::new(21).timezone(0)).is_success());
    assert!(bus.borrow().sent.is_empty());
}
