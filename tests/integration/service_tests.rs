//! Integration tests for the full poll round: registry → telemetry →
//! connectivity manager → session, plus discovery at start-up.

use airnode::app::service::NodeService;
use airnode::config::NodeConfig;
use airnode::connectivity::ConnectivityManager;
use airnode::registry::{DeviceClass, SensorDescriptor, SensorRegistry};
use airnode::sensors::signal::{RssiGauge, SignalStrengthSensor};
use airnode::sensors::{Reading, Sensor};

use super::mock_hw::{FixedSensor, MockDelay, MockLink, MockSession, MockSystem};

type Service = NodeService<MockLink, MockSession, MockDelay, MockSystem>;

fn service(entries: Vec<(SensorDescriptor, Box<dyn Sensor>)>, gauge: RssiGauge) -> Service {
    let link = MockLink::up();
    let session = MockSession::for_link(&link, true);
    let manager = ConnectivityManager::new(
        link,
        session,
        MockDelay::default(),
        MockSystem,
        &NodeConfig::default(),
        0x00ab_12cd,
    );
    let registry = SensorRegistry::new(entries).unwrap();
    NodeService::new(registry, manager, gauge)
}

fn fixed(name: &'static str, key: &'static str, value: Reading) -> (SensorDescriptor, Box<dyn Sensor>) {
    let (sensor, _) = FixedSensor::new(value);
    (
        SensorDescriptor::new(name, key, "u", DeviceClass::Pm25),
        Box::new(sensor),
    )
}

#[test]
fn failed_middle_sensor_still_yields_three_keys() {
    let mut svc = service(
        vec![
            fixed("PM2", "pm02", Reading::Integer(12)),
            fixed("CO2", "rco2", Reading::Unavailable),
            fixed("Temperature", "atmp", Reading::decimal(21.5)),
        ],
        RssiGauge::new(),
    );
    let payload = svc.tick().unwrap();
    assert_eq!(payload.len(), 3);
    assert_eq!(payload.get("rco2"), Some(Reading::Unavailable));

    let sent = svc.manager().session().state_publishes();
    assert_eq!(sent.len(), 1);
    let json: serde_json::Value = serde_json::from_str(&sent[0].payload).unwrap();
    assert_eq!(json["pm02"], 12);
    assert_eq!(json["rco2"], "NULL");
    assert_eq!(json["atmp"], 21.5);
}

#[test]
fn start_announces_every_sensor_in_order() {
    let mut svc = service(
        vec![
            fixed("CO2", "rco2", Reading::Integer(400)),
            fixed("PM2", "pm02", Reading::Integer(3)),
        ],
        RssiGauge::new(),
    );
    svc.start();

    let session = svc.manager().session();
    let topics: Vec<_> = session.discovery_publishes().iter().map(|p| p.topic.clone()).collect();
    assert_eq!(
        topics,
        [
            "homeassistant/sensor/air_gradient_ab12cd_rco2/config",
            "homeassistant/sensor/air_gradient_ab12cd_pm02/config",
        ]
    );
    assert_eq!(
        session.subscribed,
        [
            "homeassistant/sensor/air_gradient_ab12cd/command",
            "homeassistant/status",
        ]
    );

    let msg: serde_json::Value =
        serde_json::from_str(&session.discovery_publishes()[0].payload).unwrap();
    assert_eq!(msg["val_tpl"], "{{ value_json.rco2 }}");
    assert_eq!(msg["uniq_id"], "sensor.air_gradient_ab12cd_rco2");
    assert_eq!(msg["name"], "air_gradient CO2");
    assert_eq!(msg["stat_t"], "homeassistant/sensor/air_gradient_ab12cd/state");
}

#[test]
fn discovery_grows_buffer_instead_of_dropping() {
    let mut svc = service(
        vec![fixed("CO2", "rco2", Reading::Integer(400))],
        RssiGauge::new(),
    );
    svc.start();

    let session = svc.manager().session();
    let announced = session.discovery_publishes();
    assert_eq!(announced.len(), 1);
    let needed = announced[0].topic.len() + announced[0].payload.len() + 10;
    assert!(needed > 128);
    assert_eq!(session.buffer_history, [needed]);
}

#[test]
fn signal_sensor_follows_link_rssi() {
    let gauge = RssiGauge::new();
    let signal: Box<dyn Sensor> = Box::new(SignalStrengthSensor::new(gauge.clone()));
    let mut svc = service(
        vec![(
            SensorDescriptor::new("WiFi Signal Strength", "wifi", "dBm", DeviceClass::SignalStrength),
            signal,
        )],
        gauge,
    );
    let payload = svc.tick().unwrap();
    assert_eq!(payload.get("wifi"), Some(Reading::Integer(-58)));
}

#[test]
fn every_sensor_read_once_per_round() {
    let (a, a_reads) = FixedSensor::new(Reading::Integer(1));
    let (b, b_reads) = FixedSensor::new(Reading::Integer(2));
    let (a, b): (Box<dyn Sensor>, Box<dyn Sensor>) = (Box::new(a), Box::new(b));
    let mut svc = service(
        vec![
            (SensorDescriptor::new("A", "a", "u", DeviceClass::Pm1), a),
            (SensorDescriptor::new("B", "b", "u", DeviceClass::Pm10), b),
        ],
        RssiGauge::new(),
    );
    svc.tick().unwrap();
    svc.tick().unwrap();
    assert_eq!((a_reads.get(), b_reads.get()), (2, 2));
    assert_eq!(svc.rounds(), 2);
    assert_eq!(svc.manager().session().state_publishes().len(), 2);
}

#[test]
fn link_drop_between_rounds_is_recovered_before_publishing() {
    let mut svc = service(vec![fixed("PM2", "pm02", Reading::Integer(5))], RssiGauge::new());
    svc.tick().unwrap();

    let link = svc.manager_mut().link_mut();
    link.up.set(false);
    link.heal_on_attempt = Some(1);
    svc.tick().unwrap();

    let session = svc.manager().session();
    assert_eq!(session.state_publishes().len(), 2);
    assert!(session.published.iter().all(|p| p.link_up && p.connected));
}
