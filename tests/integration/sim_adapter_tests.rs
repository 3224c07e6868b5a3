//! End-to-end rounds over the simulated WiFi, MQTT and NVS adapters.
//!
//! Same wiring as the firmware entry point, with the radio and broker
//! replaced by their host simulations.

use std::panic::{catch_unwind, AssertUnwindSafe};

use airnode::adapters::device_id::{chip_id, read_mac};
use airnode::adapters::mqtt::MqttSession;
use airnode::adapters::nvs::NvsAdapter;
use airnode::adapters::wifi::WifiAdapter;
use airnode::app::ports::ConfigPort;
use airnode::app::service::NodeService;
use airnode::config::{bounded, NodeConfig};
use airnode::connectivity::ConnectivityManager;
use airnode::registry::{DeviceClass, SensorDescriptor, SensorRegistry};
use airnode::sensors::signal::{RssiGauge, SignalStrengthSensor};
use airnode::sensors::{Reading, Sensor};

use super::mock_hw::{FixedSensor, MockDelay, MockSystem, RESTART_PANIC};

type SimService = NodeService<WifiAdapter, MqttSession, MockDelay, MockSystem>;

fn provisioned() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.wifi.ssid = bounded("HomeWiFi");
    config.wifi.password = bounded("hunter22");
    config
}

fn boot(config: &NodeConfig) -> (SimService, MockDelay) {
    let mut wifi = WifiAdapter::new();
    wifi.set_credentials(&config.wifi).unwrap();
    wifi.connect().unwrap();

    let gauge = RssiGauge::new();
    let (co2, _) = FixedSensor::new(Reading::Integer(415));
    let entries: Vec<(SensorDescriptor, Box<dyn Sensor>)> = vec![
        (
            SensorDescriptor::new("WiFi Signal Strength", "wifi", "dBm", DeviceClass::SignalStrength),
            Box::new(SignalStrengthSensor::new(gauge.clone())) as Box<dyn Sensor>,
        ),
        (
            SensorDescriptor::new("CO2", "rco2", "ppm", DeviceClass::CarbonDioxide),
            Box::new(co2) as Box<dyn Sensor>,
        ),
    ];

    let delay = MockDelay::default();
    let manager = ConnectivityManager::new(
        wifi,
        MqttSession::new(&config.mqtt),
        delay.clone(),
        MockSystem,
        config,
        chip_id(&read_mac()),
    );
    let registry = SensorRegistry::new(entries).unwrap();
    (NodeService::new(registry, manager, gauge), delay)
}

#[test]
fn config_survives_store_and_boots_a_node() {
    let nvs = NvsAdapter::new().unwrap();
    nvs.save(&provisioned()).unwrap();
    let config = nvs.load().unwrap();
    assert_eq!(config.wifi.ssid.as_str(), "HomeWiFi");

    let (mut svc, delay) = boot(&config);
    svc.start();
    // Broker was down at boot: one backoff before the first MQTT connect.
    assert_eq!(delay.total_ms.get(), 5_000);

    let payload = svc.tick().unwrap();
    assert_eq!(payload.get("wifi"), Some(Reading::Integer(-60)));
    assert_eq!(payload.get("rco2"), Some(Reading::Integer(415)));

    let broker = svc.manager_mut().session_mut().sim();
    let (topic, body) = broker.published.last().unwrap();
    assert_eq!(topic, "homeassistant/sensor/air_gradient_fecaef/state");
    assert_eq!(body.as_slice(), br#"{"wifi":-60,"rco2":415}"#);
}

#[test]
fn announce_goes_through_the_sim_broker() {
    let (mut svc, _) = boot(&provisioned());
    svc.start();

    let broker = svc.manager_mut().session_mut().sim();
    let configs = broker
        .published
        .iter()
        .filter(|(t, _)| t.ends_with("/config"))
        .count();
    assert_eq!(configs, 2);
    assert!(broker.subscriptions.iter().any(|t| t == "homeassistant/status"));
}

#[test]
fn flapping_radio_is_recovered() {
    let (mut svc, _) = boot(&provisioned());
    svc.start();

    let station = svc.manager_mut().link_mut().sim();
    station.associated = false;
    station.fail_next = 1;
    svc.tick().unwrap();

    assert_eq!(svc.manager_mut().link_mut().sim().attempts, 3);
    assert_eq!(svc.rounds(), 1);
}

#[test]
fn broker_that_never_answers_restarts_the_node() {
    let (mut svc, delay) = boot(&provisioned());
    svc.manager_mut().session_mut().sim().refuse_next = u32::MAX;

    let result = catch_unwind(AssertUnwindSafe(|| svc.start()));
    let panic = result.expect_err("node should restart");
    assert_eq!(panic.downcast_ref::<String>().map(String::as_str), Some(RESTART_PANIC));
    assert_eq!(svc.manager_mut().session_mut().sim().connects, 3);
    assert_eq!(delay.total_ms.get(), 3 * 5_000 + 5_000);
}

#[test]
fn home_assistant_restart_triggers_a_reboot() {
    let (mut svc, _) = boot(&provisioned());
    svc.start();
    svc.manager_mut()
        .session_mut()
        .sim()
        .deliver("homeassistant/status", b"online");

    let result = catch_unwind(AssertUnwindSafe(|| svc.tick()));
    assert!(result.is_err());
}
