//! AirNode Firmware — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter   MqttSession   SystemAdapter   NvsAdapter        │
//! │  (LinkPort)    (SessionPort) (SystemPort)    (ConfigPort)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  NodeService: SensorRegistry · ConnectivityManager     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  PMS5003 (UART1) · SenseAir S8 (UART2) · SHT3x (I2C0)          │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::uart::{config::Config as UartConfig, UartDriver};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use airnode::adapters::device_id;
use airnode::adapters::mqtt::MqttSession;
use airnode::adapters::nvs::NvsAdapter;
use airnode::adapters::system::SystemAdapter;
use airnode::adapters::time::TimeAdapter;
use airnode::adapters::wifi::WifiAdapter;
use airnode::app::ports::ConfigPort;
use airnode::app::service::NodeService;
use airnode::config::{bounded, NodeConfig};
use airnode::connectivity::ConnectivityManager;
use airnode::pins;
use airnode::registry::{DeviceClass, SensorDescriptor, SensorRegistry};
use airnode::sensors::co2::Co2Sensor;
use airnode::sensors::pms::PmsSensor;
use airnode::sensors::sht::{SharedClimate, Sht3x};
use airnode::sensors::signal::{RssiGauge, SignalStrengthSensor};
use airnode::sensors::Sensor;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AirNode v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new()?;
    let mut config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            NodeConfig::default()
        }
    };
    if config.wifi.ssid.is_empty() {
        if let Some(ssid) = option_env!("AIRNODE_WIFI_SSID") {
            info!("Config: using build-time WiFi credentials");
            config.wifi.ssid = bounded(ssid);
            config.wifi.password = bounded(option_env!("AIRNODE_WIFI_PASSWORD").unwrap_or(""));
            if let Err(e) = nvs.save(&config) {
                warn!("Config: could not persist credentials ({})", e);
            }
        }
    }
    config.validate()?;

    let mac = device_id::read_mac();
    let chip_id = device_id::chip_id(&mac);
    info!("Chip id {:x}", chip_id);

    // ── 3. Sensors ────────────────────────────────────────────
    let uart_config = UartConfig::default().baudrate(Hertz(pins::SENSOR_BAUD));
    // SAFETY: each GPIO number in `pins` is claimed by exactly one driver.
    let (pms_tx, pms_rx, co2_tx, co2_rx, sda, scl) = unsafe {
        (
            AnyIOPin::new(pins::PMS_TX_GPIO),
            AnyIOPin::new(pins::PMS_RX_GPIO),
            AnyIOPin::new(pins::CO2_TX_GPIO),
            AnyIOPin::new(pins::CO2_RX_GPIO),
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
        )
    };
    let pms_uart = UartDriver::new(
        peripherals.uart1,
        pms_tx,
        pms_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart_config,
    )?;
    let co2_uart = UartDriver::new(
        peripherals.uart2,
        co2_tx,
        co2_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart_config,
    )?;
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;

    let mut pms = PmsSensor::new(pms_uart, FreeRtos, TimeAdapter::new());
    pms.init();
    let mut co2 = Co2Sensor::new(co2_uart, FreeRtos);
    co2.init(config.co2_warmup_ms);
    let climate = SharedClimate::new(Sht3x::new(i2c, FreeRtos));
    let gauge = RssiGauge::new();

    let sensors: [(SensorDescriptor, Box<dyn Sensor>); 5] = [
        (
            SensorDescriptor::new("WiFi Signal Strength", "wifi", "dBm", DeviceClass::SignalStrength),
            Box::new(SignalStrengthSensor::new(gauge.clone())),
        ),
        (
            SensorDescriptor::new("CO2", "rco2", "ppm", DeviceClass::CarbonDioxide),
            Box::new(co2),
        ),
        (
            SensorDescriptor::new("PM2", "pm02", "µg/m³", DeviceClass::Pm25),
            Box::new(pms),
        ),
        (
            SensorDescriptor::new("Temperature", "atmp", "°C", DeviceClass::Temperature),
            Box::new(climate.temperature_reader()),
        ),
        (
            SensorDescriptor::new("Humidity", "rhum", "%", DeviceClass::Humidity),
            Box::new(climate.humidity_reader()),
        ),
    ];
    let registry = SensorRegistry::new(sensors).map_err(|e| anyhow::anyhow!("{}", e))?;

    // ── 4. Connectivity ───────────────────────────────────────
    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?,
        sysloop,
    )?;
    let mut link = WifiAdapter::new(wifi);
    if let Err(e) = link
        .set_credentials(&config.wifi)
        .and_then(|()| link.connect())
    {
        error!("WiFi: initial connect failed ({}), leaving it to the retry ladder", e);
    }
    let session = MqttSession::new(&config.mqtt);
    let manager = ConnectivityManager::new(link, session, FreeRtos, SystemAdapter, &config, chip_id);

    // ── 5. Main loop ──────────────────────────────────────────
    let mut service = NodeService::new(registry, manager, gauge);
    service.start();

    loop {
        if let Err(e) = service.tick() {
            warn!("Round {} not published: {}", service.rounds() + 1, e);
        }
        FreeRtos::delay_ms(config.poll_interval_ms);
    }
}
