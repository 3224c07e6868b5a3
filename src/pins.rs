//! GPIO / peripheral pin assignments for the ESP32 sensor board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Particulate sensor (PMS5003, UART1, 9600 8N1)
// ---------------------------------------------------------------------------

/// ESP32 RX ← sensor TX.
pub const PMS_RX_GPIO: i32 = 18;
/// ESP32 TX → sensor RX.
pub const PMS_TX_GPIO: i32 = 19;

// ---------------------------------------------------------------------------
// CO2 sensor (SenseAir S8, UART2, 9600 8N1)
// ---------------------------------------------------------------------------

pub const CO2_RX_GPIO: i32 = 26;
pub const CO2_TX_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Temperature / humidity (SHT3x, I2C0)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
pub const I2C_FREQ_HZ: u32 = 100_000;

/// Baud rate shared by both sensor UARTs.
pub const SENSOR_BAUD: u32 = 9_600;
