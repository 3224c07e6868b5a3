//! Byte-oriented serial line used by both UART sensors.
//!
//! Concrete implementations:
//! - ESP-IDF `UartDriver` (hardware UART, 9600 8N1, no flow control)
//! - scripted in-memory lines in tests
//!
//! Both sensor protocols are generic over `SerialPort`, so the decoders
//! are exercised on the host without hardware.

/// Byte-oriented serial channel.
pub trait SerialPort {
    /// Error type for this port.
    type Error: core::fmt::Debug;

    /// Number of received bytes waiting in the RX buffer.
    fn available(&self) -> usize;

    /// Take one byte from the RX buffer.
    /// Returns `Ok(None)` if nothing is buffered (non-blocking).
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Write `data` to the line.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;
}

#[cfg(target_os = "espidf")]
impl SerialPort for esp_idf_hal::uart::UartDriver<'_> {
    type Error = esp_idf_sys::EspError;

    fn available(&self) -> usize {
        self.remaining_read().unwrap_or(0)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut buf = [0u8; 1];
        let n = self.read(&mut buf, esp_idf_hal::delay::NON_BLOCK)?;
        Ok((n == 1).then_some(buf[0]))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        esp_idf_hal::uart::UartDriver::write(self, data)
    }
}
