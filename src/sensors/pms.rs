//! Plantower PMS5003-family particulate sensor.
//!
//! Wire format (all multi-byte fields big-endian):
//! ```text
//! ┌──────┬──────┬────────────┬──────────────────────────┬──────────────┐
//! │ 0x42 │ 0x4D │ Length (2B)│ Data (Length - 2 bytes)  │ Checksum (2B)│
//! └──────┴──────┴────────────┴──────────────────────────┴──────────────┘
//! ```
//!
//! Length is 20 (PMS1003/3003, 9 data words) or 28 (PMS5003/7003, 13 data
//! words).  The first six data words are common to every model and are the
//! only ones decoded.  Checksum = sum of every byte from the first sync byte
//! through the last data byte, mod 2^16.
//!
//! The sensor free-runs in active mode and answers a request in passive
//! mode.  There is no flow control, so [`PmsDecoder`] is fed one byte at a
//! time and resynchronises on any framing or checksum error.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::serial::SerialPort;
use super::{Reading, Sensor};
use crate::app::ports::ClockPort;
use crate::error::FrameError;

pub const SYNC_1: u8 = 0x42;
pub const SYNC_2: u8 = 0x4D;

/// Declared length of the 9-word frame.
pub const SHORT_FRAME_LEN: u16 = 2 * 9 + 2;
/// Declared length of the 13-word frame.
pub const LONG_FRAME_LEN: u16 = 2 * 13 + 2;

/// Bytes of the six common measurement words.
const PAYLOAD_LEN: usize = 12;

/// Wait budget for one reply (milliseconds).
pub const SINGLE_RESPONSE_TIME_MS: u32 = 1_000;
/// Wait budget for a reply right after power-up.
pub const TOTAL_RESPONSE_TIME_MS: u32 = 1_000 * 10;
/// Time for readings to settle after [`PmsSensor::wake_up`].
pub const STEADY_RESPONSE_TIME_MS: u32 = 1_000 * 30;

pub const CMD_SLEEP: [u8; 7] = [0x42, 0x4D, 0xE4, 0x00, 0x00, 0x01, 0x73];
pub const CMD_WAKE_UP: [u8; 7] = [0x42, 0x4D, 0xE4, 0x00, 0x01, 0x01, 0x74];
pub const CMD_ACTIVE_MODE: [u8; 7] = [0x42, 0x4D, 0xE1, 0x00, 0x01, 0x01, 0x71];
pub const CMD_PASSIVE_MODE: [u8; 7] = [0x42, 0x4D, 0xE1, 0x00, 0x00, 0x01, 0x70];
pub const CMD_REQUEST_READ: [u8; 7] = [0x42, 0x4D, 0xE2, 0x00, 0x00, 0x01, 0x71];

// ───────────────────────────────────────────────────────────────
// Frame
// ───────────────────────────────────────────────────────────────

/// Mass concentrations (µg/m³) from one validated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PmsFrame {
    // Standard particles, CF=1
    pub pm1_0_standard: u16,
    pub pm2_5_standard: u16,
    pub pm10_standard: u16,
    // Atmospheric environment
    pub pm1_0_ambient: u16,
    pub pm2_5_ambient: u16,
    pub pm10_ambient: u16,
}

impl PmsFrame {
    fn from_payload(p: &[u8; PAYLOAD_LEN]) -> Self {
        let word = |i: usize| u16::from_be_bytes([p[i], p[i + 1]]);
        Self {
            pm1_0_standard: word(0),
            pm2_5_standard: word(2),
            pm10_standard: word(4),
            pm1_0_ambient: word(6),
            pm2_5_ambient: word(8),
            pm10_ambient: word(10),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Decoder
// ───────────────────────────────────────────────────────────────

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    SeekFirstSync,
    SeekSecondSync,
    LengthHigh,
    LengthLow { high: u8 },
    /// `received` data bytes of `data_len` seen so far.
    Payload { data_len: u16, received: u16 },
    ChecksumHigh,
    ChecksumLow { high: u8 },
}

/// Streaming frame decoder, driven one byte at a time.
pub struct PmsDecoder {
    state: DecoderState,
    checksum: u16,
    payload: [u8; PAYLOAD_LEN],
}

impl Default for PmsDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PmsDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::SeekFirstSync,
            checksum: 0,
            payload: [0; PAYLOAD_LEN],
        }
    }

    /// Drop any partial frame and wait for the next sync byte.
    pub fn reset(&mut self) {
        self.state = DecoderState::SeekFirstSync;
    }

    /// Whether the decoder is between frames.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::SeekFirstSync
    }

    /// Advance the state machine by one byte.
    ///
    /// Returns `Ok(Some(frame))` when a frame completes and its checksum
    /// matches, `Ok(None)` while a frame is in progress (or the byte was
    /// noise), and `Err` when a frame is rejected.  The decoder is already
    /// back in sync-seeking state when an error is returned.
    pub fn push(&mut self, byte: u8) -> Result<Option<PmsFrame>, FrameError> {
        match self.state {
            DecoderState::SeekFirstSync => {
                if byte == SYNC_1 {
                    self.checksum = byte as u16;
                    self.state = DecoderState::SeekSecondSync;
                }
            }

            DecoderState::SeekSecondSync => {
                // A mismatching byte is dropped, not re-examined as a first sync.
                if byte == SYNC_2 {
                    self.add(byte);
                    self.state = DecoderState::LengthHigh;
                } else {
                    self.state = DecoderState::SeekFirstSync;
                }
            }

            DecoderState::LengthHigh => {
                self.add(byte);
                self.state = DecoderState::LengthLow { high: byte };
            }

            DecoderState::LengthLow { high } => {
                let len = u16::from_be_bytes([high, byte]);
                if len != SHORT_FRAME_LEN && len != LONG_FRAME_LEN {
                    self.state = DecoderState::SeekFirstSync;
                    return Err(FrameError::UnsupportedLength(len));
                }
                self.add(byte);
                self.state = DecoderState::Payload {
                    data_len: len - 2,
                    received: 0,
                };
            }

            DecoderState::Payload { data_len, received } => {
                self.add(byte);
                if let Some(slot) = self.payload.get_mut(received as usize) {
                    *slot = byte;
                }
                let received = received + 1;
                self.state = if received == data_len {
                    DecoderState::ChecksumHigh
                } else {
                    DecoderState::Payload { data_len, received }
                };
            }

            DecoderState::ChecksumHigh => {
                self.state = DecoderState::ChecksumLow { high: byte };
            }

            DecoderState::ChecksumLow { high } => {
                self.state = DecoderState::SeekFirstSync;
                let expected = u16::from_be_bytes([high, byte]);
                if expected != self.checksum {
                    return Err(FrameError::Checksum {
                        expected,
                        calculated: self.checksum,
                    });
                }
                return Ok(Some(PmsFrame::from_payload(&self.payload)));
            }
        }
        Ok(None)
    }

    /// [`push`](Self::push), logging and swallowing rejected frames.
    pub fn consume(&mut self, byte: u8) -> Option<PmsFrame> {
        match self.push(byte) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("PMS: frame discarded, {}", e);
                None
            }
        }
    }

    fn add(&mut self, byte: u8) {
        self.checksum = self.checksum.wrapping_add(byte as u16);
    }
}

/// Serialise a frame the way the sensor sends it.  `long` selects the
/// 13-word variant; the extra words are zero.
pub fn encode_frame(frame: &PmsFrame, long: bool) -> heapless::Vec<u8, 32> {
    let len = if long { LONG_FRAME_LEN } else { SHORT_FRAME_LEN };
    let mut out = heapless::Vec::new();
    let _ = out.extend_from_slice(&[SYNC_1, SYNC_2]);
    let _ = out.extend_from_slice(&len.to_be_bytes());
    for word in [
        frame.pm1_0_standard,
        frame.pm2_5_standard,
        frame.pm10_standard,
        frame.pm1_0_ambient,
        frame.pm2_5_ambient,
        frame.pm10_ambient,
    ] {
        let _ = out.extend_from_slice(&word.to_be_bytes());
    }
    while out.len() < 4 + (len as usize - 2) {
        let _ = out.push(0);
    }
    let sum = out.iter().fold(0u16, |acc, b| acc.wrapping_add(*b as u16));
    let _ = out.extend_from_slice(&sum.to_be_bytes());
    out
}

// ───────────────────────────────────────────────────────────────
// Sensor
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmsMode {
    /// Sensor pushes a frame roughly every second.
    Active,
    /// Sensor answers only after [`CMD_REQUEST_READ`].
    Passive,
}

pub struct PmsSensor<S, D, C> {
    serial: S,
    delay: D,
    clock: C,
    decoder: PmsDecoder,
    mode: PmsMode,
}

impl<S: SerialPort, D: DelayNs, C: ClockPort> PmsSensor<S, D, C> {
    /// Wrap a 9600-baud line.  The sensor powers up in active mode.
    pub fn new(serial: S, delay: D, clock: C) -> Self {
        Self {
            serial,
            delay,
            clock,
            decoder: PmsDecoder::new(),
            mode: PmsMode::Active,
        }
    }

    /// Request one frame and report whether the sensor answered.
    pub fn init(&mut self) -> bool {
        info!("PMS: initialising");
        self.request_read();
        if self.read_until(SINGLE_RESPONSE_TIME_MS).is_some() {
            info!("PMS: initialised");
            true
        } else {
            warn!("PMS: no valid frame during init (mode {:?})", self.mode);
            false
        }
    }

    pub fn mode(&self) -> PmsMode {
        self.mode
    }

    /// Standby: fan and laser off.
    pub fn sleep(&mut self) {
        self.send(&CMD_SLEEP);
    }

    /// Leave standby.  Readings need [`STEADY_RESPONSE_TIME_MS`] to settle.
    pub fn wake_up(&mut self) {
        self.send(&CMD_WAKE_UP);
    }

    pub fn active_mode(&mut self) {
        self.send(&CMD_ACTIVE_MODE);
        self.mode = PmsMode::Active;
    }

    pub fn passive_mode(&mut self) {
        self.send(&CMD_PASSIVE_MODE);
        self.mode = PmsMode::Passive;
    }

    /// Ask for one frame.  No-op in active mode.
    pub fn request_read(&mut self) {
        if self.mode == PmsMode::Passive {
            self.send(&CMD_REQUEST_READ);
        }
    }

    /// Feed only the bytes already buffered; never waits.
    pub fn poll_frame(&mut self) -> Option<PmsFrame> {
        while let Some(byte) = self.next_byte() {
            if let Some(frame) = self.decoder.consume(byte) {
                return Some(frame);
            }
        }
        None
    }

    /// Drain the line through the decoder until a frame is emitted or
    /// `timeout_ms` of clock time has passed.
    ///
    /// Received bytes are also capped at one per millisecond of budget (one
    /// byte takes ~1.04 ms on the wire at 9600 baud), so a line full of
    /// garbage cannot hold the caller past the timeout.
    pub fn read_until(&mut self, timeout_ms: u32) -> Option<PmsFrame> {
        let start = self.clock.uptime_ms();
        let mut received = 0u32;
        while received < timeout_ms
            && self.clock.uptime_ms().saturating_sub(start) < u64::from(timeout_ms)
        {
            match self.next_byte() {
                Some(byte) => {
                    received += 1;
                    if let Some(frame) = self.decoder.consume(byte) {
                        return Some(frame);
                    }
                }
                None => self.delay.delay_ms(1),
            }
        }
        warn!("PMS: no valid frame within {} ms", timeout_ms);
        None
    }

    /// Ambient PM2.5 (µg/m³) from a fresh frame, `None` on timeout.
    pub fn read_pm2_5(&mut self) -> Option<u16> {
        self.request_read();
        self.read_until(SINGLE_RESPONSE_TIME_MS)
            .map(|frame| frame.pm2_5_ambient)
    }

    fn next_byte(&mut self) -> Option<u8> {
        match self.serial.read_byte() {
            Ok(byte) => byte,
            Err(e) => {
                warn!("PMS: serial read error {:?}", e);
                None
            }
        }
    }

    fn send(&mut self, command: &[u8; 7]) {
        if let Err(e) = self.serial.write(command) {
            warn!("PMS: command {:02X} not sent ({:?})", command[2], e);
        }
    }
}

impl<S: SerialPort, D: DelayNs, C: ClockPort> Sensor for PmsSensor<S, D, C> {
    fn read(&mut self) -> Reading {
        self.read_pm2_5().into()
    }
}
