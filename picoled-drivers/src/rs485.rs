//! RS485 simplex serial driver
//!
//! Sends variable-length frames over a half-duplex transceiver. The
//! optional direction pin is raised before the first byte and dropped
//! after the shift register drains, each edge padded by a settle delay.
//!
//! Frames go out through the transfer engine when one was claimed at
//! initialize time, otherwise through the byte pump in `service()`.
//! Every rejected send is rejected before the direction pin moves.

use core::fmt::Write as _;

use heapless::{String, Vec};

use picoled_core::config::{
    Rs485Config, END_WAIT_TIMEOUT_MS, FORMAT_BUFFER_SIZE, MAX_FRAMING_LEN, RS485_MAX_FRAME_SIZE,
    RS485_TX_TIMEOUT_MS,
};
use picoled_core::timing;
use picoled_core::{Error, FrameFormat, Result};
use picoled_hal::{Clock, OutputPin, PeripheralClaims, SerialPort, TransferEngine};

use crate::deadline::Deadline;

/// Driver state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rs485State {
    #[default]
    Idle,
    Transmitting,
    /// Serial port setup failed; retry `initialize()`
    Error,
}

/// Transmission counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rs485Stats {
    pub frames_sent: u32,
    pub bytes_sent: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// CPU feeds the FIFO from `service()`
    Pumping,
    /// Transfer engine feeds the FIFO
    Streaming,
    /// Waiting for the last stop bit
    Draining,
    /// Post-transmission settle before releasing the line
    Settling { since: u64 },
    Error,
}

/// RS485 transmitter with direction control
pub struct Rs485Serial<P, E, D, C> {
    port: P,
    direction: Option<E>,
    dma: Option<D>,
    clock: C,
    config: Rs485Config,
    format: FrameFormat,
    buffer: Vec<u8, RS485_MAX_FRAME_SIZE>,
    /// Next buffer byte to queue
    cursor: usize,
    initialized: bool,
    dma_claimed: bool,
    /// Current frame raised the direction pin
    driving: bool,
    phase: Phase,
    started: u64,
    last_transmission_us: u32,
    stats: Rs485Stats,
}

impl<P, E, D, C> Rs485Serial<P, E, D, C>
where
    P: SerialPort,
    E: OutputPin,
    D: TransferEngine<u8>,
    C: Clock,
{
    pub fn new(port: P, direction: Option<E>, dma: Option<D>, clock: C, config: Rs485Config) -> Self {
        Self {
            port,
            direction,
            dma,
            clock,
            config,
            format: FrameFormat::new(),
            buffer: Vec::new(),
            cursor: 0,
            initialized: false,
            dma_claimed: false,
            driving: false,
            phase: Phase::Idle,
            started: 0,
            last_transmission_us: 0,
            stats: Rs485Stats::default(),
        }
    }

    /// Claim and configure the port, park the direction pin low
    pub fn initialize(&mut self, claims: &mut PeripheralClaims) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.config.validate()?;

        let id = self.port.id();
        if claims.claim(id).is_err() {
            warn!("RS485: serial port already claimed");
            return Err(Error::PeripheralClaimed);
        }

        let actual = match self.port.configure(&self.config.serial) {
            Ok(actual) => actual,
            Err(_) => {
                warn!("RS485: serial port configuration failed");
                claims.release(id);
                self.phase = Phase::Error;
                return Err(Error::PortInitFailed);
            }
        };
        self.config.serial.baudrate = actual;
        self.port.set_tx_interrupt(false);

        if let Some(pin) = self.direction.as_mut() {
            pin.set_low();
        }

        self.dma_claimed = match (self.config.use_dma, self.dma.as_mut()) {
            (true, Some(dma)) => dma.claim(),
            _ => false,
        };

        self.buffer.clear();
        self.phase = Phase::Idle;
        self.initialized = true;
        debug!(
            "RS485: initialized at {} baud, transfer engine {}",
            actual,
            self.dma_claimed
        );
        Ok(())
    }

    /// Finish or abort the current frame and release the hardware
    pub fn end(&mut self, claims: &mut PeripheralClaims) {
        if !self.initialized {
            return;
        }
        if self.is_busy() && !self.wait_for_completion(END_WAIT_TIMEOUT_MS) {
            self.abort_transmission();
        }

        if let Some(dma) = self.dma.as_mut() {
            if self.dma_claimed {
                dma.release();
            }
        }
        self.dma_claimed = false;

        if let Some(pin) = self.direction.as_mut() {
            pin.set_low();
        }
        self.port.set_tx_interrupt(false);
        self.port.deinit();
        claims.release(self.port.id());
        self.buffer.clear();
        self.initialized = false;
        self.phase = Phase::Idle;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &Rs485Config {
        &self.config
    }

    pub fn frame_format(&self) -> &FrameFormat {
        &self.format
    }

    /// Transfer engine is in use for frames
    pub fn dma_enabled(&self) -> bool {
        self.dma_claimed
    }

    pub fn state(&self) -> Rs485State {
        match self.phase {
            Phase::Idle => Rs485State::Idle,
            Phase::Error => Rs485State::Error,
            _ => Rs485State::Transmitting,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state() == Rs485State::Transmitting
    }

    pub fn stats(&self) -> Rs485Stats {
        self.stats
    }

    pub fn frames_sent(&self) -> u32 {
        self.stats.frames_sent
    }

    pub fn bytes_sent(&self) -> u32 {
        self.stats.bytes_sent
    }

    pub fn error_count(&self) -> u32 {
        self.stats.errors
    }

    pub fn reset_statistics(&mut self) {
        self.stats = Rs485Stats::default();
    }

    /// Direction assert to de-assert of the last completed frame
    pub fn last_transmission_time_us(&self) -> u32 {
        self.last_transmission_us
    }

    /// Wire time of `len` characters at the current framing
    pub fn transmission_time_us(&self, len: usize) -> u32 {
        timing::transmission_time_us(&self.config.serial, len)
    }

    /// Wrap every future payload in `preamble` and `postamble`
    ///
    /// Each sequence is cut to 16 bytes.
    pub fn set_frame_format(&mut self, preamble: &[u8], postamble: &[u8]) {
        let preamble = &preamble[..preamble.len().min(MAX_FRAMING_LEN)];
        let postamble = &postamble[..postamble.len().min(MAX_FRAMING_LEN)];
        if let Ok(format) = FrameFormat::with(preamble, postamble) {
            self.format = format;
        }
    }

    pub fn clear_frame_format(&mut self) {
        self.format = FrameFormat::new();
    }

    pub fn set_direction_timing(&mut self, pre_delay_us: u32, post_delay_us: u32) {
        self.config.pre_delay_us = pre_delay_us;
        self.config.post_delay_us = post_delay_us;
    }

    /// When off, frames leave the direction pin to the caller
    pub fn set_auto_direction_control(&mut self, enable: bool) {
        self.config.auto_direction = enable;
    }

    /// Drive the direction pin by hand
    pub fn set_transmit_mode(&mut self, transmit: bool) {
        if let Some(pin) = self.direction.as_mut() {
            pin.set_state(transmit.into());
        }
    }

    /// Change the line rate between frames
    pub fn set_baud_rate(&mut self, baudrate: u32) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.is_busy() {
            return Err(Error::TransmissionInProgress);
        }
        if baudrate == 0 {
            return Err(Error::InvalidParameters);
        }
        let actual = self
            .port
            .set_baudrate(baudrate)
            .map_err(|_| Error::PortInitFailed)?;
        self.config.serial.baudrate = actual;
        Ok(())
    }

    /// Transmit buffer capacity; fixed once initialized
    pub fn set_buffer_size(&mut self, size: usize) -> Result<()> {
        if self.initialized {
            return Err(Error::Config);
        }
        if size == 0 || size > RS485_MAX_FRAME_SIZE {
            return Err(Error::InvalidParameters);
        }
        self.config.buffer_size = size;
        Ok(())
    }

    /// Validate and assemble a frame; nothing on the line moves yet
    fn prepare(&mut self, data: &[u8]) -> Result<usize> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.is_busy() {
            return Err(Error::TransmissionInProgress);
        }
        if data.is_empty() {
            return Err(Error::InvalidParameters);
        }
        self.format
            .assemble(data, &mut self.buffer, self.config.buffer_size)
    }

    /// Raise direction and wait out the pre-transmission settle time
    fn open_line(&mut self) {
        self.cursor = 0;
        self.started = self.clock.now_micros();
        self.driving = self.config.auto_direction && self.direction.is_some();
        if self.driving {
            if let Some(pin) = self.direction.as_mut() {
                pin.set_high();
            }
            if self.config.pre_delay_us > 0 {
                self.clock.delay_us(self.config.pre_delay_us);
            }
        }
    }

    fn blocking_timeout_ms(&self, len: usize, extra_us: u32) -> u32 {
        let frame_us = self
            .transmission_time_us(len)
            .saturating_add(self.config.pre_delay_us)
            .saturating_add(self.config.post_delay_us)
            .saturating_add(extra_us);
        RS485_TX_TIMEOUT_MS.max(frame_us.saturating_mul(2).div_ceil(1000))
    }

    /// Send `data` wrapped in the configured framing
    ///
    /// With `blocking` the call waits for the line to be released; on
    /// timeout the frame is aborted and `Timeout` returned.
    pub fn send_frame(&mut self, data: &[u8], blocking: bool) -> Result<()> {
        let len = self.prepare(data)?;
        self.open_line();

        if self.dma_claimed {
            if let Some(dma) = self.dma.as_mut() {
                dma.start(&self.buffer);
            }
            self.phase = Phase::Streaming;
        } else {
            self.port.set_tx_interrupt(true);
            self.phase = Phase::Pumping;
            self.pump();
        }

        if blocking && !self.wait_for_completion(self.blocking_timeout_ms(len, 0)) {
            self.abort_transmission();
            return Err(Error::Timeout);
        }
        Ok(())
    }

    pub fn send_str(&mut self, text: &str, blocking: bool) -> Result<()> {
        self.send_frame(text.as_bytes(), blocking)
    }

    /// Format into a 512-byte scratch string and send it without blocking
    pub fn send_fmt(&mut self, args: core::fmt::Arguments<'_>) -> Result<()> {
        let mut text: String<FORMAT_BUFFER_SIZE> = String::new();
        text.write_fmt(args).map_err(|_| Error::BufferOverflow)?;
        self.send_frame(text.as_bytes(), false)
    }

    /// Send a frame byte by byte with a pause between bytes; always blocks
    pub fn send_frame_with_timing(&mut self, data: &[u8], inter_byte_delay_us: u32) -> Result<()> {
        let len = self.prepare(data)?;
        let gaps = inter_byte_delay_us.saturating_mul(len as u32 - 1);
        let timeout_ms = self.blocking_timeout_ms(len, gaps);
        self.open_line();
        self.phase = Phase::Pumping;

        let deadline = Deadline::after_ms(&self.clock, timeout_ms);
        for i in 0..len {
            while !self.port.is_writable() {
                if deadline.expired(&self.clock) {
                    self.abort_transmission();
                    return Err(Error::Timeout);
                }
            }
            self.port.write_byte(self.buffer[i]);
            self.cursor += 1;
            if inter_byte_delay_us > 0 && i + 1 < len {
                self.clock.delay_us(inter_byte_delay_us);
            }
        }
        self.phase = Phase::Draining;

        if !self.wait_for_completion(timeout_ms) {
            self.abort_transmission();
            return Err(Error::Timeout);
        }
        Ok(())
    }

    /// Send the same frame `repeat_count` times, each one blocking
    ///
    /// The inter-frame delay runs between repeats, not after the last.
    pub fn send_repeated_frame(
        &mut self,
        data: &[u8],
        repeat_count: u16,
        inter_frame_delay_ms: u32,
    ) -> Result<()> {
        if repeat_count == 0 {
            return Err(Error::InvalidParameters);
        }
        for i in 0..repeat_count {
            self.send_frame(data, true)?;
            if inter_frame_delay_ms > 0 && i + 1 < repeat_count {
                self.clock.delay_ms(inter_frame_delay_ms);
            }
        }
        Ok(())
    }

    /// Queue bytes while the port accepts them
    fn pump(&mut self) {
        while self.cursor < self.buffer.len() && self.port.is_writable() {
            self.port.write_byte(self.buffer[self.cursor]);
            self.cursor += 1;
        }
        if self.cursor == self.buffer.len() {
            self.port.set_tx_interrupt(false);
            self.phase = Phase::Draining;
        }
    }

    /// Advance the current frame by at most one phase
    pub fn service(&mut self) {
        match self.phase {
            Phase::Idle | Phase::Error => {}
            Phase::Pumping => self.pump(),
            Phase::Streaming => {
                let (done, active) = match self.dma.as_mut() {
                    Some(dma) => (dma.take_complete(), dma.is_active()),
                    None => (false, false),
                };
                if done {
                    self.cursor = self.buffer.len();
                    self.phase = Phase::Draining;
                } else if !active {
                    warn!("RS485: transfer engine dropped the frame");
                    self.port.set_tx_interrupt(false);
                    self.release_line();
                    self.stats.errors = self.stats.errors.wrapping_add(1);
                    self.phase = Phase::Idle;
                }
            }
            Phase::Draining => {
                if self.port.is_idle() {
                    if self.driving && self.config.post_delay_us > 0 {
                        self.phase = Phase::Settling {
                            since: self.clock.now_micros(),
                        };
                    } else {
                        self.finish_frame();
                    }
                }
            }
            Phase::Settling { since } => {
                if self.clock.elapsed_micros(since) >= self.config.post_delay_us as u64 {
                    self.finish_frame();
                }
            }
        }
    }

    fn release_line(&mut self) {
        if self.driving {
            if let Some(pin) = self.direction.as_mut() {
                pin.set_low();
            }
            self.driving = false;
        }
    }

    fn finish_frame(&mut self) {
        self.release_line();
        let elapsed = self.clock.elapsed_micros(self.started);
        self.last_transmission_us = elapsed.min(u32::MAX as u64) as u32;
        self.stats.frames_sent = self.stats.frames_sent.wrapping_add(1);
        self.stats.bytes_sent = self.stats.bytes_sent.wrapping_add(self.buffer.len() as u32);
        self.phase = Phase::Idle;
    }

    /// Poll until the line is released; false on timeout
    ///
    /// A timeout of 0 waits forever.
    pub fn wait_for_completion(&mut self, timeout_ms: u32) -> bool {
        let deadline = Deadline::after_ms(&self.clock, timeout_ms);
        loop {
            self.service();
            if !self.is_busy() {
                return true;
            }
            if deadline.expired(&self.clock) {
                return false;
            }
        }
    }

    /// Force-stop the current frame; counts as an error
    pub fn abort_transmission(&mut self) {
        if !self.is_busy() {
            return;
        }
        warn!("RS485: transmission aborted after {} bytes", self.cursor);
        if self.phase == Phase::Streaming {
            if let Some(dma) = self.dma.as_mut() {
                dma.abort();
            }
        }
        self.port.set_tx_interrupt(false);
        self.release_line();
        self.stats.errors = self.stats.errors.wrapping_add(1);
        self.phase = Phase::Idle;
    }
}

impl<P, E, D, C> embedded_io::ErrorType for Rs485Serial<P, E, D, C> {
    type Error = Error;
}

impl<P, E, D, C> embedded_io::Write for Rs485Serial<P, E, D, C>
where
    P: SerialPort,
    E: OutputPin,
    D: TransferEngine<u8>,
    C: Clock,
{
    /// Send as much of `buf` as fits one frame, blocking
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let room = self.config.buffer_size.saturating_sub(self.format.overhead());
        if room == 0 {
            return Err(Error::BufferOverflow);
        }
        let len = buf.len().min(room);
        self.send_frame(&buf[..len], true)?;
        Ok(len)
    }

    fn flush(&mut self) -> Result<()> {
        if self.wait_for_completion(RS485_TX_TIMEOUT_MS) {
            Ok(())
        } else {
            Err(Error::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, Log, MockClock, MockDma, MockPin, MockSerial};
    use picoled_hal::uart::{DataBits, Parity, StopBits, UartConfig};
    use picoled_hal::PeripheralId;
    use proptest::prelude::*;
    use std::vec::Vec as StdVec;

    type Driver = Rs485Serial<MockSerial, MockPin, MockDma<u8>, MockClock>;

    struct Rig {
        rs485: Driver,
        port: MockSerial,
        dma: MockDma<u8>,
        log: Log,
        clock: MockClock,
        claims: PeripheralClaims,
    }

    fn rig(config: Rs485Config, dma: Option<MockDma<u8>>) -> Rig {
        let clock = MockClock::new();
        let log = Log::new(&clock);
        let port = MockSerial::new(0, &log);
        let pin = MockPin::new(&log);
        let handle = dma.clone().unwrap_or_else(MockDma::unavailable);
        let rs485 = Rs485Serial::new(port.clone(), Some(pin), dma, clock.clone(), config);
        Rig {
            rs485,
            port,
            dma: handle,
            log,
            clock,
            claims: PeripheralClaims::new(),
        }
    }

    fn ready() -> Rig {
        let mut r = rig(Rs485Config::default(), None);
        r.rs485.initialize(&mut r.claims).unwrap();
        r.log.clear();
        r
    }

    fn time_of(timed: &[(u64, Event)], event: Event) -> u64 {
        timed.iter().find(|(_, e)| *e == event).unwrap().0
    }

    #[test]
    fn test_initialize() {
        let mut r = rig(Rs485Config::default(), None);
        assert!(r.rs485.initialize(&mut r.claims).is_ok());
        assert!(r.claims.is_claimed(PeripheralId::Uart(0)));
        assert_eq!(r.log.events(), [Event::Direction(false)]);
        let config = r.port.state.borrow().config.unwrap();
        assert_eq!(config.baudrate, 115_200);
        assert_eq!(config.stop_bits, StopBits::One);
        assert!(!r.rs485.dma_enabled());
    }

    #[test]
    fn test_initialize_failure_is_retryable() {
        let mut r = rig(Rs485Config::default(), None);
        r.port.state.borrow_mut().fail_configure = true;
        assert_eq!(r.rs485.initialize(&mut r.claims), Err(Error::PortInitFailed));
        assert_eq!(r.rs485.state(), Rs485State::Error);
        assert_eq!(r.claims.claimed_count(), 0);

        r.port.state.borrow_mut().fail_configure = false;
        assert!(r.rs485.initialize(&mut r.claims).is_ok());
        assert_eq!(r.rs485.state(), Rs485State::Idle);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Rs485Config {
            buffer_size: 0,
            ..Default::default()
        };
        let mut r = rig(config, None);
        assert_eq!(r.rs485.initialize(&mut r.claims), Err(Error::Config));
        assert!(r.log.events().is_empty());
    }

    #[test]
    fn test_frame_with_direction_control() {
        let mut r = ready();
        r.rs485.set_frame_format(&[0x02], &[0x03]);
        assert!(r.rs485.send_frame(b"hi", true).is_ok());

        let events = r.log.events();
        assert_eq!(
            events,
            [
                Event::Direction(true),
                Event::Byte(0x02),
                Event::Byte(b'h'),
                Event::Byte(b'i'),
                Event::Byte(0x03),
                Event::Direction(false),
            ]
        );

        let timed = r.log.timed();
        let asserted = time_of(&timed, Event::Direction(true));
        let first = time_of(&timed, Event::Byte(0x02));
        let last = time_of(&timed, Event::Byte(0x03));
        let released = time_of(&timed, Event::Direction(false));
        assert!(first - asserted >= 50);
        assert!(released - last >= 50);

        assert_eq!(r.rs485.frames_sent(), 1);
        assert_eq!(r.rs485.bytes_sent(), 4);
        assert!(r.rs485.last_transmission_time_us() >= 100);
        assert!(!r.port.state.borrow().tx_interrupt);
    }

    #[test]
    fn test_validation_order() {
        let mut r = rig(Rs485Config::default(), None);
        assert_eq!(r.rs485.send_frame(b"x", false), Err(Error::NotInitialized));
        r.rs485.initialize(&mut r.claims).unwrap();
        r.log.clear();

        assert_eq!(r.rs485.send_frame(&[], false), Err(Error::InvalidParameters));
        r.rs485.send_frame(b"first", false).unwrap();
        assert_eq!(
            r.rs485.send_frame(&[], false),
            Err(Error::TransmissionInProgress)
        );
    }

    #[test]
    fn test_capacity_boundary() {
        let mut r = ready();
        r.rs485.set_frame_format(&[0xAA; 4], &[]);

        let too_long = [0x55u8; 1021];
        assert_eq!(
            r.rs485.send_frame(&too_long, true),
            Err(Error::BufferOverflow)
        );
        // Rejected before the line moved
        assert!(r.log.events().is_empty());

        assert!(r.rs485.send_frame(&too_long[..1020], true).is_ok());
        assert_eq!(r.log.bytes().len(), 1024);
    }

    #[test]
    fn test_busy_send_does_not_touch_frame() {
        let mut r = ready();
        r.rs485.send_frame(&[1u8; 100], false).unwrap();
        assert!(r.rs485.is_busy());
        assert_eq!(
            r.rs485.send_frame(&[2u8; 10], false),
            Err(Error::TransmissionInProgress)
        );
        assert!(r.rs485.wait_for_completion(100));
        assert_eq!(r.log.bytes(), [1u8; 100]);
    }

    #[test]
    fn test_wait_times_out_on_stuck_line() {
        let mut r = ready();
        r.port.state.borrow_mut().stuck = true;
        r.rs485.send_frame(&[0u8; 64], false).unwrap();

        let start = r.clock.peek();
        assert!(!r.rs485.wait_for_completion(100));
        let waited = r.clock.peek() - start;
        assert!(waited >= 100_000);
        assert!(waited < 200_000);
        assert!(r.rs485.is_busy());
    }

    #[test]
    fn test_blocking_timeout_aborts() {
        let mut r = ready();
        r.port.state.borrow_mut().stuck = true;
        assert_eq!(r.rs485.send_frame(&[0u8; 64], true), Err(Error::Timeout));
        assert_eq!(r.rs485.state(), Rs485State::Idle);
        assert_eq!(r.rs485.error_count(), 1);
        assert_eq!(r.rs485.frames_sent(), 0);
        assert_eq!(r.log.events().last(), Some(&Event::Direction(false)));
    }

    #[test]
    fn test_abort_transmission() {
        let mut r = ready();
        r.rs485.abort_transmission();
        assert_eq!(r.rs485.error_count(), 0);

        r.port.state.borrow_mut().stuck = true;
        r.rs485.send_frame(&[0u8; 64], false).unwrap();
        r.rs485.abort_transmission();
        assert!(!r.rs485.is_busy());
        assert_eq!(r.rs485.error_count(), 1);
        assert!(!r.port.state.borrow().tx_interrupt);
    }

    #[test]
    fn test_transfer_engine_path() {
        let mut r = rig(Rs485Config::default(), Some(MockDma::new()));
        r.rs485.initialize(&mut r.claims).unwrap();
        assert!(r.rs485.dma_enabled());

        r.rs485.set_frame_format(&[0x7E], &[]);
        assert!(r.rs485.send_frame(b"abc", false).is_ok());
        assert!(r.rs485.is_busy());
        assert_eq!(r.dma.state.borrow().data, b"\x7Eabc");
        assert!(r.rs485.wait_for_completion(100));
        assert_eq!(r.rs485.bytes_sent(), 4);

        r.dma.state.borrow_mut().hang = true;
        assert_eq!(r.rs485.send_frame(b"abc", true), Err(Error::Timeout));
        assert_eq!(r.dma.state.borrow().aborts, 1);

        r.rs485.end(&mut r.claims);
        assert!(!r.dma.state.borrow().claimed);
    }

    #[test]
    fn test_dropped_transfer_releases_line() {
        let mut r = rig(Rs485Config::default(), Some(MockDma::new()));
        r.rs485.initialize(&mut r.claims).unwrap();
        r.log.clear();
        r.rs485.send_frame(b"abc", false).unwrap();

        r.dma.state.borrow_mut().active = false;
        r.rs485.service();
        assert!(!r.rs485.is_busy());
        assert_eq!(r.rs485.error_count(), 1);
        assert_eq!(r.rs485.frames_sent(), 0);
        assert_eq!(r.log.events().last(), Some(&Event::Direction(false)));

        assert!(r.rs485.send_frame(b"abc", true).is_ok());
        assert_eq!(r.rs485.frames_sent(), 1);
    }

    #[test]
    fn test_repeated_frame() {
        let mut r = ready();
        assert_eq!(
            r.rs485.send_repeated_frame(b"x", 0, 5),
            Err(Error::InvalidParameters)
        );

        assert!(r.rs485.send_repeated_frame(b"ping", 3, 5).is_ok());
        assert_eq!(r.rs485.frames_sent(), 3);
        assert_eq!(r.log.bytes(), b"pingpingping");

        let timed = r.log.timed();
        let rises: StdVec<u64> = timed
            .iter()
            .filter(|(_, e)| *e == Event::Direction(true))
            .map(|&(t, _)| t)
            .collect();
        let falls: StdVec<u64> = timed
            .iter()
            .filter(|(_, e)| *e == Event::Direction(false))
            .map(|&(t, _)| t)
            .collect();
        assert_eq!(rises.len(), 3);
        assert!(rises[1] - falls[0] >= 5_000);
        assert!(rises[2] - falls[1] >= 5_000);
    }

    #[test]
    fn test_send_str_and_fmt() {
        let mut r = ready();
        assert!(r.rs485.send_str("OK", true).is_ok());
        assert!(r.rs485.send_fmt(format_args!("T={}", 42)).is_ok());
        assert!(r.rs485.wait_for_completion(100));
        assert_eq!(r.log.bytes(), b"OKT=42");

        let long = [b'a'; 600];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            r.rs485.send_fmt(format_args!("{}", long)),
            Err(Error::BufferOverflow)
        );
        assert_eq!(
            r.rs485.send_fmt(format_args!("")),
            Err(Error::InvalidParameters)
        );
    }

    #[test]
    fn test_inter_byte_timing() {
        let mut r = ready();
        assert!(r.rs485.send_frame_with_timing(b"abc", 200).is_ok());
        let timed = r.log.timed();
        let a = time_of(&timed, Event::Byte(b'a'));
        let b = time_of(&timed, Event::Byte(b'b'));
        let c = time_of(&timed, Event::Byte(b'c'));
        assert!(b - a >= 200);
        assert!(c - b >= 200);
        assert_eq!(r.rs485.frames_sent(), 1);
        assert_eq!(r.log.events().last(), Some(&Event::Direction(false)));
    }

    #[test]
    fn test_long_inter_byte_delay_saturates_timeout() {
        let mut r = ready();
        r.rs485.set_direction_timing(u32::MAX, 0);
        assert!(r
            .rs485
            .send_frame_with_timing(&[0x42u8; 10], 500_000_000)
            .is_ok());
        assert_eq!(r.log.bytes(), [0x42u8; 10]);
        assert_eq!(r.rs485.frames_sent(), 1);
        assert_eq!(r.rs485.error_count(), 0);
    }

    #[test]
    fn test_manual_direction_control() {
        let mut r = ready();
        r.rs485.set_auto_direction_control(false);
        r.rs485.send_frame(b"x", true).unwrap();
        assert_eq!(r.log.events(), [Event::Byte(b'x')]);

        r.rs485.set_transmit_mode(true);
        assert_eq!(r.log.events().last(), Some(&Event::Direction(true)));
        r.rs485.set_transmit_mode(false);
        assert_eq!(r.log.events().last(), Some(&Event::Direction(false)));
    }

    #[test]
    fn test_direction_timing_is_configurable() {
        let mut r = ready();
        r.rs485.set_direction_timing(500, 0);
        r.rs485.send_frame(b"x", true).unwrap();
        let timed = r.log.timed();
        let asserted = time_of(&timed, Event::Direction(true));
        let byte = time_of(&timed, Event::Byte(b'x'));
        assert!(byte - asserted >= 500);
    }

    #[test]
    fn test_buffer_size_and_baud() {
        let mut r = rig(Rs485Config::default(), None);
        assert_eq!(r.rs485.set_baud_rate(9600), Err(Error::NotInitialized));
        assert_eq!(r.rs485.set_buffer_size(0), Err(Error::InvalidParameters));
        assert!(r.rs485.set_buffer_size(8).is_ok());
        r.rs485.initialize(&mut r.claims).unwrap();
        assert_eq!(r.rs485.set_buffer_size(16), Err(Error::Config));
        assert_eq!(
            r.rs485.send_frame(&[0u8; 9], true),
            Err(Error::BufferOverflow)
        );

        assert!(r.rs485.set_baud_rate(9600).is_ok());
        assert_eq!(r.port.state.borrow().config.unwrap().baudrate, 9600);
        assert_eq!(r.rs485.config().serial.baudrate, 9600);
    }

    #[test]
    fn test_transmission_time() {
        let r = ready();
        // 8N1: 10 bits per byte
        assert_eq!(r.rs485.transmission_time_us(10), 869);

        let config = Rs485Config {
            serial: UartConfig {
                baudrate: 9600,
                data_bits: DataBits::Seven,
                parity: Parity::Even,
                stop_bits: StopBits::Two,
            },
            ..Default::default()
        };
        let r = rig(config, None);
        // 1 + 7 + 1 + 2 = 11 bits
        assert_eq!(r.rs485.transmission_time_us(1), 1146);
    }

    #[test]
    fn test_embedded_io_write() {
        use embedded_io::Write;

        let mut r = ready();
        assert_eq!(r.rs485.write(b"hello").unwrap(), 5);
        r.rs485.flush().unwrap();
        assert_eq!(r.log.bytes(), b"hello");
    }

    #[test]
    fn test_end_releases_port() {
        let mut r = ready();
        r.rs485.send_frame(b"bye", false).unwrap();
        r.rs485.end(&mut r.claims);
        assert!(!r.rs485.is_initialized());
        assert_eq!(r.rs485.frames_sent(), 1);
        assert_eq!(r.claims.claimed_count(), 0);
        assert_eq!(r.port.state.borrow().deinit_count, 1);
        assert_eq!(r.rs485.send_frame(b"x", false), Err(Error::NotInitialized));
    }

    proptest! {
        #[test]
        fn prop_frame_accepted_iff_it_fits(
            pre in 0usize..=16,
            post in 0usize..=16,
            len in 1usize..=64,
            capacity in 1usize..=96,
        ) {
            let mut r = rig(Rs485Config::default(), None);
            r.rs485.set_buffer_size(capacity).unwrap();
            r.rs485.initialize(&mut r.claims).unwrap();
            r.rs485.set_frame_format(&[0xAA; 16][..pre], &[0x55; 16][..post]);
            r.log.clear();

            let framed = r.rs485.frame_format().framed_len(len);
            let result = r.rs485.send_frame(&[0x42; 64][..len], true);
            if framed <= capacity {
                prop_assert!(result.is_ok());
                prop_assert_eq!(r.log.bytes().len(), framed);
            } else {
                prop_assert_eq!(result, Err(Error::BufferOverflow));
                prop_assert!(r.log.events().is_empty());
            }
        }
    }
}
