//! Recording test doubles for the HAL traits
//!
//! Every double is `Clone` over shared state, so a test keeps one handle
//! for inspection and moves the other into the driver.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use picoled_hal::{
    DelayNs, Monotonic, OutputPin, PeripheralId, PixelLane, SerialPort, TransferEngine, UartConfig,
};

/// Manual clock; every read advances it by `step` microseconds
#[derive(Clone)]
pub struct MockClock {
    now: Rc<Cell<u64>>,
    step: u64,
}

impl MockClock {
    pub fn new() -> Self {
        Self::with_step(1)
    }

    pub fn with_step(step: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            step,
        }
    }

    pub fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }

    /// Current time without advancing
    pub fn peek(&self) -> u64 {
        self.now.get()
    }
}

impl Monotonic for MockClock {
    fn now_micros(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + self.step);
        t
    }
}

impl DelayNs for MockClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance((ns as u64).div_ceil(1000));
    }
}

/// Something observable on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Byte(u8),
    Break(bool),
    Direction(bool),
}

/// Timestamped event log shared by the doubles of one test
#[derive(Clone)]
pub struct Log {
    clock: MockClock,
    events: Rc<RefCell<Vec<(u64, Event)>>>,
}

impl Log {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push((self.clock.peek(), event));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().iter().map(|&(_, e)| e).collect()
    }

    pub fn timed(&self) -> Vec<(u64, Event)> {
        self.events.borrow().clone()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|&(_, e)| match e {
                Event::Byte(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

#[derive(Default)]
pub struct SerialState {
    pub config: Option<UartConfig>,
    pub pending: usize,
    pub fifo_depth: usize,
    /// Line never drains (simulated hang)
    pub stuck: bool,
    pub fail_configure: bool,
    pub tx_interrupt: bool,
    pub deinit_count: usize,
}

/// UART with a FIFO that drains one byte per status poll
#[derive(Clone)]
pub struct MockSerial {
    index: u8,
    log: Log,
    pub state: Rc<RefCell<SerialState>>,
}

impl MockSerial {
    pub fn new(index: u8, log: &Log) -> Self {
        Self {
            index,
            log: log.clone(),
            state: Rc::new(RefCell::new(SerialState {
                fifo_depth: 32,
                ..Default::default()
            })),
        }
    }

    fn drain_one(&self) {
        let mut state = self.state.borrow_mut();
        if !state.stuck && state.pending > 0 {
            state.pending -= 1;
        }
    }
}

impl SerialPort for MockSerial {
    type Error = ();

    fn id(&self) -> PeripheralId {
        PeripheralId::Uart(self.index)
    }

    fn configure(&mut self, config: &UartConfig) -> Result<u32, ()> {
        let mut state = self.state.borrow_mut();
        if state.fail_configure {
            return Err(());
        }
        state.config = Some(*config);
        Ok(config.baudrate)
    }

    fn set_baudrate(&mut self, baudrate: u32) -> Result<u32, ()> {
        let mut state = self.state.borrow_mut();
        match state.config.as_mut() {
            Some(config) => {
                config.baudrate = baudrate;
                Ok(baudrate)
            }
            None => Err(()),
        }
    }

    fn is_writable(&self) -> bool {
        self.drain_one();
        let state = self.state.borrow();
        state.pending < state.fifo_depth
    }

    fn write_byte(&mut self, byte: u8) {
        self.state.borrow_mut().pending += 1;
        self.log.record(Event::Byte(byte));
    }

    fn is_idle(&self) -> bool {
        self.drain_one();
        let state = self.state.borrow();
        !state.stuck && state.pending == 0
    }

    fn set_break(&mut self, asserted: bool) {
        self.log.record(Event::Break(asserted));
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        self.state.borrow_mut().tx_interrupt = enabled;
    }

    fn deinit(&mut self) {
        let mut state = self.state.borrow_mut();
        state.deinit_count += 1;
        state.config = None;
    }
}

/// Direction-control pin
#[derive(Clone)]
pub struct MockPin {
    log: Log,
    high: Rc<Cell<bool>>,
}

impl MockPin {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            high: Rc::new(Cell::new(false)),
        }
    }
}

impl OutputPin for MockPin {
    fn set_high(&mut self) {
        self.high.set(true);
        self.log.record(Event::Direction(true));
    }

    fn set_low(&mut self) {
        self.high.set(false);
        self.log.record(Event::Direction(false));
    }

    fn is_set_high(&self) -> bool {
        self.high.get()
    }
}

#[derive(Default)]
pub struct LaneState {
    pub words: Vec<u32>,
    pub configured: Option<(u32, u8)>,
    pub pending: usize,
    pub fail_configure: bool,
    pub deinit_count: usize,
}

/// Pixel lane with an eight-word queue
#[derive(Clone)]
pub struct MockLane {
    pub state: Rc<RefCell<LaneState>>,
}

impl MockLane {
    const DEPTH: usize = 8;

    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LaneState::default())),
        }
    }

    pub fn words(&self) -> Vec<u32> {
        self.state.borrow().words.clone()
    }

    fn drain_one(&self) {
        let mut state = self.state.borrow_mut();
        state.pending = state.pending.saturating_sub(1);
    }
}

impl PixelLane for MockLane {
    type Error = ();

    fn id(&self) -> PeripheralId {
        PeripheralId::PixelLane { block: 0, lane: 0 }
    }

    fn configure(&mut self, bit_rate_hz: u32, bits_per_pixel: u8) -> Result<(), ()> {
        let mut state = self.state.borrow_mut();
        if state.fail_configure {
            return Err(());
        }
        state.configured = Some((bit_rate_hz, bits_per_pixel));
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.drain_one();
        self.state.borrow().pending < Self::DEPTH
    }

    fn push(&mut self, word: u32) {
        let mut state = self.state.borrow_mut();
        state.pending += 1;
        state.words.push(word);
    }

    fn is_idle(&self) -> bool {
        self.drain_one();
        self.state.borrow().pending == 0
    }

    fn deinit(&mut self) {
        let mut state = self.state.borrow_mut();
        state.deinit_count += 1;
        state.configured = None;
    }
}

pub struct DmaState<W> {
    pub available: bool,
    pub claimed: bool,
    pub active: bool,
    /// Transfer never completes (simulated hang)
    pub hang: bool,
    pub polls_left: usize,
    pub data: Vec<W>,
    pub transfers: usize,
    pub aborts: usize,
}

/// Transfer engine that completes after a few polls
#[derive(Clone)]
pub struct MockDma<W> {
    pub state: Rc<RefCell<DmaState<W>>>,
}

impl<W> MockDma<W> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(DmaState {
                available: true,
                claimed: false,
                active: false,
                hang: false,
                polls_left: 0,
                data: Vec::new(),
                transfers: 0,
                aborts: 0,
            })),
        }
    }

    pub fn unavailable() -> Self {
        let dma = Self::new();
        dma.state.borrow_mut().available = false;
        dma
    }
}

impl<W: Copy> TransferEngine<W> for MockDma<W> {
    fn claim(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        if state.available && !state.claimed {
            state.claimed = true;
            true
        } else {
            false
        }
    }

    fn release(&mut self) {
        self.state.borrow_mut().claimed = false;
    }

    fn start(&mut self, words: &[W]) {
        let mut state = self.state.borrow_mut();
        state.data = words.to_vec();
        state.active = true;
        state.polls_left = 3;
        state.transfers += 1;
    }

    fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    fn abort(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.active {
            state.active = false;
            state.aborts += 1;
        }
    }

    fn take_complete(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.active || state.hang {
            return false;
        }
        if state.polls_left > 0 {
            state.polls_left -= 1;
            return false;
        }
        state.active = false;
        true
    }
}
