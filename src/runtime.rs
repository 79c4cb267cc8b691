use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::reporter::SubmissionOutcome;
use crate::session::KeyInput;
use crate::text_source::PracticeText;

/// Countdown resolution
pub const TICK_RATE: Duration = Duration::from_secs(1);

/// Unified event type consumed by the app loop
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// Completion of text fetch number `seq`
    TextReady { seq: u64, text: PracticeText },
    Submitted(SubmissionOutcome),
}

/// Handle background work uses to post completions onto the loop
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<AppEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<AppEvent>) -> Self {
        Self { tx }
    }

    /// Returns false once the loop has gone away
    pub fn send(&self, event: AppEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Source of events (keyboard, resize, background completions)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;

    /// Sender for background workers feeding this source
    fn sender(&self) -> EventSender;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input_tx = tx.clone();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                // ignore key release/repeat reports on terminals that send them
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if input_tx.send(evt).is_err() {
                break;
            }
        });

        Self { tx, rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> EventSender {
        EventSender::new(self.tx.clone())
    }
}

/// Channel-fed event source for tests
pub struct TestEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Default for TestEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> EventSender {
        EventSender::new(self.tx.clone())
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(TICK_RATE)
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Advances the application one event at a time, emitting `Tick` on a
/// fixed schedule no matter how much input arrives in between.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Instant,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Instant::now() + ticker.interval();
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    pub fn sender(&self) -> EventSender {
        self.event_source.sender()
    }

    /// Restart the tick schedule, e.g. when a session starts, so the
    /// first second is a full second
    pub fn realign(&mut self) {
        self.next_tick = Instant::now() + self.ticker.interval();
    }

    /// Blocks until the next event or the tick deadline, whichever comes first
    pub fn step(&mut self) -> AppEvent {
        let now = Instant::now();
        if now >= self.next_tick {
            return self.tick();
        }
        match self.event_source.recv_timeout(self.next_tick - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => self.tick(),
        }
    }

    fn tick(&mut self) -> AppEvent {
        self.next_tick += self.ticker.interval();
        // after a long stall, don't replay every missed tick at once
        let now = Instant::now();
        if self.next_tick < now {
            self.next_tick = now + self.ticker.interval();
        }
        AppEvent::Tick
    }
}

/// Map a terminal key to what the typing session understands
pub fn key_input(key: &KeyEvent) -> KeyInput {
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
    {
        return KeyInput::Other;
    }
    match key.code {
        KeyCode::Backspace => KeyInput::Backspace,
        KeyCode::Char(c) => KeyInput::Char(c),
        _ => KeyInput::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn step_returns_tick_on_timeout() {
        let es = TestEventSource::new();
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let mut runner = Runner::new(es, ticker);

        assert_matches!(runner.step(), AppEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let es = TestEventSource::new();
        es.sender().send(AppEvent::Resize);
        let ticker = FixedTicker::new(Duration::from_millis(200));
        let mut runner = Runner::new(es, ticker);

        assert_matches!(runner.step(), AppEvent::Resize);
    }

    #[test]
    fn input_does_not_delay_ticks() {
        let es = TestEventSource::new();
        let tx = es.sender();
        let interval = Duration::from_millis(30);
        let mut runner = Runner::new(es, FixedTicker::new(interval));

        // a steady stream of keys, faster than the tick interval
        let feeder = std::thread::spawn(move || {
            for _ in 0..40 {
                if !tx.send(AppEvent::Key(KeyEvent::new(
                    KeyCode::Char('a'),
                    KeyModifiers::NONE,
                ))) {
                    break;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        let started = Instant::now();
        let mut ticks = 0;
        while started.elapsed() < Duration::from_millis(200) {
            if let AppEvent::Tick = runner.step() {
                ticks += 1;
            }
        }
        feeder.join().unwrap();

        assert!(ticks >= 3, "expected regular ticks, got {ticks}");
    }

    #[test]
    fn sender_reports_closed_loop() {
        let es = TestEventSource::new();
        let tx = es.sender();
        drop(es);
        assert!(!tx.send(AppEvent::Tick));
    }

    #[test]
    fn key_mapping() {
        let plain = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        let shifted = KeyEvent::new(KeyCode::Char('X'), KeyModifiers::SHIFT);
        let ctrl = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let back = KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE);
        let f1 = KeyEvent::new(KeyCode::F(1), KeyModifiers::NONE);

        assert_eq!(key_input(&plain), KeyInput::Char('x'));
        assert_eq!(key_input(&shifted), KeyInput::Char('X'));
        assert_eq!(key_input(&ctrl), KeyInput::Other);
        assert_eq!(key_input(&back), KeyInput::Backspace);
        assert_eq!(key_input(&f1), KeyInput::Other);
    }
}
