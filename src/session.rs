use crate::level::{Level, TestDuration};
use crate::metrics::{compute_accuracy, compute_wpm, correct_chars};
use crate::result::TestResult;
use log::debug;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Waiting,
    InProgress,
    Finished,
}

/// Key input as seen by the session, already stripped of terminal details
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Backspace,
    Char(char),
    Other,
}

/// How a session reached `Finished`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Exhausted,
    TimedOut,
}

/// One timed attempt at typing a target text.
///
/// All mutation goes through `&mut self`, so a single owner serializes
/// ticks, key events, `start` and `reset`. `cursor` always equals the
/// number of typed characters and never exceeds the target length.
#[derive(Debug, Clone)]
pub struct TypingSession {
    target: String,
    target_chars: Vec<char>,
    typed: Vec<char>,
    mistakes: usize,
    status: Status,
    started_at: Option<SystemTime>,
    finished_at: Option<SystemTime>,
    finish_reason: Option<FinishReason>,
    duration: TestDuration,
    time_left: u64,
}

impl TypingSession {
    pub fn new(target: impl Into<String>, duration: TestDuration) -> Self {
        let target = target.into();
        Self {
            target_chars: target.chars().collect(),
            target,
            typed: Vec::new(),
            mistakes: 0,
            status: Status::Waiting,
            started_at: None,
            finished_at: None,
            finish_reason: None,
            duration,
            time_left: duration.as_secs(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn target_len(&self) -> usize {
        self.target_chars.len()
    }

    pub fn expected_char(&self, idx: usize) -> Option<char> {
        self.target_chars.get(idx).copied()
    }

    pub fn typed(&self) -> &[char] {
        &self.typed
    }

    pub fn typed_string(&self) -> String {
        self.typed.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.typed.len()
    }

    pub fn mistakes(&self) -> usize {
        self.mistakes
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<SystemTime> {
        self.finished_at
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn duration(&self) -> TestDuration {
        self.duration
    }

    pub fn time_left(&self) -> u64 {
        self.time_left
    }

    /// Whole seconds of countdown consumed so far
    pub fn elapsed_secs(&self) -> u64 {
        self.duration.as_secs() - self.time_left
    }

    pub fn correct_chars(&self) -> usize {
        correct_chars(&self.target, &self.typed)
    }

    /// Flip `Waiting` to `InProgress`. Any other state ignores the call.
    pub fn start(&mut self) {
        if self.status != Status::Waiting {
            return;
        }
        self.status = Status::InProgress;
        self.started_at = Some(SystemTime::now());
        debug!("session started ({}, {} chars)", self.duration, self.target_len());
        self.check_exhausted();
    }

    /// Advance the countdown by one second. Returns true if this tick
    /// finished the session.
    pub fn on_tick(&mut self) -> bool {
        if self.status != Status::InProgress {
            return false;
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.finish(FinishReason::TimedOut);
            return true;
        }
        false
    }

    /// Apply one key. Returns true if this key finished the session.
    pub fn handle_key_event(&mut self, key: KeyInput) -> bool {
        if self.status != Status::InProgress {
            return false;
        }
        match key {
            KeyInput::Backspace => {
                self.typed.pop();
                false
            }
            KeyInput::Char(c) => {
                if self.expected_char(self.cursor()) != Some(c) {
                    self.mistakes += 1;
                }
                self.typed.push(c);
                self.check_exhausted()
            }
            KeyInput::Other => false,
        }
    }

    /// Back to `Waiting` with the configured duration restored
    pub fn reset(&mut self) {
        self.typed.clear();
        self.mistakes = 0;
        self.status = Status::Waiting;
        self.started_at = None;
        self.finished_at = None;
        self.finish_reason = None;
        self.time_left = self.duration.as_secs();
    }

    /// Change the test length. A running or finished session is reset.
    pub fn set_duration(&mut self, duration: TestDuration) {
        self.duration = duration;
        match self.status {
            Status::InProgress | Status::Finished => self.reset(),
            Status::Waiting => self.time_left = duration.as_secs(),
        }
    }

    /// Replace the target text. Always resets, so the cursor can never
    /// point past the new text.
    pub fn set_target_text(&mut self, target: impl Into<String>) {
        self.target = target.into();
        self.target_chars = self.target.chars().collect();
        self.reset();
    }

    /// Metrics for a finished session, measured over the configured duration
    pub fn result(&self, level: Level) -> Option<TestResult> {
        if self.status != Status::Finished {
            return None;
        }
        let correct = self.correct_chars();
        Some(TestResult {
            wpm: compute_wpm(correct, self.duration.as_secs()),
            accuracy: compute_accuracy(correct, self.typed.len()),
            mistakes: self.mistakes,
            duration: self.duration,
            level,
        })
    }

    /// WPM and accuracy over the seconds elapsed so far
    pub fn live_metrics(&self) -> (u32, u32) {
        let correct = self.correct_chars();
        (
            compute_wpm(correct, self.elapsed_secs()),
            compute_accuracy(correct, self.typed.len()),
        )
    }

    fn check_exhausted(&mut self) -> bool {
        if self.status == Status::InProgress && self.cursor() == self.target_len() {
            self.finish(FinishReason::Exhausted);
            return true;
        }
        false
    }

    fn finish(&mut self, reason: FinishReason) {
        self.status = Status::Finished;
        self.finished_at = Some(SystemTime::now());
        self.finish_reason = Some(reason);
        debug!(
            "session finished by {:?}: cursor={} mistakes={} time_left={}",
            reason,
            self.cursor(),
            self.mistakes,
            self.time_left
        );
    }
}
