use crate::level::{Level, TestDuration};
use serde::{Deserialize, Serialize};

/// Outcome of a finished session. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestResult {
    pub wpm: u32,
    pub accuracy: u32,
    pub mistakes: usize,
    pub duration: TestDuration,
    pub level: Level,
}

/// Deduplication key for result submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub wpm: u32,
    pub accuracy: u32,
    pub mistakes: usize,
    pub level: Level,
    pub duration: TestDuration,
    pub typed_len: usize,
}

impl TestResult {
    pub fn fingerprint(&self, typed_len: usize) -> Fingerprint {
        Fingerprint {
            wpm: self.wpm,
            accuracy: self.accuracy,
            mistakes: self.mistakes,
            level: self.level,
            duration: self.duration,
            typed_len,
        }
    }
}
