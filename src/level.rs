use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Difficulty of the generated practice text
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    /// Prompt sent to the text generation service for this level
    pub fn prompt(&self) -> &'static str {
        match self {
            Level::Beginner => {
                "Generate a single, simple paragraph of about 100 words for a beginner typing test. \
                 The entire text must be in lowercase. Do not include any punctuation like periods, \
                 commas, or apostrophes. Use common English words."
            }
            Level::Intermediate => {
                "Generate a single paragraph of about 100 words for an intermediate typing test. \
                 The text must be entirely in lowercase. It must include proper use of commas and periods."
            }
            Level::Advanced => {
                "Generate a single paragraph of about 100 words for an advanced typing test. \
                 The text must use proper sentence case, including capitalizing the first letter of \
                 sentences and any proper nouns. It must also include punctuation like commas, \
                 periods, and apostrophes where appropriate."
            }
        }
    }

    /// Parse the wire name used by the persistence endpoint
    pub fn from_wire(name: &str) -> Option<Level> {
        Level::ALL.into_iter().find(|l| l.to_string() == name)
    }
}

/// Length of a timed test. Only 15, 30 and 60 seconds are offered.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum TestDuration {
    Fifteen,
    #[default]
    Thirty,
    Sixty,
}

impl TestDuration {
    pub const ALL: [TestDuration; 3] = [
        TestDuration::Fifteen,
        TestDuration::Thirty,
        TestDuration::Sixty,
    ];

    pub fn as_secs(&self) -> u64 {
        match self {
            TestDuration::Fifteen => 15,
            TestDuration::Thirty => 30,
            TestDuration::Sixty => 60,
        }
    }

    /// Next duration in the selector, wrapping around
    pub fn cycle(&self) -> TestDuration {
        match self {
            TestDuration::Fifteen => TestDuration::Thirty,
            TestDuration::Thirty => TestDuration::Sixty,
            TestDuration::Sixty => TestDuration::Fifteen,
        }
    }
}

impl TryFrom<u64> for TestDuration {
    type Error = String;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        match secs {
            15 => Ok(TestDuration::Fifteen),
            30 => Ok(TestDuration::Thirty),
            60 => Ok(TestDuration::Sixty),
            other => Err(format!("unsupported duration {other}s, expected 15, 30 or 60")),
        }
    }
}

impl From<TestDuration> for u64 {
    fn from(d: TestDuration) -> Self {
        d.as_secs()
    }
}

impl fmt::Display for TestDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// clap value parser for `--duration`
pub fn parse_duration(s: &str) -> Result<TestDuration, String> {
    let secs: u64 = s
        .trim_end_matches('s')
        .parse()
        .map_err(|_| format!("invalid duration `{s}`"))?;
    TestDuration::try_from(secs)
}
