use rand::Rng;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MIN_DELAY: f64 = 0.1;
pub const DEFAULT_MAX_DELAY: f64 = 0.3;
/// One day. Longer pauses are not a click interval.
pub const MAX_DELAY_SECS: f64 = 86_400.0;

#[derive(Debug, Error, PartialEq)]
pub enum DelayError {
    #[error("delay must be a finite number of seconds, got {0}")]
    NotFinite(f64),
    #[error("delay cannot be negative, got {0}")]
    Negative(f64),
    #[error("delay cannot exceed {MAX_DELAY_SECS} seconds, got {0}")]
    TooLong(f64),
    #[error("could not read {0:?} as a number of seconds")]
    Unparsable(String),
}

/// Bounds, in seconds, of the random pause between two clicks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    min: f64,
    max: f64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

impl DelayRange {
    /// Builds a range, swapping the bounds when they arrive reversed.
    pub fn new(min: f64, max: f64) -> Result<Self, DelayError> {
        for value in [min, max] {
            if !value.is_finite() {
                return Err(DelayError::NotFinite(value));
            }
            if value < 0.0 {
                return Err(DelayError::Negative(value));
            }
            if value > MAX_DELAY_SECS {
                return Err(DelayError::TooLong(value));
            }
        }
        if min > max {
            Ok(Self { min: max, max: min })
        } else {
            Ok(Self { min, max })
        }
    }

    pub fn parse(min_text: &str, max_text: &str) -> Result<Self, DelayError> {
        let parse = |text: &str| {
            text.trim()
                .parse::<f64>()
                .map_err(|_| DelayError::Unparsable(text.to_string()))
        };
        Self::new(parse(min_text)?, parse(max_text)?)
    }

    /// Reads the two delay fields, falling back to `fallback` when either one is bad.
    pub fn commit(min_text: &str, max_text: &str, fallback: DelayRange) -> Self {
        match Self::parse(min_text, max_text) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!("Invalid delay input ({}), restoring {:?}", e, fallback);
                fallback
            }
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Duration {
        let secs = if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        };
        // Four decimal places of a second, i.e. whole tenths of a millisecond.
        let tenths_of_ms = (secs.clamp(0.0, MAX_DELAY_SECS) * 10_000.0).round() as u64;
        Duration::from_micros(tenths_of_ms.saturating_mul(100))
    }
}

/// Text shown in a delay field for a committed value.
pub fn format_secs(secs: f64) -> String {
    let text = format!("{:.4}", secs);
    let text = text.trim_end_matches('0');
    match text.strip_suffix('.') {
        Some(whole) => format!("{}.0", whole),
        None => text.to_string(),
    }
}
