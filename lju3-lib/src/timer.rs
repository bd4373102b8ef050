//! Timer clock search: turn a requested square-wave frequency into a clock
//! base, clock divisor and timer value.
//!
//! In frequency-output mode the U3 produces
//! `base / (2 * divisor * value)`, with `divisor` and `value` both in `1..=256`.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::Display;
use tracing::debug;

/// Timer clock bases that can be combined with a divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ClockBase {
    #[strum(to_string = "1 MHz")]
    Mhz1,
    #[strum(to_string = "4 MHz")]
    Mhz4,
    #[strum(to_string = "12 MHz")]
    Mhz12,
    #[strum(to_string = "48 MHz")]
    Mhz48,
}

impl ClockBase {
    /// Fastest first.
    pub const ALL: [ClockBase; 4] = [ClockBase::Mhz48, ClockBase::Mhz12, ClockBase::Mhz4, ClockBase::Mhz1];

    pub fn hz(&self) -> u32 {
        match self {
            ClockBase::Mhz1 => 1_000_000,
            ClockBase::Mhz4 => 4_000_000,
            ClockBase::Mhz12 => 12_000_000,
            ClockBase::Mhz48 => 48_000_000,
        }
    }

    /// Value of TimerClockConfig bits 0-2 selecting this base with divisor.
    pub fn selector(&self) -> u8 {
        match self {
            ClockBase::Mhz1 => 3,
            ClockBase::Mhz4 => 4,
            ClockBase::Mhz12 => 5,
            ClockBase::Mhz48 => 6,
        }
    }

    /// Lowest frequency (exclusive) for which this base is picked.
    pub fn threshold_hz(&self) -> u32 {
        self.hz() >> 17
    }

    /// Pick the fastest base whose `base / 2^17` is still below the request.
    ///
    /// This is a fixed ladder, not an optimisation: it prefers resolution at
    /// high frequencies and falls back to slower bases, with 1 MHz as the
    /// floor.
    pub fn for_frequency(requested_hz: u32) -> ClockBase {
        ClockBase::ALL
            .into_iter()
            .find(|base| requested_hz > base.threshold_hz())
            .unwrap_or(ClockBase::Mhz1)
    }
}

/// Timer modes exposed through feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TimerMode {
    Pwm16 = 0,
    Pwm8 = 1,
    FrequencyOutput = 7,
    TimerStop = 9,
}

/// Result of the frequency search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSolution {
    pub base: ClockBase,
    /// Clock divisor, `1..=256`.
    pub divisor: u16,
    /// Timer value, `1..=256`.
    pub value: u16,
    pub achievable_hz: f64,
}

impl TimerSolution {
    /// Divisor as stored by the device, where 0 means 256.
    pub fn divisor_byte(&self) -> u8 {
        (self.divisor % 256) as u8
    }

    /// Timer value as stored by the device, where 0 means 256.
    pub fn value_byte(&self) -> u8 {
        (self.value % 256) as u8
    }
}

/// Search the divisor/value pair whose product is closest to
/// `base / (2 * requested_hz)`.
///
/// Assuming `divisor <= value`, the divisor lies in
/// `[target / 256, sqrt(target) + 1]`; every divisor in that range is tried
/// and the value is bisected in `1..=256`. Ties keep the first pair found
/// (lowest divisor, upper bracket before lower).
///
/// Returns `None` for a zero request.
pub fn solve(requested_hz: u32) -> Option<TimerSolution> {
    if requested_hz == 0 {
        return None;
    }

    let base = ClockBase::for_frequency(requested_hz);
    let target = base.hz() as f64 / 2.0 / requested_hz as f64;

    let divisor_min = ((target / 256.0) as u32).clamp(1, 256);
    let divisor_max = (target.sqrt() as u32 + 1).clamp(1, 256);

    let mut best = (1u32, 1u32);
    let mut best_err = (1.0 - target).abs();

    for divisor in divisor_min..=divisor_max.max(divisor_min) {
        let (lo, hi) = bracket_value(divisor, target);
        for value in [hi, lo] {
            let err = (f64::from(divisor * value) - target).abs();
            if err < best_err {
                best = (divisor, value);
                best_err = err;
            }
        }
    }

    let (divisor, value) = best;
    let achievable_hz = base.hz() as f64 / (2.0 * f64::from(divisor) * f64::from(value));
    debug!(%base, divisor, value, achievable_hz, "Timer clock solution");

    Some(TimerSolution {
        base,
        divisor: divisor as u16,
        value: value as u16,
        achievable_hz,
    })
}

/// Bisect `1..=256` for the values whose product with `divisor` brackets
/// `target`. Returns `(lower, upper)`; both equal on an exact hit.
fn bracket_value(divisor: u32, target: f64) -> (u32, u32) {
    let mut lo = 1u32;
    let mut hi = 256u32;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        let product = f64::from(divisor * mid);
        if product < target {
            lo = mid;
        } else if product > target {
            hi = mid;
        } else {
            return (mid, mid);
        }
    }
    (lo, hi)
}
