//! Accumulates fractional scroll amounts into whole wheel notches.
//!
//! Two-finger scrolling produces small fractional amounts (a 5 px finger
//! movement at the default sensitivity is `-0.4`).  Wheel axes on the kernel
//! side are integers, so the fraction is carried forward until it adds up to a
//! full notch instead of being truncated away on every call.

/// Carries the sub-notch remainder between calls.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelAccumulator {
    remainder: f32,
}

impl WheelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` and returns the whole notches now ready to send.
    ///
    /// The returned value truncates toward zero; the fractional part stays in
    /// the accumulator with the same sign as the pending scroll.
    pub fn push(&mut self, amount: f32) -> i32 {
        if !amount.is_finite() {
            return 0;
        }
        self.remainder += amount;
        let notches = self.remainder.trunc();
        self.remainder -= notches;
        notches as i32
    }

    /// Pending fraction that has not yet produced a notch.
    pub fn remainder(&self) -> f32 {
        self.remainder
    }

    pub fn reset(&mut self) {
        self.remainder = 0.0;
    }
}
