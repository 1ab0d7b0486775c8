//! System millisecond clock

use core::cell::Cell;

/// Source of the monotonic millisecond time used to classify button presses
pub trait Clock {
    /// Milliseconds since boot, wrapping at `u32::MAX`
    fn now_ms(&self) -> u32;
}

/// Millisecond tick counter advanced from a timer interrupt
pub struct SysTick {
    millis: Cell<u32>,
}

impl SysTick {
    /// Create a counter starting at zero
    pub const fn new() -> Self {
        Self {
            millis: Cell::new(0),
        }
    }

    /// Advance the counter by one millisecond
    #[inline]
    pub fn tick(&self) {
        let count = self.millis.get();
        self.millis.set(count.wrapping_add(1));
    }

    /// Advance the counter by several milliseconds at once
    #[inline]
    pub fn advance(&self, ms: u32) {
        self.millis.set(self.millis.get().wrapping_add(ms));
    }
}

impl Clock for SysTick {
    #[inline]
    fn now_ms(&self) -> u32 {
        self.millis.get()
    }
}

impl Default for SysTick {
    fn default() -> Self {
        Self::new()
    }
}
