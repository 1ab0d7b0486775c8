//! Short/long press classification for the single active-low button

use embedded_hal::digital::v2::InputPin;

use crate::config::LONG_PRESS_MS;
use crate::log_warn;

/// Result of one classification tick. Events last exactly one tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressEvent {
    #[default]
    None,
    ShortPress,
    LongPress,
}

/// Edge/timing state machine over the raw button level.
///
/// High is released, low is pressed. No debounce filtering is applied; the
/// switch is expected to be debounced in hardware.
pub struct PressClassifier {
    last_high: bool,
    press_start_ms: u32,
    long_fired: bool,
    long_press_ms: u32,
}

impl PressClassifier {
    pub const fn new() -> Self {
        Self::with_threshold(LONG_PRESS_MS)
    }

    pub const fn with_threshold(long_press_ms: u32) -> Self {
        Self {
            last_high: true,
            press_start_ms: 0,
            long_fired: false,
            long_press_ms,
        }
    }

    /// Feed the current level. Call once per control tick.
    pub fn update(&mut self, high: bool, now_ms: u32) -> PressEvent {
        let mut event = PressEvent::None;

        if !high && self.last_high {
            self.press_start_ms = now_ms;
            self.long_fired = false;
        }

        if !high && !self.long_fired && now_ms.wrapping_sub(self.press_start_ms) > self.long_press_ms {
            self.long_fired = true;
            event = PressEvent::LongPress;
        }

        if high && !self.last_high {
            let held = now_ms.wrapping_sub(self.press_start_ms);
            if held < self.long_press_ms && !self.long_fired {
                event = PressEvent::ShortPress;
            }
        }

        self.last_high = high;
        event
    }

    /// Button currently held down
    pub fn is_pressed(&self) -> bool {
        !self.last_high
    }
}

impl Default for PressClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifier bound to an input pin
pub struct ButtonHandler<P> {
    pin: P,
    classifier: PressClassifier,
}

impl<P: InputPin> ButtonHandler<P> {
    /// `pin` must already be configured as input with pull-up
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            classifier: PressClassifier::new(),
        }
    }

    /// Read the pin and classify. A failed read repeats the previous level.
    pub fn poll(&mut self, now_ms: u32) -> PressEvent {
        let high = match self.pin.is_high() {
            Ok(level) => level,
            Err(_) => {
                log_warn!("button read failed");
                !self.classifier.is_pressed()
            }
        };
        self.classifier.update(high, now_ms)
    }

    pub fn is_pressed(&self) -> bool {
        self.classifier.is_pressed()
    }

    pub fn release(self) -> P {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::pin::{Mock as PinMock, State, Transaction};

    #[test]
    fn idle_produces_nothing() {
        let mut c = PressClassifier::new();
        for t in 0..100 {
            assert_eq!(c.update(true, t * 10), PressEvent::None);
        }
    }

    #[test]
    fn short_press_on_release() {
        let mut c = PressClassifier::new();
        assert_eq!(c.update(false, 1000), PressEvent::None);
        assert!(c.is_pressed());
        assert_eq!(c.update(false, 1100), PressEvent::None);
        assert_eq!(c.update(true, 1200), PressEvent::ShortPress);
        // pulse lasts one tick
        assert_eq!(c.update(true, 1210), PressEvent::None);
    }

    #[test]
    fn hold_of_1999_ms_is_short() {
        let mut c = PressClassifier::new();
        assert_eq!(c.update(false, 500), PressEvent::None);
        for t in (510..2499).step_by(10) {
            assert_eq!(c.update(false, t), PressEvent::None);
        }
        assert_eq!(c.update(true, 2499), PressEvent::ShortPress);
    }

    #[test]
    fn hold_of_2001_ms_is_long_once() {
        let mut c = PressClassifier::new();
        assert_eq!(c.update(false, 500), PressEvent::None);
        for t in (510..=2500).step_by(10) {
            assert_eq!(c.update(false, t), PressEvent::None);
        }
        assert_eq!(c.update(false, 2501), PressEvent::LongPress);
        // release after a long press never reports a short press
        assert_eq!(c.update(true, 2511), PressEvent::None);
        for t in 2512..2600 {
            assert_eq!(c.update(true, t), PressEvent::None);
        }
    }

    #[test]
    fn long_press_fires_while_held() {
        let mut c = PressClassifier::new();
        c.update(false, 0);
        assert_eq!(c.update(false, 2000), PressEvent::None);
        assert_eq!(c.update(false, 2001), PressEvent::LongPress);
        assert_eq!(c.update(false, 5000), PressEvent::None);
        assert_eq!(c.update(true, 6000), PressEvent::None);
    }

    #[test]
    fn exactly_threshold_is_neither() {
        let mut c = PressClassifier::new();
        c.update(false, 0);
        assert_eq!(c.update(false, 2000), PressEvent::None);
        assert_eq!(c.update(true, 2000), PressEvent::None);
    }

    #[test]
    fn latch_resets_on_next_press() {
        let mut c = PressClassifier::new();
        c.update(false, 0);
        assert_eq!(c.update(false, 3000), PressEvent::LongPress);
        c.update(true, 3100);
        c.update(false, 4000);
        assert_eq!(c.update(true, 4200), PressEvent::ShortPress);
    }

    #[test]
    fn survives_clock_wrap() {
        let mut c = PressClassifier::new();
        let start = u32::MAX - 100;
        c.update(false, start);
        assert_eq!(c.update(false, start.wrapping_add(2500)), PressEvent::LongPress);

        let mut c = PressClassifier::new();
        c.update(false, start);
        assert_eq!(c.update(true, start.wrapping_add(300)), PressEvent::ShortPress);
    }

    #[test]
    fn handler_reads_active_low_pin() {
        let expectations = [
            Transaction::get(State::High),
            Transaction::get(State::Low),
            Transaction::get(State::Low),
            Transaction::get(State::High),
        ];
        let mut button = ButtonHandler::new(PinMock::new(&expectations));
        assert_eq!(button.poll(0), PressEvent::None);
        assert_eq!(button.poll(10), PressEvent::None);
        assert!(button.is_pressed());
        assert_eq!(button.poll(150), PressEvent::None);
        assert_eq!(button.poll(160), PressEvent::ShortPress);
        button.release().done();
    }
}
