//! Timer0 millisecond clock and delay

use avr_device::atmega128a::TC0;
use avr_device::interrupt::{self, Mutex};
use core::marker::PhantomData;
use embedded_hal::blocking::delay::DelayMs;

use crate::config::CPU_FREQ_HZ;
use crate::os::{Clock, SysTick};

// CTC mode, clk/64
const TCCR0_CTC_DIV64: u8 = 0x0C;
const OCIE0: u8 = 1 << 1;
const COMPARE_1MS: u8 = (CPU_FREQ_HZ / 64 / 1000 - 1) as u8;

static TICKS: Mutex<SysTick> = Mutex::new(SysTick::new());

#[avr_device::interrupt(atmega128a)]
fn TIMER0_COMP() {
    interrupt::free(|cs| TICKS.borrow(cs).tick());
}

/// Handle to the interrupt-driven millisecond counter
#[derive(Clone, Copy)]
pub struct MillisClock {
    _timer: PhantomData<TC0>,
}

impl MillisClock {
    /// Start Timer0. Interrupts must be enabled globally for the clock to run.
    pub fn start() -> Self {
        unsafe {
            let p = TC0::ptr();
            (*p).tcnt0.write(|w| w.bits(0));
            (*p).ocr0.write(|w| w.bits(COMPARE_1MS));
            (*p).tccr0.write(|w| w.bits(TCCR0_CTC_DIV64));
            (*p).timsk.modify(|r, w| w.bits(r.bits() | OCIE0));
        }
        Self { _timer: PhantomData }
    }
}

impl Clock for MillisClock {
    fn now_ms(&self) -> u32 {
        interrupt::free(|cs| TICKS.borrow(cs).now_ms())
    }
}

/// Blocking delay paced by the millisecond clock
pub struct Delay {
    clock: MillisClock,
}

impl Delay {
    pub fn new(clock: MillisClock) -> Self {
        Self { clock }
    }
}

impl DelayMs<u16> for Delay {
    fn delay_ms(&mut self, ms: u16) {
        let start = self.clock.now_ms();
        // +1 so a delay never ends early on a partially elapsed tick
        while self.clock.now_ms().wrapping_sub(start) < u32::from(ms) + 1 {}
    }
}
