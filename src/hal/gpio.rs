use avr_device::atmega128a::PORTD;
use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_hal::digital::v2::InputPin;

const BUTTON_BIT: u8 = 0;

/// The calibration button on PD0, wired to ground (active low)
pub struct ButtonPin {
    _port: PhantomData<PORTD>,
}

impl ButtonPin {
    /// Configure PD0 as input with the internal pull-up enabled
    pub fn new() -> Self {
        unsafe {
            let p = PORTD::ptr();
            (*p).ddrd.modify(|r, w| w.bits(r.bits() & !(1 << BUTTON_BIT)));
            (*p).portd.modify(|r, w| w.bits(r.bits() | (1 << BUTTON_BIT)));
        }
        Self { _port: PhantomData }
    }
}

impl InputPin for ButtonPin {
    type Error = Infallible;

    #[inline]
    fn is_high(&self) -> Result<bool, Infallible> {
        let level = unsafe { (*PORTD::ptr()).pind.read().bits() };
        Ok(level & (1 << BUTTON_BIT) != 0)
    }

    #[inline]
    fn is_low(&self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}
