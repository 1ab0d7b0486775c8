//! ATmega128 board support for the altimeter
//!
//! Only the peripherals the instrument touches: the button on PD0, Timer0 as
//! the millisecond clock, TWI for the sensor, the on-chip EEPROM and USART0.

pub mod eeprom;
pub mod gpio;
pub mod timer;
pub mod twi;
pub mod uart;

pub use eeprom::Eeprom;
pub use gpio::ButtonPin;
pub use timer::{Delay, MillisClock};
pub use twi::{Twi, TwiError};
pub use uart::Uart;
