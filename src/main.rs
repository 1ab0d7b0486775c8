#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

#[cfg(target_arch = "avr")]
mod firmware {
    use panic_halt as _;

    use telescope_altimeter::drivers::{ButtonHandler, Mpu6050, SerialConsole};
    use telescope_altimeter::hal::{twi::TwiSpeed, ButtonPin, Delay, Eeprom, MillisClock, Twi, Uart};
    use telescope_altimeter::os::Clock;
    use telescope_altimeter::{log_info, Altimeter};

    #[avr_device::entry]
    fn main() -> ! {
        let clock = MillisClock::start();
        // SAFETY: all interrupt-shared state lives behind `interrupt::Mutex`
        unsafe { avr_device::interrupt::enable() };

        let mut console = SerialConsole::new(Uart::new());
        let mut button = ButtonHandler::new(ButtonPin::new());
        let sensor = Mpu6050::new(Twi::new(TwiSpeed::Fast400k));

        let mut altimeter =
            match Altimeter::start(sensor, Eeprom::new(), Delay::new(clock), &mut console) {
                Ok(altimeter) => altimeter,
                Err(_) => halt(),
            };
        log_info!("altimeter running");

        loop {
            let event = button.poll(clock.now_ms());
            altimeter.tick(event, &mut console);
        }
    }

    fn halt() -> ! {
        avr_device::interrupt::disable();
        loop {
            avr_device::asm::sleep();
        }
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    println!(
        "telescope_altimeter {}: firmware image, build for an AVR target (atmega128a)",
        telescope_altimeter::config::FIRMWARE_VERSION
    );
}
