//! Text presentation surface over any serial port
//!
//! The screen for a mode (title plus instructions) is printed once when the
//! mode changes; after that each tick prints a single reading line.

use embedded_hal::serial;
use libm::{fabsf, roundf};
use ufmt::{uWrite, uwrite, uwriteln};

use crate::application::{Frame, Presenter, UiMode};

pub struct SerialConsole<S> {
    serial: S,
    last_mode: Option<UiMode>,
}

impl<S: serial::Write<u8>> SerialConsole<S> {
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            last_mode: None,
        }
    }

    pub fn release(self) -> S {
        self.serial
    }

    pub fn write_line(&mut self, s: &str) -> Result<(), S::Error> {
        self.write_str(s)?;
        self.write_str("\r\n")
    }

    /// Signed angle with one decimal, e.g. `+12.3` or `-0.4`
    fn write_angle(&mut self, degrees: f32) -> Result<(), S::Error> {
        let tenths = roundf(fabsf(degrees) * 10.0) as u32;
        let sign = if degrees < 0.0 && tenths != 0 { "-" } else { "+" };
        uwrite!(self, "{}{}.{}", sign, tenths / 10, tenths % 10)
    }

    fn write_screen(&mut self, mode: UiMode) -> Result<(), S::Error> {
        let (title, lines): (&str, [&str; 3]) = match mode {
            UiMode::Normal => ("ALTITUDE", ["", "", ""]),
            UiMode::CalibrationMenu => (
                "CALIBRATION",
                ["1. Level telescope", "2. Press button", "Hold to cancel"],
            ),
            UiMode::ZeroCalibration => (
                "STEP 1: ZERO",
                ["Level telescope", "with bubble level", "Press when ready"],
            ),
            UiMode::StopACalibration => (
                "STEP 2: STOP A",
                ["Move to Stop A", "(low position)", "Press when ready"],
            ),
            UiMode::StopBCalibration => (
                "STEP 3: STOP B",
                ["Move to Stop B", "(high position)", "Press when ready"],
            ),
            UiMode::SessionSyncA => (
                "SESSION SYNC",
                ["Move to Stop A", "(low position)", "Press when ready"],
            ),
            UiMode::SessionSyncB => (
                "SESSION SYNC",
                ["Move to Stop B", "(high position)", "Press when ready"],
            ),
        };

        uwriteln!(self, "== {} ==\r", title)?;
        for line in lines.iter().filter(|l| !l.is_empty()) {
            self.write_line(line)?;
        }
        Ok(())
    }

    fn render(&mut self, frame: &Frame) -> Result<(), S::Error> {
        if self.last_mode != Some(frame.mode) {
            self.write_screen(frame.mode)?;
            self.last_mode = Some(frame.mode);
        }

        if frame.mode == UiMode::Normal {
            self.write_str("ALT ")?;
            self.write_angle(frame.reported)?;
            self.write_str(" deg  Raw: ")?;
            self.write_angle(frame.raw)?;
            if !frame.calibrated {
                self.write_str(" [UNCAL]")?;
            }
        } else {
            self.write_str("Raw: ")?;
            self.write_angle(frame.raw)?;
            self.write_str(" deg")?;
        }
        self.write_str("\r\n")
    }
}

impl<S: serial::Write<u8>> uWrite for SerialConsole<S> {
    type Error = S::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        for byte in s.bytes() {
            nb::block!(self.serial.write(byte))?;
        }
        Ok(())
    }
}

// Serial output errors are dropped: the loop keeps running without a terminal.
impl<S: serial::Write<u8>> Presenter for SerialConsole<S> {
    fn startup(&mut self, version: &str) {
        let _ = self.write_line("TELESCOPE ALTIMETER");
        let _ = self.write_line(version);
        self.last_mode = None;
    }

    fn show_error(&mut self, message: &str) {
        let _ = self
            .write_str("ERROR: ")
            .and_then(|_| self.write_line(message));
        let _ = nb::block!(self.serial.flush());
    }

    fn show_message(&mut self, title: &str, message: &str) {
        let _ = uwriteln!(self, "** {}: {} **\r", title, message);
        self.last_mode = None;
    }

    fn update(&mut self, frame: &Frame) {
        let _ = self.render(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct Capture {
        out: Vec<u8>,
    }

    impl serial::Write<u8> for Capture {
        type Error = Infallible;

        fn write(&mut self, word: u8) -> nb::Result<(), Infallible> {
            self.out.push(word);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), Infallible> {
            Ok(())
        }
    }

    fn text(console: SerialConsole<Capture>) -> String {
        String::from_utf8(console.release().out).unwrap()
    }

    fn frame(mode: UiMode, reported: f32, raw: f32, calibrated: bool) -> Frame {
        Frame {
            mode,
            reported,
            raw,
            calibrated,
        }
    }

    #[test]
    fn normal_screen_and_reading() {
        let mut console = SerialConsole::new(Capture::default());
        console.update(&frame(UiMode::Normal, 12.34, -1.96, true));
        console.update(&frame(UiMode::Normal, 12.5, 0.0, true));
        assert_eq!(
            text(console),
            "== ALTITUDE ==\r\n\
             ALT +12.3 deg  Raw: -2.0\r\n\
             ALT +12.5 deg  Raw: +0.0\r\n"
        );
    }

    #[test]
    fn uncalibrated_is_tagged() {
        let mut console = SerialConsole::new(Capture::default());
        console.update(&frame(UiMode::Normal, -0.04, -0.04, false));
        let out = text(console);
        assert!(out.ends_with("ALT +0.0 deg  Raw: +0.0 [UNCAL]\r\n"), "{}", out);
    }

    #[test]
    fn calibration_screens_show_instructions_once() {
        let mut console = SerialConsole::new(Capture::default());
        console.update(&frame(UiMode::StopBCalibration, 0.0, 41.0, false));
        console.update(&frame(UiMode::StopBCalibration, 0.0, 41.25, false));
        assert_eq!(
            text(console),
            "== STEP 3: STOP B ==\r\n\
             Move to Stop B\r\n\
             (high position)\r\n\
             Press when ready\r\n\
             Raw: +41.0 deg\r\n\
             Raw: +41.3 deg\r\n"
        );
    }

    #[test]
    fn messages_force_screen_redraw() {
        let mut console = SerialConsole::new(Capture::default());
        console.update(&frame(UiMode::Normal, 1.0, 1.0, true));
        console.show_message("CALIBRATED", "Saved to EEPROM");
        console.update(&frame(UiMode::Normal, 1.0, 1.0, true));
        let out = text(console);
        assert_eq!(out.matches("== ALTITUDE ==").count(), 2);
        assert!(out.contains("** CALIBRATED: Saved to EEPROM **\r\n"));
    }

    #[test]
    fn startup_and_error() {
        let mut console = SerialConsole::new(Capture::default());
        console.startup("v2.1");
        console.show_error("Sensor not found");
        assert_eq!(
            text(console),
            "TELESCOPE ALTIMETER\r\nv2.1\r\nERROR: Sensor not found\r\n"
        );
    }
}
