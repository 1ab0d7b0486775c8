//! Application layer: one control tick at a time
//!
//! Each tick: press event -> calibration controller -> raw angle ->
//! correction -> filter -> presentation surface.

pub mod controller;
pub mod corrector;

use embedded_hal::blocking::delay::DelayMs;

pub use controller::{CalibrationController, Mode, Outcome, UiMode};
pub use corrector::{correct, two_point_scale, AltitudeFilter};

use crate::config::FIRMWARE_VERSION;
use crate::drivers::button_handler::PressEvent;
use crate::drivers::calibration::{CalibrationRecord, CalibrationStore, StoreError};
use crate::drivers::eeprom::NvMemory;
use crate::drivers::orientation::{Accelerometer, OrientationSampler};
use crate::{log_error, log_info};

/// Everything the presentation surface needs for one tick
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub mode: UiMode,
    /// Corrected and filtered altitude in degrees
    pub reported: f32,
    /// Uncorrected angle in degrees
    pub raw: f32,
    pub calibrated: bool,
}

/// Presentation surface (screen, serial terminal, ...)
pub trait Presenter {
    fn startup(&mut self, version: &str);
    fn show_error(&mut self, message: &str);
    fn show_message(&mut self, title: &str, message: &str);
    fn update(&mut self, frame: &Frame);
}

#[derive(Debug, PartialEq)]
pub enum StartupError<S, M> {
    /// The sensor did not come up; the loop must not start
    SensorInit(S),
    Store(StoreError<M>),
}

/// The instrument: owns the sensor, the calibration memory and the delay
pub struct Altimeter<A, M, D> {
    sampler: OrientationSampler<A>,
    store: CalibrationStore<M>,
    delay: D,
    controller: CalibrationController,
    filter: AltitudeFilter,
}

impl<A, M, D> Altimeter<A, M, D>
where
    A: Accelerometer,
    M: NvMemory,
    D: DelayMs<u16>,
{
    /// Bring the instrument up.
    ///
    /// Shows the startup screen, then either reports a sensor failure on the
    /// presenter and returns it, or loads the calibration and returns the
    /// running instrument.
    pub fn start<S, P: Presenter>(
        sensor: Result<A, S>,
        mem: M,
        delay: D,
        presenter: &mut P,
    ) -> Result<Self, StartupError<S, M::Error>> {
        presenter.startup(FIRMWARE_VERSION);

        let accel = match sensor {
            Ok(accel) => accel,
            Err(e) => {
                log_error!("sensor initialization failed");
                presenter.show_error("Sensor not found");
                return Err(StartupError::SensorInit(e));
            }
        };

        let store = match CalibrationStore::new(mem) {
            Ok(store) => store,
            Err(e) => {
                log_error!("calibration memory too small");
                presenter.show_error("EEPROM too small");
                return Err(StartupError::Store(e));
            }
        };

        Ok(Self::new(accel, store, delay))
    }

    /// Assemble from parts; loads the calibration record once
    pub fn new(accel: A, mut store: CalibrationStore<M>, delay: D) -> Self {
        let record = store.load();
        if !record.valid {
            log_info!("running uncalibrated");
        }
        Self {
            sampler: OrientationSampler::new(accel),
            store,
            delay,
            controller: CalibrationController::new(record),
            filter: AltitudeFilter::new(),
        }
    }

    /// Use a different capture size (mainly for tests and bench rigs)
    pub fn with_capture_samples(mut self, samples: u16) -> Self {
        self.controller = CalibrationController::with_samples(*self.controller.record(), samples);
        self
    }

    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }

    pub fn record(&self) -> &CalibrationRecord {
        self.controller.record()
    }

    /// One control cycle. Blocks while a calibration capture runs.
    pub fn tick<P: Presenter>(&mut self, event: PressEvent, presenter: &mut P) -> Frame {
        let outcome = self.controller.handle(
            event,
            &mut self.sampler,
            &mut self.delay,
            &mut self.store,
        );

        // every mode change can switch the reference the raw angle is taken against
        if outcome != Outcome::Unchanged {
            self.filter.reset();
        }
        match outcome {
            Outcome::Saved => presenter.show_message("CALIBRATED", "Saved to EEPROM"),
            Outcome::SaveFailed => presenter.show_message("ERROR", "Save failed, uncalibrated"),
            Outcome::Cancelled => presenter.show_message("CANCELLED", "Calibration kept"),
            Outcome::Unchanged | Outcome::Advanced => {}
        }

        let reference = self.controller.display_reference();
        let raw = self.sampler.angle(&reference);
        let record = self.controller.record();
        let reported = self.filter.update(correct(raw, record));

        let frame = Frame {
            mode: self.controller.mode().ui_mode(),
            reported,
            raw,
            calibrated: record.valid,
        };
        presenter.update(&frame);
        frame
    }

    /// Hand the owned peripherals back
    pub fn release(self) -> (A, M, D) {
        (self.sampler.release(), self.store.release(), self.delay)
    }
}
