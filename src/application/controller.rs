//! Calibration workflow
//!
//! ```text
//!            short                short(capture ref)          short(capture A)
//!   Normal ───────▶ Menu ───────▶ Zero ──────────────▶ StopA ─────────────▶ StopB ──┐
//!     │ ▲                                                                          │
//!     │ └──────────────── short(capture B, save) ◀─────────────────────────────────┘
//!     │ long                   short(capture A)
//!     └─────▶ SyncA ─────────────────────────────▶ SyncB ── short(capture B, save) ──▶ Normal
//!
//!   long in any state other than Normal: back to Normal, nothing saved
//! ```
//!
//! Captures block the loop for `CALIBRATION_SAMPLES * SAMPLE_DELAY_MS`.

use embedded_hal::blocking::delay::DelayMs;

use crate::config::CALIBRATION_SAMPLES;
use crate::drivers::button_handler::PressEvent;
use crate::drivers::calibration::{CalibrationRecord, CalibrationStore};
use crate::drivers::eeprom::NvMemory;
use crate::drivers::orientation::{Accelerometer, OrientationSampler, Vec3};
use crate::{log_debug, log_error, log_info, log_warn};

/// Controller state. Capture results travel inside the variants until the
/// final step saves them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    Normal,
    CalibrationMenu,
    ZeroCalibration,
    StopACalibration { reference: Vec3 },
    StopBCalibration { reference: Vec3, stop_a: f32 },
    SessionSyncA,
    SessionSyncB { stop_a: f32 },
}

/// Flat view of [`Mode`] for the presentation surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UiMode {
    Normal,
    CalibrationMenu,
    ZeroCalibration,
    StopACalibration,
    StopBCalibration,
    SessionSyncA,
    SessionSyncB,
}

impl Mode {
    pub fn ui_mode(&self) -> UiMode {
        match self {
            Mode::Normal => UiMode::Normal,
            Mode::CalibrationMenu => UiMode::CalibrationMenu,
            Mode::ZeroCalibration => UiMode::ZeroCalibration,
            Mode::StopACalibration { .. } => UiMode::StopACalibration,
            Mode::StopBCalibration { .. } => UiMode::StopBCalibration,
            Mode::SessionSyncA => UiMode::SessionSyncA,
            Mode::SessionSyncB { .. } => UiMode::SessionSyncB,
        }
    }
}

/// What a single event did
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    /// No event, or an event with no effect
    Unchanged,
    /// Moved to another step
    Advanced,
    /// Long press left the workflow without saving
    Cancelled,
    /// A new record was committed and is now active
    Saved,
    /// Commit failed; the instrument runs uncalibrated, as it will after a reboot
    SaveFailed,
}

pub struct CalibrationController {
    mode: Mode,
    record: CalibrationRecord,
    samples: u16,
}

impl CalibrationController {
    /// Start in `Normal` with the record loaded at boot
    pub fn new(record: CalibrationRecord) -> Self {
        Self::with_samples(record, CALIBRATION_SAMPLES)
    }

    /// Like [`new`](Self::new) with a custom capture size
    pub fn with_samples(record: CalibrationRecord, samples: u16) -> Self {
        Self {
            mode: Mode::Normal,
            record,
            samples: samples.max(1),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Last committed record (or the factory record)
    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    /// Reference the live raw angle should be measured against. During a full
    /// calibration this is the freshly captured level vector.
    pub fn display_reference(&self) -> Vec3 {
        match self.mode {
            Mode::StopACalibration { reference } | Mode::StopBCalibration { reference, .. } => {
                reference
            }
            _ => self.record.effective_reference(),
        }
    }

    /// Apply one press event. Captures and saves happen synchronously here.
    pub fn handle<A, D, M>(
        &mut self,
        event: PressEvent,
        sampler: &mut OrientationSampler<A>,
        delay: &mut D,
        store: &mut CalibrationStore<M>,
    ) -> Outcome
    where
        A: Accelerometer,
        D: DelayMs<u16>,
        M: NvMemory,
    {
        let outcome = match event {
            PressEvent::None => return Outcome::Unchanged,
            PressEvent::LongPress => self.on_long_press(),
            PressEvent::ShortPress => self.on_short_press(sampler, delay, store),
        };
        log_debug!("calibration mode -> {}", self.mode.ui_mode() as u8);
        outcome
    }

    fn on_long_press(&mut self) -> Outcome {
        match self.mode {
            Mode::Normal => {
                log_info!("session sync started");
                self.mode = Mode::SessionSyncA;
                Outcome::Advanced
            }
            _ => {
                log_info!("calibration cancelled");
                self.mode = Mode::Normal;
                Outcome::Cancelled
            }
        }
    }

    fn on_short_press<A, D, M>(
        &mut self,
        sampler: &mut OrientationSampler<A>,
        delay: &mut D,
        store: &mut CalibrationStore<M>,
    ) -> Outcome
    where
        A: Accelerometer,
        D: DelayMs<u16>,
        M: NvMemory,
    {
        let samples = self.samples;
        match self.mode {
            Mode::Normal => {
                self.mode = Mode::CalibrationMenu;
                Outcome::Advanced
            }
            Mode::CalibrationMenu => {
                self.mode = Mode::ZeroCalibration;
                Outcome::Advanced
            }
            Mode::ZeroCalibration => {
                let reference = sampler.averaged_sample(delay, samples);
                if reference.normalized().is_none() {
                    log_warn!("level reference is degenerate, angles will read 0");
                }
                log_info!(
                    "zero reference ({}, {}, {})",
                    reference.x,
                    reference.y,
                    reference.z
                );
                self.mode = Mode::StopACalibration { reference };
                Outcome::Advanced
            }
            Mode::StopACalibration { reference } => {
                let stop_a = sampler.averaged_angle(delay, &reference, samples);
                log_info!("stop A calibrated: {}", stop_a);
                self.mode = Mode::StopBCalibration { reference, stop_a };
                Outcome::Advanced
            }
            Mode::StopBCalibration { reference, stop_a } => {
                let stop_b = sampler.averaged_angle(delay, &reference, samples);
                log_info!("stop B calibrated: {}", stop_b);
                let record = CalibrationRecord {
                    reference,
                    zero_offset: 0.0,
                    stop_a,
                    stop_b,
                    valid: true,
                };
                self.commit(store, record)
            }
            Mode::SessionSyncA => {
                let reference = self.record.effective_reference();
                let stop_a = sampler.averaged_angle(delay, &reference, samples);
                log_info!("stop A synced: {}", stop_a);
                self.mode = Mode::SessionSyncB { stop_a };
                Outcome::Advanced
            }
            Mode::SessionSyncB { stop_a } => {
                let reference = self.record.effective_reference();
                let stop_b = sampler.averaged_angle(delay, &reference, samples);
                log_info!("stop B synced: {}", stop_b);
                let record = CalibrationRecord {
                    reference,
                    stop_a,
                    stop_b,
                    valid: true,
                    ..self.record
                };
                self.commit(store, record)
            }
        }
    }

    fn commit<M: NvMemory>(
        &mut self,
        store: &mut CalibrationStore<M>,
        record: CalibrationRecord,
    ) -> Outcome {
        self.mode = Mode::Normal;
        match store.save(&record) {
            Ok(committed) => {
                self.record = committed;
                Outcome::Saved
            }
            Err(_) => {
                // the marker may already be retired, so the stored record is no longer valid
                log_error!("calibration save failed, running uncalibrated");
                self.record.valid = false;
                Outcome::SaveFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::eeprom::MemoryEeprom;
    use embedded_hal_mock::delay::MockNoop;

    struct Fixed(Vec3);

    impl Accelerometer for Fixed {
        type Error = ();

        fn read_acceleration(&mut self) -> Result<Vec3, ()> {
            Ok(self.0)
        }
    }

    struct Rig {
        sampler: OrientationSampler<Fixed>,
        delay: MockNoop,
        store: CalibrationStore<MemoryEeprom<28>>,
    }

    impl Rig {
        fn new(sample: Vec3) -> Self {
            Self {
                sampler: OrientationSampler::new(Fixed(sample)),
                delay: MockNoop::new(),
                store: CalibrationStore::new(MemoryEeprom::new()).unwrap(),
            }
        }

        fn press(&mut self, ctl: &mut CalibrationController, event: PressEvent) -> Outcome {
            ctl.handle(event, &mut self.sampler, &mut self.delay, &mut self.store)
        }

        fn tilt(&mut self, sample: Vec3) {
            self.sampler = OrientationSampler::new(Fixed(sample));
        }
    }

    fn tilted(deg: f32) -> Vec3 {
        let rad = deg.to_radians();
        Vec3::new(-rad.sin(), rad.cos(), 0.0)
    }

    #[test]
    fn starts_in_normal() {
        let ctl = CalibrationController::new(CalibrationRecord::factory());
        assert_eq!(ctl.mode(), Mode::Normal);
        assert_eq!(ctl.mode().ui_mode(), UiMode::Normal);
    }

    #[test]
    fn no_event_changes_nothing() {
        let mut rig = Rig::new(tilted(0.0));
        let mut ctl = CalibrationController::with_samples(CalibrationRecord::factory(), 3);
        assert_eq!(rig.press(&mut ctl, PressEvent::None), Outcome::Unchanged);
        assert_eq!(ctl.mode(), Mode::Normal);
    }

    #[test]
    fn full_calibration_captures_and_saves() {
        let level = Vec3::new(0.0, 1.0, 0.0);
        let mut rig = Rig::new(level);
        let mut ctl = CalibrationController::with_samples(CalibrationRecord::factory(), 5);

        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::Advanced);
        assert_eq!(ctl.mode().ui_mode(), UiMode::CalibrationMenu);
        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::Advanced);
        assert_eq!(ctl.mode().ui_mode(), UiMode::ZeroCalibration);

        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::Advanced);
        assert_eq!(ctl.mode(), Mode::StopACalibration { reference: level });
        assert_eq!(ctl.display_reference(), level);

        rig.tilt(tilted(-5.0));
        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::Advanced);
        let stop_a = match ctl.mode() {
            Mode::StopBCalibration { stop_a, .. } => stop_a,
            other => panic!("unexpected mode {:?}", other),
        };
        assert!((stop_a - 5.0).abs() < 1e-3);

        rig.tilt(tilted(-80.0));
        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::Saved);
        assert_eq!(ctl.mode(), Mode::Normal);

        let record = *ctl.record();
        assert!(record.valid);
        assert_eq!(record.reference, level);
        assert_eq!(record.zero_offset, 0.0);
        assert!((record.stop_b - 80.0).abs() < 1e-3);
        assert_eq!(rig.store.load(), record);
    }

    #[test]
    fn long_press_from_normal_enters_session_sync() {
        let mut rig = Rig::new(tilted(0.0));
        let mut ctl = CalibrationController::with_samples(CalibrationRecord::factory(), 3);
        assert_eq!(rig.press(&mut ctl, PressEvent::LongPress), Outcome::Advanced);
        assert_eq!(ctl.mode(), Mode::SessionSyncA);
    }

    #[test]
    fn long_press_cancels_every_step_without_saving() {
        let steps = [
            Mode::CalibrationMenu,
            Mode::ZeroCalibration,
            Mode::StopACalibration {
                reference: tilted(0.0),
            },
            Mode::StopBCalibration {
                reference: tilted(0.0),
                stop_a: 3.0,
            },
            Mode::SessionSyncA,
            Mode::SessionSyncB { stop_a: 3.0 },
        ];

        for step in steps {
            let mut rig = Rig::new(tilted(0.0));
            let mut ctl = CalibrationController::with_samples(CalibrationRecord::factory(), 3);
            ctl.mode = step;
            assert_eq!(rig.press(&mut ctl, PressEvent::LongPress), Outcome::Cancelled);
            assert_eq!(ctl.mode(), Mode::Normal);
            assert_eq!(*ctl.record(), CalibrationRecord::factory());
            assert!(!rig.store.load().valid);
            assert_eq!(rig.store.release().commit_count(), 0);
        }
    }

    #[test]
    fn session_sync_keeps_reference_and_zero() {
        let reference = Vec3::new(0.1, 0.99, 0.0);
        let mut rig = Rig::new(reference);
        let existing = rig
            .store
            .save(&CalibrationRecord {
                reference,
                zero_offset: 1.5,
                stop_a: 10.0,
                stop_b: 50.0,
                valid: true,
            })
            .unwrap();
        let mut ctl = CalibrationController::with_samples(existing, 4);

        rig.press(&mut ctl, PressEvent::LongPress);
        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::Advanced);
        assert!(matches!(ctl.mode(), Mode::SessionSyncB { stop_a } if stop_a.abs() < 0.05));
        // still the committed record until the second stop is captured
        assert_eq!(ctl.record().stop_a, 10.0);

        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::Saved);
        let record = *ctl.record();
        assert_eq!(record.reference, reference);
        assert_eq!(record.zero_offset, 1.5);
        assert!(record.stop_a.abs() < 0.05);
        assert!(record.stop_b.abs() < 0.05);
        assert_eq!(rig.store.load(), record);
    }

    #[test]
    fn session_sync_without_calibration_uses_default_axis() {
        let mut rig = Rig::new(tilted(-12.0));
        let mut ctl = CalibrationController::with_samples(CalibrationRecord::factory(), 2);
        rig.press(&mut ctl, PressEvent::LongPress);
        rig.press(&mut ctl, PressEvent::ShortPress);
        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::Saved);
        let record = *ctl.record();
        assert!(record.valid);
        assert_eq!(record.reference, Vec3::new(0.0, 1.0, 0.0));
        assert!((record.stop_a - 12.0).abs() < 1e-3);
    }

    #[test]
    fn failed_save_drops_to_uncalibrated() {
        let mut rig = Rig::new(tilted(0.0));
        let mut mem = MemoryEeprom::<28>::new();
        mem.fail_commits_after(0);
        rig.store = CalibrationStore::new(mem).unwrap();

        let previous = CalibrationRecord {
            reference: tilted(0.0),
            zero_offset: 2.0,
            stop_a: 0.0,
            stop_b: 50.0,
            valid: true,
        };
        let mut ctl = CalibrationController::with_samples(previous, 2);
        ctl.mode = Mode::StopBCalibration {
            reference: tilted(0.0),
            stop_a: 1.0,
        };
        assert_eq!(rig.press(&mut ctl, PressEvent::ShortPress), Outcome::SaveFailed);
        assert_eq!(ctl.mode(), Mode::Normal);
        assert!(!ctl.record().valid);
        assert_eq!(ctl.display_reference(), Vec3::new(0.0, 1.0, 0.0));
    }
}
