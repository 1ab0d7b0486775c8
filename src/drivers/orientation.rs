//! Altitude angle from the gravity vector
//!
//! The tube angle is the angle between the gravity vector measured now and the
//! gravity vector captured while the tube was level. Because only the angle
//! between the two vectors is used, the reading does not depend on how the
//! sensor is rotated around the tube axis.

use core::f32::consts::PI;
use embedded_hal::blocking::delay::DelayMs;
use libm::{atan2f, sqrtf};

use crate::config::{DEGENERATE_EPSILON, SAMPLE_DELAY_MS};
use crate::{log_debug, log_warn};

/// 3-axis acceleration in g
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f32 {
        sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }

    pub fn dot(&self, other: &Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Z component of `self × other` with both vectors projected on the XY plane
    pub fn cross_z(&self, other: &Vec3) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Unit vector, or `None` when the magnitude is too small to trust
    pub fn normalized(&self) -> Option<Vec3> {
        let mag = self.magnitude();
        if mag > DEGENERATE_EPSILON {
            Some(Vec3::new(self.x / mag, self.y / mag, self.z / mag))
        } else {
            None
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Anything that yields acceleration samples in g
pub trait Accelerometer {
    type Error;

    fn read_acceleration(&mut self) -> Result<Vec3, Self::Error>;
}

/// Signed angle in degrees between `sample` and the level `reference`.
///
/// Returns 0.0 when either vector is at or below [`DEGENERATE_EPSILON`].
/// Sign: a negative `reference × sample` Z component reads as positive (tube up).
pub fn raw_angle(sample: &Vec3, reference: &Vec3) -> f32 {
    let (sample, reference) = match (sample.normalized(), reference.normalized()) {
        (Some(s), Some(r)) => (s, r),
        _ => return 0.0,
    };

    // equals acos(s · r); exactly zero when s == r
    let dot = sample.dot(&reference).clamp(-1.0, 1.0);
    let sine = sample.cross(&reference).magnitude();
    let angle = atan2f(sine, dot) * (180.0 / PI);

    if reference.cross_z(&sample) < 0.0 {
        angle
    } else {
        -angle
    }
}

/// Reads the accelerometer and turns samples into angles
pub struct OrientationSampler<A> {
    accel: A,
    last: Vec3,
}

impl<A: Accelerometer> OrientationSampler<A> {
    pub fn new(accel: A) -> Self {
        Self {
            accel,
            last: Vec3::ZERO,
        }
    }

    /// Last sample read, zero if the last read failed
    pub fn last_sample(&self) -> Vec3 {
        self.last
    }

    pub fn release(self) -> A {
        self.accel
    }

    /// One read; a failed read degrades to the zero vector
    pub fn sample(&mut self) -> Vec3 {
        self.last = match self.accel.read_acceleration() {
            Ok(v) if v.is_finite() => v,
            Ok(_) => {
                log_warn!("accelerometer returned a non-finite sample");
                Vec3::ZERO
            }
            Err(_) => {
                log_warn!("accelerometer read failed");
                Vec3::ZERO
            }
        };
        self.last
    }

    /// Current signed altitude angle relative to `reference`
    pub fn angle(&mut self, reference: &Vec3) -> f32 {
        let sample = self.sample();
        raw_angle(&sample, reference)
    }

    /// Mean of `count` reads with a settle pause after each one.
    ///
    /// Failed reads are left out of the mean. Blocks for `count * SAMPLE_DELAY_MS`.
    pub fn averaged_sample<D: DelayMs<u16>>(&mut self, delay: &mut D, count: u16) -> Vec3 {
        let mut sum = Vec3::ZERO;
        let mut good = 0u16;

        for _ in 0..count {
            match self.accel.read_acceleration() {
                Ok(v) if v.is_finite() => {
                    sum.x += v.x;
                    sum.y += v.y;
                    sum.z += v.z;
                    good += 1;
                    self.last = v;
                }
                _ => log_warn!("skipping failed calibration sample"),
            }
            delay.delay_ms(SAMPLE_DELAY_MS);
        }

        if good == 0 {
            return Vec3::ZERO;
        }

        let n = good as f32;
        let mean = Vec3::new(sum.x / n, sum.y / n, sum.z / n);
        log_debug!("averaged {} of {} samples", good, count);
        mean
    }

    /// Mean of `count` single-sample angles against `reference`
    pub fn averaged_angle<D: DelayMs<u16>>(
        &mut self,
        delay: &mut D,
        reference: &Vec3,
        count: u16,
    ) -> f32 {
        let mut sum = 0.0f32;
        let mut good = 0u16;

        for _ in 0..count {
            match self.accel.read_acceleration() {
                Ok(v) if v.is_finite() => {
                    sum += raw_angle(&v, reference);
                    good += 1;
                    self.last = v;
                }
                _ => log_warn!("skipping failed calibration sample"),
            }
            delay.delay_ms(SAMPLE_DELAY_MS);
        }

        if good == 0 {
            0.0
        } else {
            sum / good as f32
        }
    }
}
