//! MPU6050 accelerometer driver

use embedded_hal::blocking::i2c::{Write, WriteRead};

use super::orientation::{Accelerometer, Vec3};
use crate::config::MPU6050_ADDR;
use crate::log_info;

// MPU6050 registers
const REG_CONFIG: u8 = 0x1A;
const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B;
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I_VALUE: u8 = 0x68;

/// DLPF_CFG = 4: accel 21 Hz, gyro 20 Hz
const DLPF_20HZ: u8 = 0x04;

/// Accelerometer full-scale range
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AccelScale {
    G2 = 0,  // ±2g
    G4 = 1,  // ±4g
    G8 = 2,  // ±8g
    G16 = 3, // ±16g
}

impl AccelScale {
    /// LSB per g
    fn sensitivity(self) -> f32 {
        match self {
            AccelScale::G2 => 16384.0,
            AccelScale::G4 => 8192.0,
            AccelScale::G8 => 4096.0,
            AccelScale::G16 => 2048.0,
        }
    }
}

/// Gyroscope full-scale range
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GyroScale {
    Dps250 = 0,  // ±250°/s
    Dps500 = 1,  // ±500°/s
    Dps1000 = 2, // ±1000°/s
    Dps2000 = 3, // ±2000°/s
}

#[derive(Debug, PartialEq)]
pub enum SensorError<E> {
    /// I2C transaction failed
    Bus(E),
    /// WHO_AM_I returned something other than an MPU6050
    WrongDevice(u8),
}

/// MPU6050 driver
pub struct Mpu6050<I2C> {
    i2c: I2C,
    accel_sensitivity: f32,
    last: Vec3,
}

impl<I2C, E> Mpu6050<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    /// Probe and configure the sensor. Failure here is fatal to startup.
    pub fn new(i2c: I2C) -> Result<Self, SensorError<E>> {
        let mut mpu = Self {
            i2c,
            accel_sensitivity: AccelScale::G2.sensitivity(),
            last: Vec3::ZERO,
        };

        mpu.init()?;
        log_info!("MPU6050 initialized");

        Ok(mpu)
    }

    fn init(&mut self) -> Result<(), SensorError<E>> {
        let id = self.read_reg(REG_WHO_AM_I)?;
        if id != WHO_AM_I_VALUE {
            return Err(SensorError::WrongDevice(id));
        }

        // Wake up, internal oscillator
        self.write_reg(REG_PWR_MGMT_1, 0x00)?;
        self.set_accel_scale(AccelScale::G2)?;
        self.set_gyro_scale(GyroScale::Dps250)?;
        self.write_reg(REG_CONFIG, DLPF_20HZ)?;

        Ok(())
    }

    pub fn set_accel_scale(&mut self, scale: AccelScale) -> Result<(), SensorError<E>> {
        self.write_reg(REG_ACCEL_CONFIG, (scale as u8) << 3)?;
        self.accel_sensitivity = scale.sensitivity();
        Ok(())
    }

    pub fn set_gyro_scale(&mut self, scale: GyroScale) -> Result<(), SensorError<E>> {
        self.write_reg(REG_GYRO_CONFIG, (scale as u8) << 3)
    }

    /// Acceleration in g
    pub fn read_accel(&mut self) -> Result<Vec3, SensorError<E>> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(MPU6050_ADDR, &[REG_ACCEL_XOUT_H], &mut data)
            .map_err(SensorError::Bus)?;

        let raw_x = i16::from_be_bytes([data[0], data[1]]);
        let raw_y = i16::from_be_bytes([data[2], data[3]]);
        let raw_z = i16::from_be_bytes([data[4], data[5]]);

        self.last = Vec3::new(
            raw_x as f32 / self.accel_sensitivity,
            raw_y as f32 / self.accel_sensitivity,
            raw_z as f32 / self.accel_sensitivity,
        );
        Ok(self.last)
    }

    /// Last successful accelerometer reading
    pub fn last_reading(&self) -> Vec3 {
        self.last
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<(), SensorError<E>> {
        self.i2c
            .write(MPU6050_ADDR, &[reg, val])
            .map_err(SensorError::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError<E>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(MPU6050_ADDR, &[reg], &mut buf)
            .map_err(SensorError::Bus)?;
        Ok(buf[0])
    }
}

impl<I2C, E> Accelerometer for Mpu6050<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    type Error = SensorError<E>;

    fn read_acceleration(&mut self) -> Result<Vec3, Self::Error> {
        self.read_accel()
    }
}
