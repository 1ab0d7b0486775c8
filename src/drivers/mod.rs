pub mod button_handler;
pub mod calibration;
pub mod eeprom;
pub mod mpu6050;
pub mod orientation;
pub mod serial_console;

pub use button_handler::{ButtonHandler, PressClassifier, PressEvent};
pub use calibration::{CalibrationRecord, CalibrationStore, StoreError};
pub use eeprom::{MemoryEeprom, NvMemory};
pub use mpu6050::{AccelScale, GyroScale, Mpu6050, SensorError};
pub use orientation::{Accelerometer, OrientationSampler, Vec3};
pub use serial_console::SerialConsole;
