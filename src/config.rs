//! Configuration constants for the telescope altimeter

/// Firmware version reported on the startup screen
pub const FIRMWARE_VERSION: &str = "v2.1";

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// UART baud rate for the serial presentation surface
pub const UART_BAUD: u32 = 9600;

/// MPU6050 I2C address (AD0 low)
pub const MPU6050_ADDR: u8 = 0x68;

/// A press held longer than this becomes a long press
pub const LONG_PRESS_MS: u32 = 2000;

/// Samples averaged for every calibration capture
pub const CALIBRATION_SAMPLES: u16 = 50;

/// Pause between calibration samples so the sensor DLPF settles
pub const SAMPLE_DELAY_MS: u16 = 20;

/// Exponential moving average factor for the displayed altitude (0-1, lower = smoother)
pub const FILTER_ALPHA: f32 = 0.2;

/// Vectors at or below this magnitude (g) are too short to normalize
pub const DEGENERATE_EPSILON: f32 = 0.1;

/// Stop A/B spans at or below this (degrees) disable the two-point scale
pub const SCALE_RANGE_EPSILON: f32 = 0.1;

/// Bytes of non-volatile memory used by the calibration record
pub const STORE_REGION_LEN: usize = 28;

/// Sentinel written last to mark a fully committed record
pub const CALIBRATION_MARKER: u8 = 0xAA;

/// Layout version of the persisted calibration record
pub const STORE_FORMAT_VERSION: u8 = 2;
