//! Persistent calibration record
//!
//! # Layout
//!
//! ```text
//! offset  0  zero_offset  f32 LE  ┐
//! offset  4  stop_a       f32 LE  │
//! offset  8  stop_b       f32 LE  │ data block
//! offset 12  reference.x  f32 LE  │
//! offset 16  reference.y  f32 LE  │
//! offset 20  reference.z  f32 LE  ┘
//! offset 24  marker       u8 = 0xAA  ┐
//! offset 25  version      u8         │ marker block
//! offset 26  crc16(data)  u16 LE     ┘
//! ```
//!
//! `save` retires the marker, commits the data block, then commits the marker
//! block. A record is only reported valid when the marker, version and CRC all
//! check out, so an interrupted save reads back as "not calibrated".

use crc::{Crc, CRC_16_IBM_3740};

use super::eeprom::NvMemory;
use super::orientation::Vec3;
use crate::config::{CALIBRATION_MARKER, STORE_FORMAT_VERSION, STORE_REGION_LEN};
use crate::{log_info, log_warn};

const DATA_LEN: usize = 24;
const MARKER_LEN: usize = STORE_REGION_LEN - DATA_LEN;
const RETIRED_MARKER: [u8; MARKER_LEN] = [0xFF; MARKER_LEN];

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Gravity direction assumed when no calibration exists: sensor Y along the tube
pub const DEFAULT_REFERENCE: Vec3 = Vec3::new(0.0, 1.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRecord {
    /// Gravity vector measured with the tube level
    pub reference: Vec3,
    pub zero_offset: f32,
    pub stop_a: f32,
    pub stop_b: f32,
    pub valid: bool,
}

impl CalibrationRecord {
    /// Uncalibrated record: everything zero, not valid
    pub const fn factory() -> Self {
        Self {
            reference: Vec3::ZERO,
            zero_offset: 0.0,
            stop_a: 0.0,
            stop_b: 0.0,
            valid: false,
        }
    }

    /// Reference used for angle computation; falls back to the default tube axis
    pub fn effective_reference(&self) -> Vec3 {
        if self.valid {
            self.reference
        } else {
            DEFAULT_REFERENCE
        }
    }

    fn encode(&self) -> [u8; DATA_LEN] {
        let fields = [
            self.zero_offset,
            self.stop_a,
            self.stop_b,
            self.reference.x,
            self.reference.y,
            self.reference.z,
        ];
        let mut data = [0u8; DATA_LEN];
        for (chunk, value) in data.chunks_exact_mut(4).zip(fields.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        data
    }

    fn decode(data: &[u8; DATA_LEN]) -> Option<Self> {
        let mut fields = [0f32; DATA_LEN / 4];
        for (value, chunk) in fields.iter_mut().zip(data.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        if fields.iter().any(|v| !v.is_finite()) {
            return None;
        }

        Some(Self {
            reference: Vec3::new(fields[3], fields[4], fields[5]),
            zero_offset: fields[0],
            stop_a: fields[1],
            stop_b: fields[2],
            valid: true,
        })
    }
}

impl Default for CalibrationRecord {
    fn default() -> Self {
        Self::factory()
    }
}

#[derive(Debug, PartialEq)]
pub enum StoreError<E> {
    Backend(E),
    /// Backend cannot hold a full record at the configured base offset
    RegionTooSmall,
}

/// Owns the non-volatile memory holding the calibration record
pub struct CalibrationStore<M> {
    mem: M,
    base: u32,
}

impl<M: NvMemory> CalibrationStore<M> {
    pub fn new(mem: M) -> Result<Self, StoreError<M::Error>> {
        Self::with_base(mem, 0)
    }

    /// Place the record at `base` instead of offset 0
    pub fn with_base(mem: M, base: u32) -> Result<Self, StoreError<M::Error>> {
        if (base as usize).saturating_add(STORE_REGION_LEN) > mem.capacity() {
            return Err(StoreError::RegionTooSmall);
        }
        Ok(Self { mem, base })
    }

    pub fn release(self) -> M {
        self.mem
    }

    /// Read the record. Never fails: anything short of a fully committed,
    /// checksummed record comes back as [`CalibrationRecord::factory`].
    pub fn load(&mut self) -> CalibrationRecord {
        let mut region = [0u8; STORE_REGION_LEN];
        if self.mem.read(self.base, &mut region).is_err() {
            log_warn!("calibration region unreadable");
            return CalibrationRecord::factory();
        }

        let (data, marker) = region.split_at(DATA_LEN);
        if marker[0] != CALIBRATION_MARKER {
            log_info!("no calibration found");
            return CalibrationRecord::factory();
        }
        if marker[1] != STORE_FORMAT_VERSION {
            log_warn!("calibration format {} not supported", marker[1]);
            return CalibrationRecord::factory();
        }

        let mut block = [0u8; DATA_LEN];
        block.copy_from_slice(data);
        let stored_crc = u16::from_le_bytes([marker[2], marker[3]]);
        if CRC16.checksum(&block) != stored_crc {
            log_warn!("calibration checksum mismatch");
            return CalibrationRecord::factory();
        }

        match CalibrationRecord::decode(&block) {
            Some(record) => {
                log_info!(
                    "calibration loaded: zero {} stop A {} stop B {} axis ({}, {}, {})",
                    record.zero_offset,
                    record.stop_a,
                    record.stop_b,
                    record.reference.x,
                    record.reference.y,
                    record.reference.z
                );
                record
            }
            None => {
                log_warn!("calibration holds non-finite values");
                CalibrationRecord::factory()
            }
        }
    }

    /// Persist `record` and return it as committed (`valid = true`).
    ///
    /// Phase order: retire marker, commit; write data, commit; write marker, commit.
    pub fn save(
        &mut self,
        record: &CalibrationRecord,
    ) -> Result<CalibrationRecord, StoreError<M::Error>> {
        let data = record.encode();
        let crc = CRC16.checksum(&data).to_le_bytes();
        let marker = [CALIBRATION_MARKER, STORE_FORMAT_VERSION, crc[0], crc[1]];
        let marker_offset = self.base + DATA_LEN as u32;

        self.write_and_commit(marker_offset, &RETIRED_MARKER)?;
        self.write_and_commit(self.base, &data)?;
        self.write_and_commit(marker_offset, &marker)?;

        log_info!("calibration saved");
        Ok(CalibrationRecord {
            valid: true,
            ..*record
        })
    }

    fn write_and_commit(&mut self, offset: u32, bytes: &[u8]) -> Result<(), StoreError<M::Error>> {
        self.mem.write(offset, bytes).map_err(StoreError::Backend)?;
        self.mem.commit().map_err(StoreError::Backend)
    }
}
