//! On-chip EEPROM (4 KiB)

use avr_device::atmega128a::EEPROM;
use core::marker::PhantomData;
use embedded_storage::{ReadStorage, Storage};

use crate::drivers::eeprom::{EepromError, NvMemory};

const EERE: u8 = 1 << 0;
const EEWE: u8 = 1 << 1;
const EEMWE: u8 = 1 << 2;

pub const EEPROM_SIZE: usize = 4096;

pub struct Eeprom {
    _eeprom: PhantomData<EEPROM>,
}

impl Eeprom {
    pub fn new() -> Self {
        Self {
            _eeprom: PhantomData,
        }
    }

    fn wait_ready() {
        unsafe { while (*EEPROM::ptr()).eecr.read().bits() & EEWE != 0 {} }
    }

    fn set_address(addr: u16) {
        Self::wait_ready();
        unsafe { (*EEPROM::ptr()).eear.write(|w| w.bits(addr)) }
    }

    fn read_byte(addr: u16) -> u8 {
        Self::set_address(addr);
        unsafe {
            let p = EEPROM::ptr();
            (*p).eecr.modify(|r, w| w.bits(r.bits() | EERE));
            (*p).eedr.read().bits()
        }
    }

    fn write_byte(addr: u16, value: u8) {
        // skip the erase/write cycle when nothing changes
        if Self::read_byte(addr) == value {
            return;
        }
        Self::set_address(addr);
        // EEWE must follow EEMWE within four cycles
        avr_device::interrupt::free(|_| unsafe {
            let p = EEPROM::ptr();
            (*p).eedr.write(|w| w.bits(value));
            (*p).eecr.write(|w| w.bits(EEMWE));
            (*p).eecr.write(|w| w.bits(EEMWE | EEWE));
        });
    }

    fn check(offset: u32, len: usize) -> Result<u16, EepromError> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= EEPROM_SIZE => Ok(start as u16),
            _ => Err(EepromError::OutOfBounds),
        }
    }
}

impl ReadStorage for Eeprom {
    type Error = EepromError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), EepromError> {
        let base = Self::check(offset, bytes.len())?;
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = Self::read_byte(base + i as u16);
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        EEPROM_SIZE
    }
}

impl Storage for Eeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), EepromError> {
        let base = Self::check(offset, bytes.len())?;
        for (i, byte) in bytes.iter().enumerate() {
            Self::write_byte(base + i as u16, *byte);
        }
        Ok(())
    }
}

impl NvMemory for Eeprom {
    /// Byte writes go straight to the cells; wait for the last one to finish.
    fn commit(&mut self) -> Result<(), EepromError> {
        Self::wait_ready();
        Ok(())
    }
}
