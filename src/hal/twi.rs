//! Polled TWI (I2C) master

use avr_device::atmega128a::TWI;
use core::marker::PhantomData;
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::config::CPU_FREQ_HZ;

const TWINT: u8 = 1 << 7;
const TWEA: u8 = 1 << 6;
const TWSTA: u8 = 1 << 5;
const TWSTO: u8 = 1 << 4;
const TWEN: u8 = 1 << 2;

const STATUS_MASK: u8 = 0xF8;

/// TWI status codes
#[derive(Clone, Copy, PartialEq)]
#[repr(u8)]
enum TwiStatus {
    StartTransmitted = 0x08,
    RepStartTransmitted = 0x10,
    AddrWriteAck = 0x18,
    DataWriteAck = 0x28,
    AddrReadAck = 0x40,
    DataReadAck = 0x50,
    DataReadNack = 0x58,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// Unexpected status after START
    Start(u8),
    /// Address not acknowledged
    AddressNack(u8),
    /// Data byte not acknowledged
    DataNack(u8),
    /// Receive failed
    Read(u8),
}

#[derive(Clone, Copy)]
pub enum TwiSpeed {
    Standard100k,
    Fast400k,
}

impl TwiSpeed {
    const fn hz(self) -> u32 {
        match self {
            TwiSpeed::Standard100k => 100_000,
            TwiSpeed::Fast400k => 400_000,
        }
    }
}

pub struct Twi {
    _twi: PhantomData<TWI>,
}

impl Twi {
    pub fn new(speed: TwiSpeed) -> Self {
        // prescaler 1: SCL = F_CPU / (16 + 2 * TWBR)
        let twbr = (CPU_FREQ_HZ / speed.hz() - 16) / 2;
        unsafe {
            let p = TWI::ptr();
            (*p).twsr.write(|w| w.bits(0));
            (*p).twbr.write(|w| w.bits(twbr as u8));
            (*p).twcr.write(|w| w.bits(TWEN));
        }
        Self { _twi: PhantomData }
    }

    /// Start a bus action and wait for TWINT; returns the masked status
    fn command(&mut self, bits: u8) -> u8 {
        unsafe {
            let p = TWI::ptr();
            (*p).twcr.write(|w| w.bits(TWINT | TWEN | bits));
            while (*p).twcr.read().bits() & TWINT == 0 {}
            (*p).twsr.read().bits() & STATUS_MASK
        }
    }

    fn load(&mut self, byte: u8) {
        unsafe { (*TWI::ptr()).twdr.write(|w| w.bits(byte)) }
    }

    fn start(&mut self) -> Result<(), TwiError> {
        let status = self.command(TWSTA);
        if status == TwiStatus::StartTransmitted as u8
            || status == TwiStatus::RepStartTransmitted as u8
        {
            Ok(())
        } else {
            Err(TwiError::Start(status))
        }
    }

    fn stop(&mut self) {
        unsafe {
            let p = TWI::ptr();
            (*p).twcr.write(|w| w.bits(TWINT | TWEN | TWSTO));
            while (*p).twcr.read().bits() & TWSTO != 0 {}
        }
    }

    fn address(&mut self, addr: u8, read: bool) -> Result<(), TwiError> {
        self.load((addr << 1) | read as u8);
        let status = self.command(0);
        let expected = if read {
            TwiStatus::AddrReadAck
        } else {
            TwiStatus::AddrWriteAck
        };
        if status == expected as u8 {
            Ok(())
        } else {
            Err(TwiError::AddressNack(status))
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TwiError> {
        self.load(byte);
        let status = self.command(0);
        if status == TwiStatus::DataWriteAck as u8 {
            Ok(())
        } else {
            Err(TwiError::DataNack(status))
        }
    }

    fn read_byte(&mut self, ack: bool) -> Result<u8, TwiError> {
        let status = self.command(if ack { TWEA } else { 0 });
        let expected = if ack {
            TwiStatus::DataReadAck
        } else {
            TwiStatus::DataReadNack
        };
        if status == expected as u8 {
            Ok(unsafe { (*TWI::ptr()).twdr.read().bits() })
        } else {
            Err(TwiError::Read(status))
        }
    }

    fn transmit(&mut self, addr: u8, bytes: &[u8]) -> Result<(), TwiError> {
        self.start()?;
        self.address(addr, false)?;
        bytes.iter().try_for_each(|b| self.write_byte(*b))
    }

    fn receive(&mut self, addr: u8, buffer: &mut [u8]) -> Result<(), TwiError> {
        self.start()?;
        self.address(addr, true)?;
        let last = buffer.len().saturating_sub(1);
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = self.read_byte(i < last)?;
        }
        Ok(())
    }
}

impl Write for Twi {
    type Error = TwiError;

    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), TwiError> {
        let result = self.transmit(addr, bytes);
        self.stop();
        result
    }
}

impl WriteRead for Twi {
    type Error = TwiError;

    fn write_read(&mut self, addr: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), TwiError> {
        let result = self
            .transmit(addr, bytes)
            .and_then(|_| self.receive(addr, buffer));
        self.stop();
        result
    }
}
