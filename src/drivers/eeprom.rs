//! Non-volatile byte memory
//!
//! Backends expose `embedded-storage` reads and writes plus an explicit
//! `commit`. Writes are only guaranteed durable once `commit` returns `Ok`.

use embedded_storage::{ReadStorage, Storage};

/// Byte-addressable memory with an explicit durability boundary
pub trait NvMemory: Storage {
    /// Make every write so far durable
    fn commit(&mut self) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromError {
    OutOfBounds,
    /// Injected failure, treated as power lost during commit
    PowerLoss,
}

/// RAM-backed EEPROM image with a write cache, like the flash-emulated EEPROM
/// found on parts without real EEPROM.
///
/// `write` lands in the cache; `commit` copies the cache into the durable image;
/// `power_cycle` throws the cache away. Commit failures can be injected to
/// exercise crash recovery.
pub struct MemoryEeprom<const N: usize> {
    cache: [u8; N],
    durable: [u8; N],
    commits_left: Option<usize>,
    commits: usize,
}

impl<const N: usize> MemoryEeprom<N> {
    /// Erased memory (all 0xFF)
    pub const fn new() -> Self {
        Self {
            cache: [0xFF; N],
            durable: [0xFF; N],
            commits_left: None,
            commits: 0,
        }
    }

    /// Let `n` more commits succeed, then fail every following one
    pub fn fail_commits_after(&mut self, n: usize) {
        self.commits_left = Some(n);
    }

    /// Stop injecting failures
    pub fn heal(&mut self) {
        self.commits_left = None;
    }

    /// Drop everything that was not committed
    pub fn power_cycle(&mut self) {
        self.cache = self.durable;
    }

    /// Number of successful commits so far
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Durable contents
    pub fn image(&self) -> &[u8; N] {
        &self.durable
    }

    /// Overwrite one byte in both the cache and the durable image
    pub fn poke(&mut self, offset: usize, byte: u8) {
        self.cache[offset] = byte;
        self.durable[offset] = byte;
    }

    fn range(offset: u32, len: usize) -> Result<core::ops::Range<usize>, EepromError> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(EepromError::OutOfBounds)?;
        if end > N {
            return Err(EepromError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl<const N: usize> Default for MemoryEeprom<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ReadStorage for MemoryEeprom<N> {
    type Error = EepromError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = Self::range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.cache[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Storage for MemoryEeprom<N> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = Self::range(offset, bytes.len())?;
        self.cache[range].copy_from_slice(bytes);
        Ok(())
    }
}

impl<const N: usize> NvMemory for MemoryEeprom<N> {
    fn commit(&mut self) -> Result<(), Self::Error> {
        match self.commits_left {
            Some(0) => return Err(EepromError::PowerLoss),
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        self.durable = self.cache;
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_erased() {
        let mut mem = MemoryEeprom::<8>::new();
        let mut buf = [0u8; 8];
        mem.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 8]);
        assert_eq!(mem.capacity(), 8);
    }

    #[test]
    fn uncommitted_writes_are_lost_on_power_cycle() {
        let mut mem = MemoryEeprom::<8>::new();
        mem.write(2, &[1, 2]).unwrap();

        let mut buf = [0u8; 2];
        mem.read(2, &mut buf).unwrap();
        assert_eq!(buf, [1, 2]);

        mem.power_cycle();
        mem.read(2, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);
    }

    #[test]
    fn committed_writes_survive() {
        let mut mem = MemoryEeprom::<8>::new();
        mem.write(0, &[7]).unwrap();
        mem.commit().unwrap();
        mem.power_cycle();
        assert_eq!(mem.image()[0], 7);
        assert_eq!(mem.commit_count(), 1);
    }

    #[test]
    fn injected_commit_failure() {
        let mut mem = MemoryEeprom::<4>::new();
        mem.fail_commits_after(1);
        mem.write(0, &[1]).unwrap();
        assert!(mem.commit().is_ok());
        mem.write(1, &[2]).unwrap();
        assert_eq!(mem.commit(), Err(EepromError::PowerLoss));
        mem.power_cycle();
        assert_eq!(mem.image(), &[1, 0xFF, 0xFF, 0xFF]);

        mem.heal();
        mem.write(1, &[2]).unwrap();
        assert!(mem.commit().is_ok());
    }

    #[test]
    fn out_of_bounds_access_fails() {
        let mut mem = MemoryEeprom::<4>::new();
        assert_eq!(mem.write(3, &[0, 0]), Err(EepromError::OutOfBounds));
        let mut buf = [0u8; 1];
        assert_eq!(mem.read(4, &mut buf), Err(EepromError::OutOfBounds));
    }
}
