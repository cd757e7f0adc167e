use thiserror::Error;

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
/// An error that can occur when reading from a block device.
pub enum BlockDeviceError {
    #[error("I/O error")]
    Io,
    #[error("Out of bounds")]
    OutOfBounds,
    #[error("Unsupported operation")]
    Unsupported,
    #[error("Unaligned access")]
    UnalignedAccess,
}

/// A trait for block devices.
///
/// These are physical devices (such as SD/MMC cards) that perform reads in
/// fixed-size sectors. The storage layer never writes, so the contract is read-only.
pub trait BlockDevice {
    /// Size of a sector in bytes.
    const BLOCK_SIZE: usize;

    /// Read whole sectors from the device into the given buffer.
    ///
    /// `lba` is the sector offset from the start of the device and the number of
    /// sectors to read is `dst.len() / Self::BLOCK_SIZE`.
    /// Either every requested sector is read or an error is returned.
    ///
    /// ## Errors
    ///
    /// This function returns an error if the read operation failed
    /// or if `dst.len()` isn't a multiple of `Self::BLOCK_SIZE`.
    fn read_sectors(&mut self, dst: &mut [u8], lba: u32) -> Result<(), BlockDeviceError>;

    /// Number of sectors a read of `len` bytes spans.
    ///
    /// ## Errors
    ///
    /// Returns `UnalignedAccess` if `len` isn't a multiple of `Self::BLOCK_SIZE`.
    fn sector_count(len: usize) -> Result<u32, BlockDeviceError>
    where
        Self: Sized,
    {
        if Self::BLOCK_SIZE == 0 || len % Self::BLOCK_SIZE != 0 {
            return Err(BlockDeviceError::UnalignedAccess);
        }
        u32::try_from(len / Self::BLOCK_SIZE).map_err(|_| BlockDeviceError::OutOfBounds)
    }
}

impl<T: BlockDevice> BlockDevice for &mut T {
    const BLOCK_SIZE: usize = T::BLOCK_SIZE;

    #[inline]
    fn read_sectors(&mut self, dst: &mut [u8], lba: u32) -> Result<(), BlockDeviceError> {
        (**self).read_sectors(dst, lba)
    }
}
