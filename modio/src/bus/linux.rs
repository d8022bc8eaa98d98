//! Linux i2c-dev transport.
//!
//! Thin adapter over [`i2cdev::linux::LinuxI2CDevice`]. Writes use SMBus
//! "write byte data", reads use "read I2C block data", the same transfers
//! `i2cset` and `i2cget` issue.

use std::fs::OpenOptions;
use std::io;

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};

use super::Bus;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Largest block the SMBus layer moves in one transfer.
const I2C_SMBUS_BLOCK_MAX: usize = 32;

/// Transport backed by a Linux i2c-dev character device.
pub struct LinuxI2c {
    device: LinuxI2CDevice,
    bus: u8,
    address: u8,
    /// Slave address the device handle currently has selected.
    selected: u8,
}

impl LinuxI2c {
    /// Open `/dev/i2c-{bus}` for the device at `address`.
    ///
    /// Fails with [`Error::TransportNotConfigured`] if the character device
    /// cannot be opened, and with [`Error::DeviceUnreachable`] if the adapter
    /// refuses the slave address. No transfer happens until the first read or
    /// write.
    pub fn open(bus: u8, address: u8) -> Result<Self> {
        let path = format!("/dev/i2c-{}", bus);

        // Checked separately so a missing adapter is not mistaken for a
        // missing device.
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| Error::TransportNotConfigured { bus, source })?;

        let device = LinuxI2CDevice::new(&path, address.into())
            .map_err(|e| unreachable(address, e))?;
        debug!(path = %path, address, "Opened I2C bus");

        Ok(Self {
            device,
            bus,
            address,
            selected: address,
        })
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    fn select(&mut self) -> Result<()> {
        if self.selected == self.address {
            return Ok(());
        }
        self.device
            .set_slave_address(self.address.into())
            .map_err(|e| unreachable(self.address, e))?;
        self.selected = self.address;
        Ok(())
    }
}

fn unreachable(address: u8, e: LinuxI2CError) -> Error {
    Error::DeviceUnreachable {
        address,
        source: io::Error::from(e),
    }
}

impl std::fmt::Debug for LinuxI2c {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxI2c")
            .field("bus", &self.bus)
            .field("address", &self.address)
            .finish()
    }
}

impl Bus for LinuxI2c {
    fn address(&self) -> u8 {
        self.address
    }

    fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    fn write(&mut self, register: u8, value: u8) -> Result<()> {
        trace!(
            "I2C write bus {} address 0x{:02x} register 0x{:02x} value 0x{:02x}",
            self.bus, self.address, register, value
        );
        self.select()?;
        self.device
            .smbus_write_byte_data(register, value)
            .map_err(|e| unreachable(self.address, e))
    }

    fn read_block(&mut self, register: u8, length: usize) -> Result<Vec<u8>> {
        if length > I2C_SMBUS_BLOCK_MAX {
            return Err(Error::InvalidArgument(format!(
                "block read of {} bytes exceeds the SMBus limit of {}",
                length, I2C_SMBUS_BLOCK_MAX
            )));
        }
        self.select()?;
        let mut block = self
            .device
            .smbus_read_i2c_block_data(register, length as u8)
            .map_err(|e| unreachable(self.address, e))?;
        block.truncate(length);
        trace!(
            "I2C read bus {} address 0x{:02x} register 0x{:02x}: {:02X?}",
            self.bus, self.address, register, block
        );
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bus_is_not_configured() {
        // No host exposes this many adapters.
        let result = LinuxI2c::open(250, 0x58);
        assert!(matches!(
            result,
            Err(Error::TransportNotConfigured { bus: 250, .. })
        ));
    }
}
