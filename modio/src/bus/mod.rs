//! Bus transport abstraction.
//!
//! The board is driven entirely through two register-oriented transfers:
//! writing one byte to a register and reading a short block starting at a
//! register. [`Bus`] captures exactly that, so the board controller works the
//! same against the Linux i2c-dev interface ([`LinuxI2c`]) or against the
//! in-memory [`FakeBus`] used by tests and by `modio --fake`.
//!
//! Transports are created through a factory `FnOnce(bus, address)` handed to
//! [`Board::open`](crate::board::Board::open). A factory fails with
//! [`Error::TransportNotConfigured`](crate::Error::TransportNotConfigured)
//! when the bus subsystem cannot be opened; individual transfers fail with
//! [`Error::DeviceUnreachable`](crate::Error::DeviceUnreachable).

use crate::error::Result;

mod fake;
pub use fake::{FakeBus, ReadRecord, WriteRecord};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxI2c;

/// Register-level access to a single device on a bus.
pub trait Bus {
    /// Address of the device this transport currently targets.
    fn address(&self) -> u8;

    /// Retarget subsequent transfers to `address`.
    fn set_address(&mut self, address: u8);

    /// Send one byte to `register`.
    fn write(&mut self, register: u8, value: u8) -> Result<()>;

    /// Read `length` bytes starting at `register`.
    ///
    /// Implementations may return fewer bytes than requested if the device
    /// sent a short block.
    fn read_block(&mut self, register: u8, length: usize) -> Result<Vec<u8>>;
}
