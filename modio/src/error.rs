//! Common error types for modio.
//!
//! Every failure the driver can report falls into one of three kinds: the
//! host's I2C subsystem is unusable, the board did not answer, or the caller
//! passed a value outside its valid range.

use std::io;
use thiserror::Error;

/// Main error type for modio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The bus subsystem itself could not be opened (e.g. `i2c-dev` is not
    /// loaded). Fatal to board construction.
    #[error("I2C bus {bus} is not configured properly, is the i2c-dev module loaded? ({source})")]
    TransportNotConfigured {
        bus: u8,
        #[source]
        source: io::Error,
    },

    /// A transfer to the board failed although the bus is usable.
    #[error("Could not communicate with device at address 0x{address:02x}: {source}")]
    DeviceUnreachable {
        address: u8,
        #[source]
        source: io::Error,
    },

    /// A relay, channel, mask or address is outside its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
