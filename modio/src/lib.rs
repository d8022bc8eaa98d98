//! Driver for the Olimex MOD-IO board: four relays, four digital inputs and
//! four analog inputs behind a single I2C address.
//!
//! ```
//! use modio::{board::Board, bus::FakeBus, config::BoardConfig};
//!
//! // On hardware, pass `modio::bus::LinuxI2c::open` instead.
//! let board = Board::open(&BoardConfig::default(), FakeBus::open)?;
//! let relay = board.relay(1)?;
//! relay.close()?;
//! assert!(relay.is_closed()?);
//! # Ok::<(), modio::Error>(())
//! ```

pub mod board;
pub mod bus;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod tracing;

pub use error::{Error, Result};
