//! Olimex MOD-IO board controller.
//!
//! The board exposes four relays, four opto-isolated digital inputs and four
//! 10-bit analog inputs behind a fixed set of command registers. [`Board`]
//! encodes those commands, validates channel numbers, and keeps a cached copy
//! of the relay bitmask.
//!
//! Relays, digital inputs and analog inputs are all numbered 1 to 4, as
//! printed on the board.
//!
//! The cached relay bitmask always equals the last value successfully written
//! to the relay register: the bus write happens first, and the cache is only
//! updated once it succeeded. [`Board::get_relays`] returns the cache;
//! [`Board::read_relays`] asks the board, which matters when something other
//! than this process may switch relays.
//!
//! Every public operation runs under one internal lock covering both the
//! cache and the transport, so a `Board` shared between threads never loses
//! a relay update.

use bitflags::bitflags;
use parking_lot::Mutex;
use serde::Serialize;

use crate::bus::Bus;
use crate::config::BoardConfig;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Board command registers.
pub mod registers {
    /// Write the relay bitmask.
    pub const RELAY_WRITE: u8 = 0x10;
    /// Read the digital input bitmask.
    pub const DIGITAL_IN: u8 = 0x20;
    /// First analog input, the other three follow.
    pub const ANALOG_IN_BASE: u8 = 0x30;
    /// Read the relay bitmask back from the board.
    pub const RELAY_READ: u8 = 0x40;
    /// Move the board to a new bus address.
    pub const CHANGE_ADDRESS: u8 = 0xF0;
}

/// Value written to an analog input register to start a conversion.
const ANALOG_ARM: u8 = 0x01;

/// Largest valid relay bitmask.
pub const RELAY_MASK: u8 = 0x0F;

/// Analog inputs have 10 bits of resolution.
pub const ANALOG_MAX: u16 = 0x03FF;

/// Number of relays, digital inputs and analog inputs.
pub const CHANNELS: u8 = 4;

bitflags! {
    /// A set of channels, bit *i* standing for channel *i + 1*.
    ///
    /// Used both for relay bitmasks and for digital input snapshots.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Channels: u8 {
        const CH1 = 0x01;
        const CH2 = 0x02;
        const CH3 = 0x04;
        const CH4 = 0x08;
    }
}

impl Channels {
    /// The single channel numbered `number`, 1 to 4.
    pub fn channel(number: u8) -> Result<Self> {
        if !(1..=CHANNELS).contains(&number) {
            return Err(Error::InvalidArgument(format!(
                "invalid channel {}: must be between 1 and {}",
                number, CHANNELS
            )));
        }
        Ok(Self::from_bits_retain(1 << (number - 1)))
    }

    /// Whether channel `number` is in the set.
    pub fn is_set(self, number: u8) -> Result<bool> {
        Ok(self.contains(Self::channel(number)?))
    }

    /// Per-channel flags, channel 1 first.
    pub fn to_array(self) -> [bool; CHANNELS as usize] {
        [
            self.contains(Self::CH1),
            self.contains(Self::CH2),
            self.contains(Self::CH3),
            self.contains(Self::CH4),
        ]
    }
}

/// The bit controlling relay `relay` (1 to 4) in the relay bitmask.
///
/// Fails with [`Error::InvalidArgument`] for any other number, which makes it
/// the validation step for every operation taking a relay number.
pub fn relay_bit(relay: u8) -> Result<u8> {
    Channels::channel(relay)
        .map(|bit| bit.bits())
        .map_err(|_| invalid_relay(relay))
}

/// Validate a digital input number (1 to 4).
pub fn digital_in_bit(channel: u8) -> Result<u8> {
    Channels::channel(channel).map(|bit| bit.bits())
}

/// The register holding analog input `channel` (1 to 4).
pub fn analog_in_register(channel: u8) -> Result<u8> {
    if !(1..=CHANNELS).contains(&channel) {
        return Err(Error::InvalidArgument(format!(
            "invalid analog input {}: must be between 1 and {}",
            channel, CHANNELS
        )));
    }
    Ok(registers::ANALOG_IN_BASE + channel - 1)
}

fn invalid_relay(relay: u8) -> Error {
    Error::InvalidArgument(format!(
        "invalid relay {}: must be between 1 and {}",
        relay, CHANNELS
    ))
}

/// Everything the board reports, read in one go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardStatus {
    pub bus: u8,
    pub address: u8,
    /// Cached relay bitmask.
    pub relays: u8,
    /// Relay bitmask as read back from the board.
    pub relays_on_board: u8,
    pub digital_inputs: [bool; CHANNELS as usize],
    pub analog_inputs: [u16; CHANNELS as usize],
}

struct Inner<B> {
    bus: B,
    relays: u8,
}

impl<B: Bus> Inner<B> {
    fn set_relays(&mut self, mask: u8) -> Result<u8> {
        if mask > RELAY_MASK {
            return Err(Error::InvalidArgument(format!(
                "invalid relay value 0x{:02x}: can be between 0 and 0x{:X}",
                mask, RELAY_MASK
            )));
        }
        self.bus.write(registers::RELAY_WRITE, mask)?;
        debug!("Relays 0b{:04b} -> 0b{:04b}", self.relays, mask);
        self.relays = mask;
        Ok(mask)
    }

    fn read_relays(&mut self) -> Result<u8> {
        let data = self.bus.read_block(registers::RELAY_READ, 2)?;
        Ok(first_byte(&data) & RELAY_MASK)
    }

    fn read_digital_ins(&mut self) -> Result<Channels> {
        let data = self.bus.read_block(registers::DIGITAL_IN, 2)?;
        Ok(Channels::from_bits_truncate(first_byte(&data)))
    }

    fn read_analog_in(&mut self, register: u8) -> Result<u16> {
        self.bus.write(register, ANALOG_ARM)?;
        let data = self.bus.read_block(register, 2)?;
        let low = data.first().copied().unwrap_or(0) as u16;
        let high = data.get(1).copied().unwrap_or(0) as u16;
        let value = (low + (high << 8)) & ANALOG_MAX;
        trace!("Analog register 0x{:02x}: {:02X?} -> {}", register, data, value);
        Ok(value)
    }
}

// Short reads are padded with zeros.
fn first_byte(data: &[u8]) -> u8 {
    data.first().copied().unwrap_or(0)
}

/// Controller for one MOD-IO board.
pub struct Board<B> {
    bus_number: u8,
    inner: Mutex<Inner<B>>,
}

impl<B: Bus> Board<B> {
    /// Open the board described by `config`.
    ///
    /// `factory` builds the transport from the bus number and device address,
    /// e.g. [`LinuxI2c::open`](crate::bus::LinuxI2c::open) or
    /// [`FakeBus::open`](crate::bus::FakeBus::open). On success all relays are
    /// opened so that the board and the cache start out in a known state.
    pub fn open<F>(config: &BoardConfig, factory: F) -> Result<Self>
    where
        F: FnOnce(u8, u8) -> Result<B>,
    {
        let bus = factory(config.bus, config.address)?;
        let mut inner = Inner { bus, relays: 0 };
        inner.set_relays(0)?;
        info!(
            bus = config.bus,
            address = %format!("0x{:02x}", config.address),
            "Board ready, all relays open"
        );

        Ok(Self {
            bus_number: config.bus,
            inner: Mutex::new(inner),
        })
    }

    /// Bus number the board was opened on.
    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }

    /// Current device address.
    pub fn address(&self) -> u8 {
        self.inner.lock().bus.address()
    }

    /// Move the board to `new_address`.
    ///
    /// Subsequent operations target the new address. If the command cannot be
    /// delivered the board did not move and the address is left unchanged.
    pub fn change_address(&self, new_address: u8) -> Result<()> {
        let mut inner = self.inner.lock();
        let old_address = inner.bus.address();
        inner.bus.write(registers::CHANGE_ADDRESS, new_address)?;
        inner.bus.set_address(new_address);
        info!("Board moved from 0x{:02x} to 0x{:02x}", old_address, new_address);
        Ok(())
    }

    /// Write the relay bitmask and return it.
    ///
    /// Fails with [`Error::InvalidArgument`] for masks above `0xF`. On any
    /// failure the cached bitmask is left as it was.
    pub fn set_relays(&self, mask: u8) -> Result<u8> {
        self.inner.lock().set_relays(mask)
    }

    /// The cached relay bitmask. No bus access.
    ///
    /// Reflects the last successful write from this controller; it goes
    /// stale if the relays are switched by other means. Use
    /// [`Board::read_relays`] when that matters.
    pub fn get_relays(&self) -> u8 {
        self.inner.lock().relays
    }

    /// Read the relay bitmask back from the board, bypassing the cache.
    ///
    /// Needs a firmware exposing the relay read-back register. The cache is
    /// not modified.
    pub fn read_relays(&self) -> Result<u8> {
        self.inner.lock().read_relays()
    }

    /// Whether relay `relay` is closed according to the board itself.
    pub fn read_relay(&self, relay: u8) -> Result<bool> {
        let bit = relay_bit(relay)?;
        Ok(self.read_relays()? & bit != 0)
    }

    /// See [`relay_bit`].
    pub fn relay_bit(&self, relay: u8) -> Result<u8> {
        relay_bit(relay)
    }

    /// Whether relay `relay` is closed according to the cache.
    pub fn is_relay_closed(&self, relay: u8) -> Result<bool> {
        let bit = relay_bit(relay)?;
        Ok(self.get_relays() & bit != 0)
    }

    /// Close the contact of relay `relay`, leaving the others alone.
    pub fn close_relay(&self, relay: u8) -> Result<()> {
        let bit = relay_bit(relay)?;
        let mut inner = self.inner.lock();
        let mask = inner.relays | bit;
        inner.set_relays(mask)?;
        Ok(())
    }

    /// Open the contact of relay `relay`, leaving the others alone.
    pub fn open_relay(&self, relay: u8) -> Result<()> {
        let bit = relay_bit(relay)?;
        let mut inner = self.inner.lock();
        let mask = inner.relays & !bit & RELAY_MASK;
        inner.set_relays(mask)?;
        Ok(())
    }

    /// Read all four digital inputs.
    pub fn read_digital_ins(&self) -> Result<Channels> {
        self.inner.lock().read_digital_ins()
    }

    /// Read digital input `channel` (1 to 4). Never cached.
    pub fn read_digital_in(&self, channel: u8) -> Result<bool> {
        let bit = digital_in_bit(channel)?;
        Ok(self.read_digital_ins()?.bits() & bit != 0)
    }

    /// Read analog input `channel` (1 to 4), a value in `0..=1023`.
    pub fn read_analog_in(&self, channel: u8) -> Result<u16> {
        let register = analog_in_register(channel)?;
        self.inner.lock().read_analog_in(register)
    }

    /// Read everything the board reports.
    pub fn status(&self) -> Result<BoardStatus> {
        let mut inner = self.inner.lock();
        let relays_on_board = inner.read_relays()?;
        let digital_inputs = inner.read_digital_ins()?.to_array();
        let mut analog_inputs = [0u16; CHANNELS as usize];
        for (channel, value) in (1..=CHANNELS).zip(analog_inputs.iter_mut()) {
            *value = inner.read_analog_in(analog_in_register(channel)?)?;
        }

        Ok(BoardStatus {
            bus: self.bus_number,
            address: inner.bus.address(),
            relays: inner.relays,
            relays_on_board,
            digital_inputs,
            analog_inputs,
        })
    }
}
