//! In-memory transport for running without hardware.
//!
//! [`FakeBus`] performs no I/O. Every write is logged and journaled so tests
//! can assert on the exact bus traffic a board operation produced. Reads
//! succeed with zeros unless a response was scripted for the register, and
//! the whole transport can be made unreachable to exercise failure paths.
//!
//! Clones share their state: keep one clone in the test and hand another to
//! the board.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use super::Bus;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// One byte written through the fake transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub address: u8,
    pub register: u8,
    pub value: u8,
}

/// One block read through the fake transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecord {
    pub address: u8,
    pub register: u8,
    pub length: usize,
}

#[derive(Debug, Default)]
struct FakeState {
    address: u8,
    writes: Vec<WriteRecord>,
    reads: Vec<ReadRecord>,
    responses: HashMap<u8, Vec<u8>>,
    unreachable: bool,
}

/// Transport that records traffic instead of touching a bus.
#[derive(Debug, Clone)]
pub struct FakeBus {
    bus: u8,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBus {
    pub fn new(bus: u8, address: u8) -> Self {
        warn!(bus, address, "Using fake I2C bus instead of real one");
        Self {
            bus,
            state: Arc::new(Mutex::new(FakeState {
                address,
                ..Default::default()
            })),
        }
    }

    /// Factory matching [`Board::open`](crate::board::Board::open). Never
    /// fails.
    pub fn open(bus: u8, address: u8) -> Result<Self> {
        Ok(Self::new(bus, address))
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    /// All writes so far, oldest first.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    /// All block reads so far, oldest first.
    pub fn reads(&self) -> Vec<ReadRecord> {
        self.state.lock().reads.clone()
    }

    /// Forget the recorded traffic.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.reads.clear();
    }

    /// Script the bytes returned by reads of `register`.
    pub fn set_response(&self, register: u8, data: &[u8]) {
        self.state.lock().responses.insert(register, data.to_vec());
    }

    /// Make every subsequent transfer fail as if no device answered.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }
}

impl FakeState {
    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(Error::DeviceUnreachable {
                address: self.address,
                source: io::Error::new(io::ErrorKind::NotConnected, "fake device unplugged"),
            });
        }
        Ok(())
    }
}

impl Bus for FakeBus {
    fn address(&self) -> u8 {
        self.state.lock().address
    }

    fn set_address(&mut self, address: u8) {
        self.state.lock().address = address;
    }

    fn write(&mut self, register: u8, value: u8) -> Result<()> {
        let mut state = self.state.lock();
        state.check_reachable()?;
        debug!(
            "writing on bus {}, address 0x{:02x}, register 0x{:02x}, value 0x{:02x}",
            self.bus, state.address, register, value
        );
        let address = state.address;
        state.writes.push(WriteRecord {
            address,
            register,
            value,
        });
        Ok(())
    }

    fn read_block(&mut self, register: u8, length: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.check_reachable()?;
        let address = state.address;
        state.reads.push(ReadRecord {
            address,
            register,
            length,
        });

        let mut data = vec![0u8; length];
        if let Some(response) = state.responses.get(&register) {
            let n = response.len().min(length);
            data[..n].copy_from_slice(&response[..n]);
        }
        trace!(
            "reading on bus {}, address 0x{:02x}, register 0x{:02x}: {:02X?}",
            self.bus, address, register, data
        );
        Ok(data)
    }
}
