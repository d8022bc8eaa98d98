//! Single-relay and single-input handles.
//!
//! Thin wrappers bound to one channel of a [`Board`]. The channel number is
//! checked when the handle is created, so a handle that exists always refers
//! to a valid channel; afterwards every call forwards to the board.

use crate::board::{self, Board};
use crate::bus::Bus;
use crate::error::Result;

/// One relay of a board.
pub struct RelayHandle<'a, B: Bus> {
    board: &'a Board<B>,
    number: u8,
}

impl<'a, B: Bus> RelayHandle<'a, B> {
    /// Bind relay `number` (1 to 4) of `board`.
    pub fn new(board: &'a Board<B>, number: u8) -> Result<Self> {
        board::relay_bit(number)?;
        Ok(Self { board, number })
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    /// Whether the contact is closed, according to the board's cache.
    pub fn is_closed(&self) -> Result<bool> {
        self.board.is_relay_closed(self.number)
    }

    /// Whether the contact is closed, according to the board itself.
    pub fn read(&self) -> Result<bool> {
        self.board.read_relay(self.number)
    }

    /// Open the contact.
    pub fn open(&self) -> Result<()> {
        self.board.open_relay(self.number)
    }

    /// Close the contact.
    pub fn close(&self) -> Result<()> {
        self.board.close_relay(self.number)
    }
}

/// One digital input of a board.
pub struct DigitalInHandle<'a, B: Bus> {
    board: &'a Board<B>,
    number: u8,
}

impl<'a, B: Bus> DigitalInHandle<'a, B> {
    /// Bind digital input `number` (1 to 4) of `board`.
    pub fn new(board: &'a Board<B>, number: u8) -> Result<Self> {
        board::digital_in_bit(number)?;
        Ok(Self { board, number })
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    /// Current level of the input.
    pub fn read(&self) -> Result<bool> {
        self.board.read_digital_in(self.number)
    }
}

impl<B: Bus> Board<B> {
    /// Handle for relay `number`.
    pub fn relay(&self, number: u8) -> Result<RelayHandle<'_, B>> {
        RelayHandle::new(self, number)
    }

    /// Handle for digital input `number`.
    pub fn digital_in(&self, number: u8) -> Result<DigitalInHandle<'_, B>> {
        DigitalInHandle::new(self, number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::registers;
    use crate::bus::FakeBus;
    use crate::config::BoardConfig;
    use crate::error::Error;
    use test_case::test_case;

    fn open_fake() -> (Board<FakeBus>, FakeBus) {
        let fake = FakeBus::new(1, 0x58);
        let shared = fake.clone();
        let board = Board::open(&BoardConfig::default(), move |_, _| Ok(shared)).unwrap();
        fake.clear();
        (board, fake)
    }

    #[test_case(0)]
    #[test_case(5)]
    #[test_case(255)]
    fn test_single_relay_validation(number: u8) {
        let (board, fake) = open_fake();
        assert!(matches!(
            RelayHandle::new(&board, number),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(board.relay(number), Err(Error::InvalidArgument(_))));
        assert!(fake.writes().is_empty());
        assert!(fake.reads().is_empty());
    }

    #[test_case(0)]
    #[test_case(5)]
    fn test_single_digital_in_validation(number: u8) {
        let (board, fake) = open_fake();
        assert!(matches!(
            DigitalInHandle::new(&board, number),
            Err(Error::InvalidArgument(_))
        ));
        assert!(fake.reads().is_empty());
    }

    #[test]
    fn test_relay_forwards_to_board() {
        let (board, _fake) = open_fake();
        let relay = board.relay(3).unwrap();
        assert_eq!(relay.number(), 3);
        assert!(!relay.is_closed().unwrap());

        relay.close().unwrap();
        assert!(relay.is_closed().unwrap());
        assert_eq!(board.get_relays(), 0b0100);

        relay.open().unwrap();
        assert!(!relay.is_closed().unwrap());
        assert_eq!(board.get_relays(), 0);
    }

    #[test]
    fn test_relays_share_board_state() {
        let (board, _fake) = open_fake();
        let first = board.relay(1).unwrap();
        let fourth = board.relay(4).unwrap();
        first.close().unwrap();
        fourth.close().unwrap();
        assert_eq!(board.get_relays(), 0b1001);
        first.open().unwrap();
        assert!(fourth.is_closed().unwrap());
    }

    #[test]
    fn test_relay_read_uses_hardware() {
        let (board, fake) = open_fake();
        fake.set_response(registers::RELAY_READ, &[0b0010]);
        let relay = board.relay(2).unwrap();
        assert!(relay.read().unwrap());
        assert!(!relay.is_closed().unwrap());
    }

    #[test]
    fn test_digital_in_forwards_to_board() {
        let (board, fake) = open_fake();
        fake.set_response(registers::DIGITAL_IN, &[0b0100]);
        let input = board.digital_in(3).unwrap();
        assert_eq!(input.number(), 3);
        assert!(input.read().unwrap());
        assert!(!board.digital_in(1).unwrap().read().unwrap());
    }
}
