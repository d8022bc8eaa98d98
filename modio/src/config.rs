//! Configuration for a board session.
//!
//! The board is located by a bus number (`/dev/i2c-N`) and a device address.
//! Both have documented defaults; the command-line tool fills them from flags
//! with environment fallbacks (`MODIO_BUS`, `MODIO_ADDRESS`).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Factory default address of the board.
pub const DEFAULT_ADDRESS: u8 = 0x58;

/// Bus the board is usually wired to on a Raspberry Pi.
pub const DEFAULT_BUS: u8 = 1;

/// Where to find the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BoardConfig {
    /// Device address on the bus
    #[serde(default = "default_address")]
    pub address: u8,

    /// Bus number, use `i2cdetect -y N` to find it
    #[serde(default = "default_bus")]
    pub bus: u8,
}

fn default_address() -> u8 {
    DEFAULT_ADDRESS
}

fn default_bus() -> u8 {
    DEFAULT_BUS
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            bus: DEFAULT_BUS,
        }
    }
}

impl BoardConfig {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }
}

/// Parse a device address given as decimal (`88`) or hex (`0x58`).
pub fn parse_address(text: &str) -> Result<u8> {
    let text = text.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse::<u8>(),
    };
    parsed.map_err(|_| {
        Error::InvalidArgument(format!(
            "invalid address '{}': can be between 0 and 0xFF",
            text
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.address, 0x58);
        assert_eq!(config.bus, 1);
    }

    #[test]
    fn test_builder() {
        let config = BoardConfig::default().with_address(0x22).with_bus(0);
        assert_eq!(config, BoardConfig { address: 0x22, bus: 0 });
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: BoardConfig = serde_json::from_str(r#"{"bus": 0}"#).unwrap();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.bus, 0);
    }

    #[test_case("88", 0x58)]
    #[test_case("0x58", 0x58)]
    #[test_case("0XfF", 0xff)]
    #[test_case(" 0 ", 0)]
    #[test_case("255", 255)]
    fn test_parse_address(text: &str, expected: u8) {
        assert_eq!(parse_address(text).unwrap(), expected);
    }

    #[test_case("256")]
    #[test_case("-1")]
    #[test_case("0x100")]
    #[test_case("relay")]
    #[test_case("")]
    fn test_parse_address_rejects(text: &str) {
        assert!(matches!(parse_address(text), Err(Error::InvalidArgument(_))));
    }
}
