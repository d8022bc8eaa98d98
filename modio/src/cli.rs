//! Command-line front end.
//!
//! Parsing is done with clap, but the positional arguments of each command
//! are checked by hand so every kind of mistake maps to its own exit code
//! (see [`exit_code`]). Numbers are validated before the board is opened, so
//! a typo never reaches the bus.

use std::ffi::OsString;
use std::io::Write;

use clap::{error::ErrorKind, ArgAction, CommandFactory, Parser, Subcommand};
use strum::EnumString;

use crate::board::{self, Board};
use crate::bus::Bus;
use crate::config::{self, BoardConfig, DEFAULT_BUS};
use crate::error::Result;
use crate::tracing::prelude::*;

/// Process exit codes.
pub mod exit_code {
    pub const OK: u8 = 0;
    pub const MISSING_COMMAND: u8 = 1;
    pub const UNKNOWN_COMMAND: u8 = 2;
    /// The bus could not be opened or the board did not answer.
    pub const BOARD_ERROR: u8 = 3;

    pub const RELAY_ARGS: u8 = 10;
    pub const RELAY_STATE: u8 = 11;
    pub const RELAY_NUMBER: u8 = 12;

    pub const AIN_ARGS: u8 = 20;
    pub const AIN_NUMBER: u8 = 21;

    pub const DIN_ARGS: u8 = 30;
    pub const DIN_NUMBER: u8 = 31;

    pub const ADDRESS_ARGS: u8 = 40;
    pub const ADDRESS_VALUE: u8 = 41;
}

/// Control an Olimex MOD-IO board over I2C
#[derive(Parser, Debug)]
#[command(name = "modio", version, long_about = None)]
pub struct Cli {
    /// I2C bus number, as listed by `i2cdetect -l`
    #[arg(long, env = "MODIO_BUS", default_value_t = DEFAULT_BUS)]
    pub bus: u8,

    /// Board address, decimal or 0x-prefixed hex
    #[arg(
        long,
        env = "MODIO_ADDRESS",
        default_value = "0x58",
        value_parser = parse_address_arg
    )]
    pub address: u8,

    /// Log bus traffic instead of talking to a board
    #[arg(long)]
    pub fake: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Switch a relay: relay on|off NUMBER
    Relay {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print an analog input (0-1023): read-ain NUMBER
    ReadAin {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print a digital input (1 or 0): read-din NUMBER
    ReadDin {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Move the board to a new address: change-address ADDRESS
    ChangeAddress {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the state of the board as JSON
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum RelayState {
    On,
    Off,
}

fn parse_address_arg(text: &str) -> std::result::Result<u8, String> {
    config::parse_address(text).map_err(|e| e.to_string())
}

/// Parse the command line.
///
/// On `Err` the process should exit with the contained code; help and
/// version requests exit with [`exit_code::OK`].
pub fn parse<I, T>(args: I, out: &mut dyn Write, err: &mut dyn Write) -> std::result::Result<Cli, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = write!(out, "{}", e.render());
            Err(exit_code::OK)
        }
        Err(e) => {
            let _ = write!(err, "{}", e.render());
            Err(exit_code::UNKNOWN_COMMAND)
        }
    }
}

/// Transport factory for real hardware.
#[cfg(target_os = "linux")]
pub fn open_hardware(bus: u8, address: u8) -> Result<crate::bus::LinuxI2c> {
    crate::bus::LinuxI2c::open(bus, address)
}

/// Transport factory for real hardware.
#[cfg(not(target_os = "linux"))]
pub fn open_hardware(bus: u8, _address: u8) -> Result<crate::bus::FakeBus> {
    Err(crate::Error::TransportNotConfigured {
        bus,
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "i2c-dev is only available on Linux",
        ),
    })
}

/// Run the parsed command against a board opened through `factory`.
pub fn execute<B, F>(cli: &Cli, out: &mut dyn Write, err: &mut dyn Write, factory: F) -> u8
where
    B: Bus,
    F: FnOnce(u8, u8) -> Result<B>,
{
    let config = BoardConfig::default()
        .with_bus(cli.bus)
        .with_address(cli.address);

    let result = match &cli.command {
        None => Ok(usage(err, "Need to specify a command.", exit_code::MISSING_COMMAND)),
        Some(Command::Relay { args }) => relay(&config, args, err, factory),
        Some(Command::ReadAin { args }) => read_ain(&config, args, out, err, factory),
        Some(Command::ReadDin { args }) => read_din(&config, args, out, err, factory),
        Some(Command::ChangeAddress { args }) => change_address(&config, args, out, err, factory),
        Some(Command::Status) => status(&config, out, factory),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(bus = config.bus, "{}", e);
            let _ = writeln!(err, "Error: {}", e);
            exit_code::BOARD_ERROR
        }
    }
}

fn usage(err: &mut dyn Write, message: &str, code: u8) -> u8 {
    let _ = writeln!(err, "{}\n\n{}", message, Cli::command().render_help());
    code
}

// A channel number that `validate` accepts, or None.
fn parse_channel(text: &str, validate: fn(u8) -> Result<u8>) -> Option<u8> {
    text.trim()
        .parse::<u8>()
        .ok()
        .filter(|&number| validate(number).is_ok())
}

fn relay<B, F>(config: &BoardConfig, args: &[String], err: &mut dyn Write, factory: F) -> anyhow::Result<u8>
where
    B: Bus,
    F: FnOnce(u8, u8) -> Result<B>,
{
    let [state, number] = args else {
        return Ok(usage(
            err,
            "Wrong number of arguments: ... relay on|off NUMBER.",
            exit_code::RELAY_ARGS,
        ));
    };
    let Ok(state) = state.parse::<RelayState>() else {
        return Ok(usage(
            err,
            &format!("Can't parse '{}': ... relay on|off NUMBER.", state),
            exit_code::RELAY_STATE,
        ));
    };
    let Some(number) = parse_channel(number, board::relay_bit) else {
        return Ok(usage(
            err,
            &format!("Invalid relay '{}': ... relay on|off NUMBER.", number),
            exit_code::RELAY_NUMBER,
        ));
    };

    let board = Board::open(config, factory)?;
    let relay = board.relay(number)?;
    match state {
        RelayState::On => relay.close()?,
        RelayState::Off => relay.open()?,
    }
    info!(relay = number, ?state, "Relay switched");
    Ok(exit_code::OK)
}

fn read_ain<B, F>(
    config: &BoardConfig,
    args: &[String],
    out: &mut dyn Write,
    err: &mut dyn Write,
    factory: F,
) -> anyhow::Result<u8>
where
    B: Bus,
    F: FnOnce(u8, u8) -> Result<B>,
{
    let [number] = args else {
        return Ok(usage(
            err,
            "Wrong number of arguments: ... read-ain NUMBER.",
            exit_code::AIN_ARGS,
        ));
    };
    let Some(channel) = parse_channel(number, board::analog_in_register) else {
        return Ok(usage(
            err,
            &format!("Invalid ain '{}': ... read-ain NUMBER.", number),
            exit_code::AIN_NUMBER,
        ));
    };

    let board = Board::open(config, factory)?;
    writeln!(out, "{}", board.read_analog_in(channel)?)?;
    Ok(exit_code::OK)
}

fn read_din<B, F>(
    config: &BoardConfig,
    args: &[String],
    out: &mut dyn Write,
    err: &mut dyn Write,
    factory: F,
) -> anyhow::Result<u8>
where
    B: Bus,
    F: FnOnce(u8, u8) -> Result<B>,
{
    let [number] = args else {
        return Ok(usage(
            err,
            "Wrong number of arguments: ... read-din NUMBER.",
            exit_code::DIN_ARGS,
        ));
    };
    let Some(channel) = parse_channel(number, board::digital_in_bit) else {
        return Ok(usage(
            err,
            &format!("Invalid din '{}': ... read-din NUMBER.", number),
            exit_code::DIN_NUMBER,
        ));
    };

    let board = Board::open(config, factory)?;
    let high = board.digital_in(channel)?.read()?;
    writeln!(out, "{}", u8::from(high))?;
    Ok(exit_code::OK)
}

fn change_address<B, F>(
    config: &BoardConfig,
    args: &[String],
    out: &mut dyn Write,
    err: &mut dyn Write,
    factory: F,
) -> anyhow::Result<u8>
where
    B: Bus,
    F: FnOnce(u8, u8) -> Result<B>,
{
    let [text] = args else {
        return Ok(usage(
            err,
            "Wrong number of arguments: ... change-address ADDRESS.",
            exit_code::ADDRESS_ARGS,
        ));
    };
    let new_address = match config::parse_address(text) {
        Ok(address) => address,
        Err(e) => {
            return Ok(usage(
                err,
                &format!("{}: ... change-address ADDRESS.", e),
                exit_code::ADDRESS_VALUE,
            ))
        }
    };

    let board = Board::open(config, factory)?;
    board.change_address(new_address)?;
    writeln!(out, "0x{:02x}", board.address())?;
    Ok(exit_code::OK)
}

fn status<B, F>(config: &BoardConfig, out: &mut dyn Write, factory: F) -> anyhow::Result<u8>
where
    B: Bus,
    F: FnOnce(u8, u8) -> Result<B>,
{
    let board = Board::open(config, factory)?;
    let status = board.status()?;
    writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
    Ok(exit_code::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::registers;
    use crate::bus::{FakeBus, WriteRecord};
    use test_case::test_case;

    struct Run {
        code: u8,
        out: String,
        err: String,
    }

    fn run(args: &[&str], fake: &FakeBus) -> Run {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let argv = std::iter::once("modio").chain(args.iter().copied());
        let code = match parse(argv, &mut out, &mut err) {
            Ok(cli) => {
                let shared = fake.clone();
                execute(&cli, &mut out, &mut err, move |_, _| Ok(shared))
            }
            Err(code) => code,
        };
        Run {
            code,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    fn fake() -> FakeBus {
        FakeBus::new(1, 0x58)
    }

    #[test]
    fn test_missing_command() {
        let fake = fake();
        let run = run(&[], &fake);
        assert_eq!(run.code, exit_code::MISSING_COMMAND);
        assert!(run.err.starts_with("Need to specify a command."));
        assert!(fake.writes().is_empty());
    }

    #[test]
    fn test_unknown_command() {
        let fake = fake();
        assert_eq!(run(&["explode"], &fake).code, exit_code::UNKNOWN_COMMAND);
        assert!(fake.writes().is_empty());
    }

    #[test]
    fn test_help() {
        let run = run(&["--help"], &fake());
        assert_eq!(run.code, exit_code::OK);
        assert!(run.out.contains("read-ain"));
    }

    #[test_case(&["relay", "on", "1"], 0b0001)]
    #[test_case(&["relay", "on", "4"], 0b1000)]
    #[test_case(&["relay", "off", "2"], 0b0000)]
    fn test_relay(args: &[&str], mask: u8) {
        let fake = fake();
        assert_eq!(run(args, &fake).code, exit_code::OK);
        assert_eq!(
            fake.writes(),
            vec![
                WriteRecord { address: 0x58, register: registers::RELAY_WRITE, value: 0 },
                WriteRecord { address: 0x58, register: registers::RELAY_WRITE, value: mask },
            ]
        );
    }

    #[test_case(&["relay"], exit_code::RELAY_ARGS)]
    #[test_case(&["relay", "on"], exit_code::RELAY_ARGS)]
    #[test_case(&["relay", "on", "1", "2"], exit_code::RELAY_ARGS)]
    #[test_case(&["relay", "maybe", "1"], exit_code::RELAY_STATE)]
    #[test_case(&["relay", "ON", "1"], exit_code::RELAY_STATE)]
    #[test_case(&["relay", "on", "0"], exit_code::RELAY_NUMBER)]
    #[test_case(&["relay", "on", "5"], exit_code::RELAY_NUMBER)]
    #[test_case(&["relay", "off", "one"], exit_code::RELAY_NUMBER)]
    #[test_case(&["relay", "off", "300"], exit_code::RELAY_NUMBER)]
    #[test_case(&["relay", "on", "-1"], exit_code::RELAY_NUMBER)]
    #[test_case(&["relay", "on", "1", "--fake"], exit_code::RELAY_ARGS)]
    #[test_case(&["relay", "on", "1", "-v"], exit_code::RELAY_ARGS)]
    fn test_relay_usage_errors(args: &[&str], code: u8) {
        let fake = fake();
        assert_eq!(run(args, &fake).code, code);
        // The board is never opened.
        assert!(fake.writes().is_empty());
    }

    #[test]
    fn test_read_ain() {
        let fake = fake();
        fake.set_response(0x31, &[0x34, 0x01]);
        let run = run(&["read-ain", "2"], &fake);
        assert_eq!(run.code, exit_code::OK);
        assert_eq!(run.out, "308\n");
    }

    #[test_case(&["read-ain"], exit_code::AIN_ARGS)]
    #[test_case(&["read-ain", "1", "2"], exit_code::AIN_ARGS)]
    #[test_case(&["read-ain", "0"], exit_code::AIN_NUMBER)]
    #[test_case(&["read-ain", "9"], exit_code::AIN_NUMBER)]
    #[test_case(&["read-ain", "x"], exit_code::AIN_NUMBER)]
    #[test_case(&["read-ain", "-1"], exit_code::AIN_NUMBER)]
    fn test_read_ain_usage_errors(args: &[&str], code: u8) {
        let fake = fake();
        assert_eq!(run(args, &fake).code, code);
        assert!(fake.writes().is_empty());
    }

    #[test]
    fn test_read_din() {
        let fake = fake();
        fake.set_response(registers::DIGITAL_IN, &[0b0010]);
        assert_eq!(run(&["read-din", "2"], &fake).out, "1\n");
        assert_eq!(run(&["read-din", "1"], &fake).out, "0\n");
    }

    #[test_case(&["read-din"], exit_code::DIN_ARGS)]
    #[test_case(&["read-din", "5"], exit_code::DIN_NUMBER)]
    #[test_case(&["read-din", "-1"], exit_code::DIN_NUMBER)]
    fn test_read_din_usage_errors(args: &[&str], code: u8) {
        let fake = fake();
        assert_eq!(run(args, &fake).code, code);
        assert!(fake.reads().is_empty());
    }

    #[test]
    fn test_change_address() {
        let fake = fake();
        let run = run(&["change-address", "0x22"], &fake);
        assert_eq!(run.code, exit_code::OK);
        assert_eq!(run.out, "0x22\n");
        assert_eq!(
            fake.writes().last(),
            Some(&WriteRecord { address: 0x58, register: registers::CHANGE_ADDRESS, value: 0x22 })
        );
    }

    #[test_case(&["change-address"], exit_code::ADDRESS_ARGS)]
    #[test_case(&["change-address", "0x100"], exit_code::ADDRESS_VALUE)]
    #[test_case(&["change-address", "here"], exit_code::ADDRESS_VALUE)]
    fn test_change_address_usage_errors(args: &[&str], code: u8) {
        let fake = fake();
        assert_eq!(run(args, &fake).code, code);
        assert!(fake.writes().is_empty());
    }

    #[test]
    fn test_status_prints_json() {
        let fake = fake();
        fake.set_response(registers::DIGITAL_IN, &[0b0001]);
        let run = run(&["status"], &fake);
        assert_eq!(run.code, exit_code::OK);

        let status: serde_json::Value = serde_json::from_str(&run.out).unwrap();
        assert_eq!(status["address"], 0x58);
        assert_eq!(status["relays"], 0);
        assert_eq!(status["digital_inputs"][0], true);
    }

    #[test]
    fn test_unreachable_board() {
        let fake = fake();
        fake.set_unreachable(true);
        let run = run(&["relay", "on", "1"], &fake);
        assert_eq!(run.code, exit_code::BOARD_ERROR);
        assert!(run.err.contains("0x58"));
    }

    #[test]
    fn test_leading_options_reach_factory() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let cli = parse(
            ["modio", "--bus", "0", "--address", "0x22", "relay", "on", "3"],
            &mut out,
            &mut err,
        )
        .unwrap();

        let code = execute(&cli, &mut out, &mut err, |bus, address| {
            assert_eq!((bus, address), (0, 0x22));
            FakeBus::open(bus, address)
        });
        assert_eq!(code, exit_code::OK);
    }

    #[test]
    fn test_options_precede_command() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let cli = parse(["modio", "--fake", "-vv", "status"], &mut out, &mut err).unwrap();
        assert!(cli.fake);
        assert_eq!(cli.verbose, 2);

        assert_eq!(
            parse(["modio", "status", "--fake"], &mut out, &mut err).unwrap_err(),
            exit_code::UNKNOWN_COMMAND
        );

        let help = run(&["relay", "--help"], &fake());
        assert_eq!(help.code, exit_code::OK);
        assert!(!help.out.contains("--fake"));
    }

    #[test]
    fn test_bad_address_option() {
        let fake = fake();
        assert_eq!(
            run(&["--address", "0x1ff", "status"], &fake).code,
            exit_code::UNKNOWN_COMMAND
        );
    }
}
