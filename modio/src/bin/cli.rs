//! Command-line interface for the MOD-IO board.
//!
//! ```text
//! modio relay on 1
//! modio --bus 0 read-ain 3
//! modio --fake -vv status
//! ```

use std::io;
use std::process::ExitCode;

use modio::bus::FakeBus;
use modio::cli;
use modio::tracing;

fn main() -> ExitCode {
    let mut out = io::stdout();
    let mut err = io::stderr();

    let cli = match cli::parse(std::env::args_os(), &mut out, &mut err) {
        Ok(cli) => cli,
        Err(code) => return ExitCode::from(code),
    };
    tracing::init_journald_or_stdout(tracing::level_for_verbosity(cli.verbose));

    let code = if cli.fake {
        cli::execute(&cli, &mut out, &mut err, FakeBus::open)
    } else {
        cli::execute(&cli, &mut out, &mut err, cli::open_hardware)
    };
    ExitCode::from(code)
}
