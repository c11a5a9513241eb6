//! Transmitter entry point.
//!
//! `flamingosend <remote> <channel> <command> [rolling]` switches a
//! Flamingo receiver unit on or off. Without a rolling code index all
//! four are sent in sequence, 1 s apart (receivers accept any of
//! them). Exit codes: 0 on success, 1 on setup failure, 2 on usage
//! errors.

use clap::Parser;
use log::error;

use rfsniffer::gpio::SysfsGpio;
use rfsniffer::rt;
use rfsniffer::transmit::{send_fa500, GpioPulseSink};

#[derive(Parser)]
#[command(
    name = "flamingosend",
    about = "Switch ELRO Flamingo units over 433MHz"
)]
struct Args {
    /// Remote unit: 1, 2, 3, ...
    remote: usize,

    /// Channel: A, B, C, D
    channel: char,

    /// Command: 0 = off, 1 = on
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    command: u8,

    /// Rolling code index 0..=3; omitted sends all four in sequence
    #[arg(value_parser = clap::value_parser!(u8).range(0..=3))]
    rolling: Option<u8>,

    /// GPIO pin wired to the transmitter data line
    #[arg(long, default_value_t = 0)]
    tx: u8,

    /// Suppress output
    #[arg(short = 'q')]
    quiet: bool,
}

fn run(args: Args) -> anyhow::Result<()> {
    // pulse timing needs realtime scheduling; ±10 µs decides bits
    rt::elevate_realtime()?;

    let gpio = SysfsGpio::output(args.tx)?;
    let mut sink = GpioPulseSink::new(gpio);

    send_fa500(
        &mut sink,
        args.remote,
        args.channel.to_ascii_uppercase(),
        args.command,
        args.rolling,
        args.quiet,
    )?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    env_logger::init();

    if let Err(err) = run(args) {
        error!("{err:#}");
        std::process::exit(1);
    }
}
