//! Receiver daemon entry point.
//!
//! Sniffs the 433 MHz band on the RX pin and prints decoded messages
//! until terminated. Exit codes: 0 after graceful termination, 1 when
//! hardware or thread setup fails, 2 on usage errors.

use clap::Parser;
use log::error;

use rfsniffer::clock;
use rfsniffer::config::{Config, EdgeSelect};
use rfsniffer::sniffer::RfSniffer;

#[derive(Parser)]
#[command(
    name = "rfsniffer",
    about = "Sniff and decode 433MHz OOK messages (Flamingo remotes, NEXUS sensors)"
)]
struct Args {
    /// Decoder delay in seconds
    #[arg(short = 'd', default_value_t = 1)]
    delay: u64,

    /// Process each single code (default: collect identical codes)
    #[arg(short = 'e')]
    each: bool,

    /// Print messages as JSON
    #[arg(short = 'j')]
    json: bool,

    /// Activate the pulse length counter
    #[arg(short = 'c')]
    counter: bool,

    /// Analyzer mode: learn an unknown signal
    #[arg(short = 'a')]
    analyzer: bool,

    /// Realtime mode: decode known sync pulses in the sampler
    #[arg(short = 'r')]
    realtime: bool,

    /// Analyzer: bits to sample
    #[arg(short = 'b', default_value_t = 32, value_parser = clap::value_parser!(u8).range(0..=64))]
    bits: u8,

    /// Analyzer: sync on pulse 0=LOW 1=HIGH 2=EDGE
    #[arg(short = 's', default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    sync_on: u8,

    /// Analyzer: sample on pulse 0=LOW 1=HIGH 2=EDGE
    #[arg(short = 'S', default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    sample_on: u8,

    /// Analyzer: sync pulse minimum length in microseconds
    #[arg(short = 'x', default_value_t = 1_800)]
    sync_min: u32,

    /// Analyzer: sync pulse maximum length in microseconds
    #[arg(short = 'y', default_value_t = 2_000)]
    sync_max: u32,

    /// Analyzer: 0/1 bit divider pulse length in microseconds
    #[arg(short = 'z', default_value_t = 1_500)]
    divider: u32,

    /// GPIO pin wired to the receiver data line
    #[arg(long, default_value_t = 2)]
    rx: u8,

    /// Noise gate in microseconds
    #[arg(short = 'n', long, default_value_t = 100)]
    noise: u16,

    /// Publish decoded sensor fields as files below this directory
    #[arg(long)]
    sysfslike: Option<String>,

    /// Drop frames whose transmitter id is not in the known list
    #[arg(short = 'T', long)]
    validate: bool,

    /// Dump decoder internals
    #[arg(short = 'v')]
    verbose: bool,

    /// Suppress decoded message output
    #[arg(short = 'q')]
    quiet: bool,
}

fn edge_select(value: u8) -> EdgeSelect {
    match value {
        1 => EdgeSelect::High,
        2 => EdgeSelect::Edge,
        _ => EdgeSelect::Low,
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let cfg = Config {
        rx_pin: args.rx,
        analyzer_mode: args.analyzer,
        realtime_mode: args.realtime,
        pulse_counter_active: args.counter,
        noise_threshold_us: args.noise,
        decoder_delay_ms: args.delay * 1_000,
        bits_to_sample: args.bits,
        collect_identical_codes: !args.each,
        sync_on: edge_select(args.sync_on),
        sample_on: edge_select(args.sample_on),
        sync_min_us: args.sync_min,
        sync_max_us: args.sync_max,
        bit_divider_us: args.divider,
        verbose: args.verbose,
        quiet: args.quiet,
        json_output: args.json,
        sysfs_root: args.sysfslike,
        validate_transmitter_ids: args.validate,
        ..Config::default()
    };

    let sniffer = RfSniffer::start(cfg)?;

    let cancel = sniffer.cancel_handle();
    ctrlc::set_handler(move || {
        cancel.store(true, std::sync::atomic::Ordering::Relaxed);
    })?;

    while !sniffer.cancelled() {
        clock::msleep(100);
    }
    sniffer.close()?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if args.verbose { "debug" } else { "info" },
    ))
    .init();

    if let Err(err) = run(args) {
        error!("{err:#}");
        std::process::exit(1);
    }
}
