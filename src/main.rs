//! mpic - MP4x command-line utility

use anyhow::{bail, Context};
use clap::Parser;
use mpic::device::{list_devices, Mp4x};
use mpic::frame::{expects_response, DEST_MP4X};
use mpic::hexdump::hexdump;
use mpic::system;

/// MP4x command-line utility
#[derive(Parser, Debug)]
#[command(name = "mpic")]
#[command(version = "0.1.0")]
#[command(about = "Command-protocol client for MP4x USB programmable devices")]
#[command(long_about = "Talks to MP4x devices over their EP1 command channel.

Example:
  mpic --info
  mpic --cmd 0x93
  mpic -x 001:004 --cmd 0x12 --payload 01ff")]
struct Args {
    /// List all connected MP4x devices
    #[arg(short = 'l', long = "list-devices")]
    list_devices: bool,

    /// Use MP4x on USB bus:device (e.g., 001:003)
    #[arg(short = 'x', long = "device")]
    device: Option<String>,

    /// Print the negotiated device configuration
    #[arg(short = 'i', long = "info")]
    info: bool,

    /// Activate the device
    #[arg(short = 'a', long = "activate")]
    activate: bool,

    /// Send a raw command code (e.g., 0x93) and dump the response
    #[arg(short = 'c', long = "cmd")]
    cmd: Option<String>,

    /// Payload for --cmd as hex bytes (e.g., 01ff3c)
    #[arg(short = 'p', long = "payload")]
    payload: Option<String>,

    /// Destination byte for --cmd
    #[arg(short = 'd', long = "dest", default_value_t = DEST_MP4X)]
    dest: u8,

    /// More logging (repeat for trace output)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_hex(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn parse_hex_bytes(s: &str) -> anyhow::Result<Vec<u8>> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let s = s.strip_prefix("0x").unwrap_or(&s);
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("Hex payload '{}' contains non-hex characters", s);
    }
    if s.len() % 2 != 0 {
        bail!("Hex payload must have an even number of digits");
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair).context("Invalid hex byte")?;
            u8::from_str_radix(digits, 16)
                .with_context(|| format!("Invalid hex byte '{}'", digits))
        })
        .collect()
}

fn parse_device(s: &str) -> Option<(u8, u8)> {
    let (bus, dev) = s.split_once(':')?;
    Some((bus.parse().ok()?, dev.parse().ok()?))
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.list_devices {
        let devices = list_devices().context("Error listing devices")?;
        if devices.is_empty() {
            println!("No MP4x devices found.");
        }
        for (bus, dev) in devices {
            println!(" Bus {:03} Device {:03}: MP4x", bus, dev);
        }
        return Ok(());
    }

    let mut mp4x = match &args.device {
        Some(device) => {
            let (bus, dev) = parse_device(device)
                .with_context(|| format!("Can't parse device '{}', expected BUS:DEV", device))?;
            Mp4x::open_at(bus, dev)
        }
        None => Mp4x::open(),
    }
    .context("Error opening MP4x")?;

    if args.info {
        println!("{}", mp4x.config());
    }

    if args.activate {
        let version = system::activate(&mut mp4x).context("Activation failed")?;
        println!("Activated, firmware {}", version);
    }

    if let Some(cmd) = &args.cmd {
        let code = parse_hex(cmd)
            .and_then(|c| u8::try_from(c).ok())
            .with_context(|| format!("Invalid command code '{}'", cmd))?;
        let payload = match &args.payload {
            Some(p) => parse_hex_bytes(p)?,
            None => Vec::new(),
        };
        let resp = mp4x
            .command(args.dest, code, &payload)
            .with_context(|| format!("Command 0x{:02x} failed", code))?;
        if expects_response(code) {
            println!("Received {} bytes", resp.count);
            print!("{}", hexdump(&resp.data));
        } else {
            println!("Command 0x{:02x} sent", code);
        }
    }

    mp4x.close();
    Ok(())
}

fn main() {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
