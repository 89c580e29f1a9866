//! jtag-gpio - drive GPIO pins behind a JTAG TAP from the command line
//!
//! Runs a single command given on the command line, or reads commands from stdin one per line.
//! Besides the driver's own commands (`settings`, `set_pin`, `get_pin`) the prompt understands
//! `state`, `poll`, `halt`, `reset`, `examine`, `help` and `quit`.

use std::io::{self, BufRead, Write};

use clap::Parser;
use jtag_gpio::cable;
use jtag_gpio::options::{ApplyPolicy, Options};
use jtag_gpio::sim::SimTap;
use jtag_gpio::target::{JtagGpio, Target};
use jtag_gpio::transport::{ScanTransport, TapTransport};

type Gpio = JtagGpio<Box<dyn ScanTransport>>;

/// Parse a string as a hex or decimal u8
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid number: {}", e))
    }
}

fn cable_help() -> String {
    format!(
        "Cable to use [available: {}, sim]",
        cable::CABLE_NAMES.join(", ")
    )
}

#[derive(Parser)]
#[command(name = "jtag-gpio")]
#[command(author, version, about = "GPIO pins behind a JTAG boundary-scan TAP", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, default_value = "jtagkey", help = cable_help())]
    cable: String,

    /// TCK frequency in hertz
    #[arg(long, default_value_t = 1_000_000)]
    clock: u32,

    /// Number of pins behind the TAP
    #[arg(long, default_value_t = 3)]
    pins: usize,

    /// CHAIN_SELECT instruction opcode
    #[arg(long, value_parser = parse_hex_u8, default_value = "0x3")]
    chain_select: u8,

    /// EXTEST instruction opcode
    #[arg(long, value_parser = parse_hex_u8, default_value = "0x0")]
    extest: u8,

    /// Restore cached pin state when a command fails to reach the device
    #[arg(long)]
    rollback: bool,

    /// Read the pin directions from the device before running commands
    #[arg(long)]
    examine: bool,

    /// Command and arguments, e.g. `set_pin 0 1`.  Read from stdin when omitted.
    command: Vec<String>,
}

fn open_transport(cli: &Cli) -> Result<Box<dyn ScanTransport>, Box<dyn std::error::Error>> {
    if cli.cable == "sim" {
        log::info!("using simulated TAP with {} looped-back pins", cli.pins);
        return Ok(Box::new(SimTap::new(cli.pins.min(31)).with_loopback(true)));
    }
    let cable = cable::new_from_string(&cli.cable, cli.clock)?;
    Ok(Box::new(TapTransport::new(cable)?))
}

/// Run one line of input.  Returns false when the user asked to quit.
fn dispatch(gpio: &mut Gpio, words: &[&str]) -> bool {
    let Some((name, args)) = words.split_first() else {
        return true;
    };
    let result = match *name {
        "quit" | "exit" => return false,
        "help" => {
            print!("{}", gpio.help());
            println!("state\n\tshow target state and pin patterns");
            Ok(None)
        }
        "state" => Ok(Some(gpio.report_state())),
        "poll" => gpio.poll().map(|_| None),
        "halt" => gpio.halt().map(|_| None),
        "reset" => gpio
            .assert_reset()
            .and_then(|_| gpio.deassert_reset())
            .map(|_| None),
        "examine" => gpio.examine().map(|_| Some(gpio.report_state())),
        _ => gpio.run_command(name, args),
    };
    match result {
        Ok(Some(text)) => println!("{}", text),
        Ok(None) => {}
        Err(e) => eprintln!("Error: {}", e),
    }
    true
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {}
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let options = Options::default()
        .pin_count(cli.pins)
        .chain_select_opcode(cli.chain_select)
        .extest_opcode(cli.extest)
        .apply_policy(if cli.rollback {
            ApplyPolicy::Rollback
        } else {
            ApplyPolicy::Optimistic
        });

    let tap = open_transport(&cli)?;
    let mut gpio = JtagGpio::new(tap, options)?;
    if cli.examine {
        gpio.examine()?;
    }

    if !cli.command.is_empty() {
        let words: Vec<&str> = cli.command.iter().map(String::as_str).collect();
        let result = match words.split_first() {
            Some((name, args)) => gpio.run_command(name, args)?,
            None => None,
        };
        if let Some(text) = result {
            println!("{}", text);
        }
        return Ok(());
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if !dispatch(&mut gpio, &words) {
            break;
        }
        gpio.poll()?;
    }
    Ok(())
}
