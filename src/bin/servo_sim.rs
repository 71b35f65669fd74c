//! Runs the hand controller firmware on the host.
//!
//! Reads control lines from a serial port (or stdin) and prints the servo
//! angles the controller would command. Useful to check the host output
//! without hardware: `rusty_hand --simulate --port /dev/pts/3` on one end of
//! a pty pair, `servo_sim --port /dev/pts/4` on the other.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::io::{self, Read};
use std::time::Duration;

use rusty_hand::firmware::{Actuation, Controller, ServoBus};
use rusty_hand::protocol::BAUD_RATE;
use rusty_hand::types::Channel;

#[derive(Parser, Debug)]
#[command(author, version, about = "Emulated hand controller", long_about = None)]
struct Args {
    /// Serial port to listen on; stdin when omitted
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long, default_value_t = BAUD_RATE)]
    baud: u32,
}

/// Holds the last commanded angle per servo, like the real servos do.
#[derive(Default)]
struct ConsoleServos {
    angles: [Option<u8>; Channel::COUNT],
}

impl ServoBus for ConsoleServos {
    fn write_angle(&mut self, channel: Channel, angle: u8) {
        self.angles[channel.wire_index()] = Some(angle);
    }
}

impl ConsoleServos {
    fn render(&self) -> String {
        Channel::ALL
            .iter()
            .map(|c| match self.angles[c.wire_index()] {
                Some(a) => format!("{}={:>3}", c, a),
                None => format!("{}=  -", c),
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}

fn run<R: Read>(mut input: R, controller: &mut Controller<ConsoleServos>) -> Result<()> {
    let mut buf = [0u8; 64];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(e).context("Read failed"),
        };
        for &byte in &buf[..n] {
            match controller.poll_byte(byte) {
                Some(Actuation::Main) | Some(Actuation::MainAndRotation) => {
                    println!("{}", controller.bus().render());
                }
                Some(Actuation::None) | None => {}
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut controller = Controller::new(ConsoleServos::default());

    match &args.port {
        Some(port) => {
            let serial = serialport::new(port, args.baud)
                .timeout(Duration::from_millis(100))
                .open()
                .with_context(|| format!("Failed to open {}", port))?;
            println!("{}", format!("Listening on {} @ {} baud", port, args.baud).green());
            run(serial, &mut controller)
        }
        None => {
            println!("{}", "Listening on stdin".green());
            run(io::stdin().lock(), &mut controller)
        }
    }
}
