use clap::Parser;
use colored::*;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use rusty_hand::args::Args;
use rusty_hand::calibration::CalibrationStore;
use rusty_hand::camera::{prepare_frame, BlankFrames, CameraSource, CaptureRetry, FrameSource};
use rusty_hand::config::AppConfig;
use rusty_hand::session::{Command, Session};
use rusty_hand::tracker::{LandmarkSource, SimulatedTracker, SubprocessTracker};

/// Reads operator commands from stdin on their own thread.
fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("{}", e),
            }
        }
    });
    rx
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_ports {
        let ports = serialport::available_ports()?;
        println!("Available Serial Ports:");
        println!("{:<30} | {:<10}", "Port", "Type");
        println!("{}", "-".repeat(60));
        for port in ports {
            println!("{:<30} | {:?}", port.port_name, port.port_type);
        }
        return Ok(());
    }

    // 0. Load Config
    let mut config = AppConfig::load_from(Path::new(&args.config))?;
    if let Some(index) = args.cam_index {
        config.camera.index = index;
    }
    if args.port.is_some() {
        config.serial.port = args.port.clone();
    }

    // 1. Setup frames and landmarks
    let mut frames: Box<dyn FrameSource> = if args.simulate {
        Box::new(BlankFrames::new(config.camera.width, config.camera.height, 30))
    } else {
        Box::new(CameraSource::open(&config.camera)?)
    };
    let mut tracker: Box<dyn LandmarkSource> = if args.simulate {
        Box::new(SimulatedTracker::new())
    } else {
        Box::new(SubprocessTracker::spawn(&config.tracker)?)
    };
    println!("Frames: {}", frames.name());
    println!("Landmarks: {}", tracker.name());

    // 2. Setup Session (calibration + serial)
    let store = CalibrationStore::new(&config.calibration.path);
    let mut session = Session::new(store, config.serial.clone());
    if config.serial.port.is_some() && session.connect().is_err() {
        println!("{}", "Continuing without serial output".yellow());
    }

    let commands = spawn_command_reader();
    println!("Controls: [o] open hand  [c] closed hand  [s] save  [r] reset  [n] connect  [d] disconnect  [q] quit");

    // 3. Loop
    let started = Instant::now();
    let mut retry = CaptureRetry::new(Duration::from_secs(config.camera.ready_timeout_secs));
    let mut last_timestamp = 0u64;

    'frames: loop {
        while let Ok(cmd) = commands.try_recv() {
            if !session.handle(cmd) {
                break 'frames;
            }
        }

        let frame = match frames.capture() {
            Ok(f) => {
                retry.succeeded();
                f
            }
            Err(e) => {
                if !retry.failed() {
                    return Err(e.context("Camera failed; restart tracking"));
                }
                continue;
            }
        };
        let frame = prepare_frame(frame, &config.camera);

        // Detector needs strictly increasing timestamps
        let timestamp = (started.elapsed().as_millis() as u64).max(last_timestamp + 1);
        last_timestamp = timestamp;

        let hands = match tracker.detect(&frame, timestamp) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("Landmark detection failed: {:#}", e);
                continue;
            }
        };

        session.process_hands(&hands);

        if let Some(received) = session.poll_transport() {
            log::trace!("Controller: {}", received.trim_end());
        }
    }

    println!("Stopping.");
    Ok(())
}
