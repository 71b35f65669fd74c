//! Host session: everything one detection-loop iteration needs.
//!
//! The session owns the calibration table, its store and the serial link, and
//! is passed explicitly into the loop. Commands are applied between frames,
//! so a calibration change is seen in full by the next frame's normalization.

use colored::*;
use std::str::FromStr;

use crate::calibration::{CalibrationMode, CalibrationStore, CalibrationTable};
use crate::config::SerialConfig;
use crate::curl::finger_curls;
use crate::error::TransportError;
use crate::normalize::normalize_curls;
use crate::protocol::frame_message;
use crate::transport::{SerialLink, Transport};
use crate::types::{ControlMessage, FingerCurlSet, Hand, NormalizedCurlSet};

/// Operator commands, one per line on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `o`: record the current hand as open (min).
    CaptureOpen,
    /// `c`: record the current hand as closed (max).
    CaptureClosed,
    /// `s`
    Save,
    /// `r`: forget calibration, in memory and on disk.
    Reset,
    /// `n`: open the configured serial port.
    Connect,
    /// `d`
    Disconnect,
    /// `q`
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "o" | "open" => Ok(Command::CaptureOpen),
            "c" | "closed" => Ok(Command::CaptureClosed),
            "s" | "save" => Ok(Command::Save),
            "r" | "reset" => Ok(Command::Reset),
            "n" | "connect" => Ok(Command::Connect),
            "d" | "disconnect" => Ok(Command::Disconnect),
            "q" | "quit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// What one frame produced.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub hands: usize,
    pub curls: Option<FingerCurlSet>,
    pub normalized: Option<NormalizedCurlSet>,
    /// The message this frame emitted, if calibration allowed one.
    pub message: Option<ControlMessage>,
    /// Whether `message` reached the serial link.
    pub sent: bool,
}

pub struct Session {
    store: CalibrationStore,
    table: CalibrationTable,
    transport: Transport,
    serial: SerialConfig,
    last_curls: Option<FingerCurlSet>,
}

impl Session {
    /// Starts a session with whatever calibration the store holds.
    pub fn new(store: CalibrationStore, serial: SerialConfig) -> Self {
        let table = store.load();
        Self {
            store,
            table,
            transport: Transport::new(),
            serial,
            last_curls: None,
        }
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.table
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Opens the configured port. Failure is reported and leaves the
    /// pipeline running without serial output.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        let Some(port) = self.serial.port.clone() else {
            let e = TransportError::NoPort;
            log::warn!("{}", e);
            return Err(e);
        };
        match self.transport.connect(&port, self.serial.baud_rate) {
            Ok(()) => {
                println!("{}", format!("Serial connected: {}", port).green());
                Ok(())
            }
            Err(e) => {
                log::error!("Serial connect failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn attach(&mut self, link: SerialLink) -> Result<(), TransportError> {
        self.transport.attach(link)
    }

    pub fn disconnect(&mut self) -> Result<(), TransportError> {
        self.transport.disconnect()
    }

    /// One detection-loop iteration. Only the first hand drives the actuators.
    pub fn process_hands(&mut self, hands: &[Hand]) -> FrameReport {
        let mut report = FrameReport {
            hands: hands.len(),
            ..FrameReport::default()
        };

        let Some(hand) = hands.first() else {
            self.last_curls = None;
            return report;
        };
        for extra in &hands[1..] {
            log::debug!("Ignoring additional hand: {}", extra.label());
        }

        let curls = finger_curls(hand);
        let normalized = normalize_curls(&curls, &self.table);
        log::debug!("{} curls (0=open,1=closed): {}", hand.label(), normalized);

        report.message = frame_message(&self.table, &normalized);
        if let Some(message) = &report.message {
            if self.transport.is_connected() {
                match self.transport.send(message) {
                    Ok(()) => report.sent = true,
                    Err(e) => {
                        log::error!("Serial write failed, dropping link: {}", e);
                        let _ = self.transport.disconnect();
                    }
                }
            }
        }

        self.last_curls = Some(curls);
        report.curls = Some(curls);
        report.normalized = Some(normalized);
        report
    }

    /// Newest text received from the controller, if any.
    pub fn poll_transport(&mut self) -> Option<&str> {
        self.transport.poll_received()
    }

    /// Applies an operator command. Returns `false` once the session should end.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::CaptureOpen => self.capture(CalibrationMode::Min),
            Command::CaptureClosed => self.capture(CalibrationMode::Max),
            Command::Save => {
                if let Err(e) = self.store.save(&self.table) {
                    log::error!("{}; press 's' to retry", e);
                }
            }
            Command::Reset => {
                if let Err(e) = self.store.reset(&mut self.table) {
                    log::error!("Failed to remove saved calibration: {}", e);
                }
                println!("{}", "Calibration reset".yellow());
            }
            Command::Connect => {
                let _ = self.connect();
            }
            Command::Disconnect => {
                if let Err(e) = self.disconnect() {
                    log::warn!("{}", e);
                }
            }
            Command::Quit => return false,
        }
        true
    }

    fn capture(&mut self, mode: CalibrationMode) {
        let Some(curls) = self.last_curls else {
            log::warn!("No hand in view, nothing to calibrate");
            return;
        };
        self.table.calibrate(&curls, mode);
        let pose = match mode {
            CalibrationMode::Min => "Open",
            CalibrationMode::Max => "Closed",
        };
        println!("{}", format!("{} hand recorded: {}", pose, curls).green());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.transport.is_connected() {
            let _ = self.transport.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::simulated_hand;
    use crate::types::Channel;
    use std::io::{self, Cursor, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn temp_session(name: &str) -> Session {
        let path = std::env::temp_dir().join(format!("rusty_hand_session_{}_{}.json", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        Session::new(CalibrationStore::new(path), SerialConfig::default())
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!("o".parse::<Command>(), Ok(Command::CaptureOpen));
        assert_eq!(" C\n".parse::<Command>(), Ok(Command::CaptureClosed));
        assert_eq!("quit".parse::<Command>(), Ok(Command::Quit));
        assert!("x".parse::<Command>().is_err());
    }

    #[test]
    fn test_no_message_until_calibrated() {
        let mut session = temp_session("uncalibrated");
        let report = session.process_hands(&[simulated_hand(0.5)]);
        assert_eq!(report.hands, 1);
        assert!(report.curls.is_some());
        assert_eq!(report.message, None);
    }

    #[test]
    fn test_calibrated_session_sends_lines() {
        let mut session = temp_session("calibrated");
        let out = SharedBuffer::default();
        session
            .attach(SerialLink::from_parts("mem", out.clone(), Cursor::new(Vec::new())))
            .unwrap();

        session.process_hands(&[simulated_hand(1.0)]);
        assert!(session.handle(Command::CaptureOpen));
        session.process_hands(&[simulated_hand(0.0)]);
        assert!(session.handle(Command::CaptureClosed));

        let open = session.process_hands(&[simulated_hand(1.0)]);
        let fist = session.process_hands(&[simulated_hand(0.0)]);
        assert!(open.sent && fist.sent);
        // Open was captured as the larger curl, so bounds were swapped.
        assert_eq!(open.message, Some(ControlMessage([255; 6])));
        assert_eq!(fist.message, Some(ControlMessage([0; 6])));

        let written = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        // First line went out after the open capture, with max still unset.
        assert_eq!(lines, vec!["0,0,0,0,0,0", "255,255,255,255,255,255", "0,0,0,0,0,0"]);
    }

    #[test]
    fn test_capture_without_hand_is_ignored() {
        let mut session = temp_session("nohand");
        session.process_hands(&[]);
        session.handle(Command::CaptureOpen);
        assert!(session.calibration().is_empty());
    }

    #[test]
    fn test_only_first_hand_drives() {
        let mut session = temp_session("twohands");
        session.process_hands(&[simulated_hand(0.2)]);
        session.handle(Command::CaptureOpen);
        let report = session.process_hands(&[simulated_hand(0.2), simulated_hand(0.9)]);
        assert_eq!(report.hands, 2);
        let expected = finger_curls(&simulated_hand(0.2));
        assert_eq!(report.curls.unwrap()[Channel::Index], expected[Channel::Index]);
    }

    #[test]
    fn test_save_reset_cycle() {
        let mut session = temp_session("save_reset");
        session.process_hands(&[simulated_hand(1.0)]);
        session.handle(Command::CaptureOpen);
        session.handle(Command::Save);
        assert!(!session.store.load().is_empty());

        session.handle(Command::Reset);
        assert!(session.calibration().is_empty());
        assert!(session.store.load().is_empty());
    }

    #[test]
    fn test_connect_without_port_is_non_fatal() {
        let mut session = temp_session("noport");
        assert!(matches!(session.connect(), Err(TransportError::NoPort)));
        assert!(session.handle(Command::Connect));
        assert!(!session.is_connected());
        let report = session.process_hands(&[simulated_hand(0.5)]);
        assert!(!report.sent);
    }
}
