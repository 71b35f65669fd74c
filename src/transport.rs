//! Serial byte transport between the host and the hand controller.
//!
//! Writes happen on the caller's thread, one line per frame. Reads run on a
//! dedicated thread that forwards every received chunk over a channel; the
//! owner only ever looks at the newest chunk.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::TransportError;
use crate::types::ControlMessage;

/// How often a blocked read wakes up to check for cancellation. Reads
/// themselves have no timeout: an expired poll just reads again.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

const READ_BUFFER_SIZE: usize = 256;

/// An open link: a writer plus the reader thread feeding `chunks`.
pub struct SerialLink {
    name: String,
    writer: Box<dyn Write + Send>,
    cancel: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    chunks: Receiver<String>,
    last_received: Option<String>,
}

impl SerialLink {
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let open_err = |source| TransportError::Open {
            port: port.to_string(),
            source,
        };
        let writer = serialport::new(port, baud_rate)
            .timeout(READ_POLL_INTERVAL)
            .open()
            .map_err(open_err)?;
        let reader = writer.try_clone().map_err(open_err)?;

        Ok(Self::from_parts(port, writer, reader))
    }

    /// Builds a link over any byte stream pair.
    pub fn from_parts<W, R>(name: impl Into<String>, writer: W, reader: R) -> Self
    where
        W: Write + Send + 'static,
        R: Read + Send + 'static,
    {
        let name = name.into();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let thread_cancel = Arc::clone(&cancel);
        let thread_name = name.clone();
        let reader = thread::spawn(move || read_loop(reader, tx, thread_cancel, &thread_name));

        Self {
            name,
            writer: Box::new(writer),
            cancel,
            reader: Some(reader),
            chunks: rx,
            last_received: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire-and-forget: no acknowledgement is expected.
    pub fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
        self.writer.write_all(message.to_line().as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Newest chunk received so far; older unread chunks are discarded.
    pub fn poll_received(&mut self) -> Option<&str> {
        while let Ok(chunk) = self.chunks.try_recv() {
            self.last_received = Some(chunk);
        }
        self.last_received.as_deref()
    }

    /// Cancels the reader, waits for it to finish and releases the port.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                log::warn!("Serial reader for {} panicked", self.name);
            }
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_loop<R: Read>(mut reader: R, tx: Sender<String>, cancel: Arc<AtomicBool>, name: &str) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    while !cancel.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => {
                log::info!("Serial stream {} closed", name);
                break;
            }
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if tx.send(chunk).is_err() {
                    break;
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                log::warn!("Serial read on {} failed: {}", name, e);
                break;
            }
        }
    }
    log::debug!("Serial reader for {} stopped", name);
}

/// Holds at most one link at a time.
#[derive(Default)]
pub struct Transport {
    link: Option<SerialLink>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.name())
    }

    /// Opens `port`. Refused while a previous link is still held.
    pub fn connect(&mut self, port: &str, baud_rate: u32) -> Result<(), TransportError> {
        if self.link.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        let link = SerialLink::open(port, baud_rate)?;
        log::info!("Serial connected: {} @ {} baud", port, baud_rate);
        self.link = Some(link);
        Ok(())
    }

    /// Adopts an already opened link.
    pub fn attach(&mut self, link: SerialLink) -> Result<(), TransportError> {
        if self.link.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        self.link = Some(link);
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<(), TransportError> {
        let link = self.link.take().ok_or(TransportError::NotConnected)?;
        let name = link.name().to_string();
        link.close();
        log::info!("Serial disconnected: {}", name);
        Ok(())
    }

    pub fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
        self.link
            .as_mut()
            .ok_or(TransportError::NotConnected)?
            .send(message)
    }

    pub fn poll_received(&mut self) -> Option<&str> {
        self.link.as_mut()?.poll_received()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Instant;

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

    /// Hands out one queued chunk per read, then EOF.
    struct ChunkReader(VecDeque<&'static [u8]>);

    impl Read for ChunkReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Ok(0),
            }
        }
    }

    /// Never returns data, only poll timeouts.
    struct IdleReader;

    impl Read for IdleReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_millis(5));
            Err(io::ErrorKind::TimedOut.into())
        }
    }

    fn wait_for(link: &mut SerialLink, expected: &str) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if link.poll_received() == Some(expected) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_send_writes_one_line() {
        let out = SharedBuffer::default();
        let mut link = SerialLink::from_parts("mem", out.clone(), Cursor::new(Vec::new()));
        link.send(&ControlMessage([1, 2, 3, 4, 5, 6])).unwrap();
        link.send(&ControlMessage([0; 6])).unwrap();
        assert_eq!(
            String::from_utf8(out.0.lock().unwrap().clone()).unwrap(),
            "1,2,3,4,5,6\n0,0,0,0,0,0\n"
        );
    }

    #[test]
    fn test_last_received_wins() {
        let reader = ChunkReader(VecDeque::from(vec![&b"first"[..], &b"second"[..]]));
        let mut link = SerialLink::from_parts("mem", SharedBuffer::default(), reader);
        assert!(wait_for(&mut link, "second"));
        // Stays on the newest value once the stream goes quiet.
        assert_eq!(link.poll_received(), Some("second"));
    }

    #[test]
    fn test_close_cancels_idle_reader() {
        let link = SerialLink::from_parts("idle", SharedBuffer::default(), IdleReader);
        let start = Instant::now();
        link.close();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_single_link_at_a_time() {
        let mut transport = Transport::new();
        let link = || SerialLink::from_parts("idle", SharedBuffer::default(), IdleReader);

        transport.attach(link()).unwrap();
        assert!(matches!(transport.attach(link()), Err(TransportError::AlreadyConnected)));
        assert!(matches!(
            transport.connect("/dev/rusty-hand-no-such-port", 115_200),
            Err(TransportError::AlreadyConnected)
        ));

        transport.disconnect().unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(transport.disconnect(), Err(TransportError::NotConnected)));
        transport.attach(link()).unwrap();
        assert_eq!(transport.port_name(), Some("idle"));
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let mut transport = Transport::new();
        let err = transport
            .connect("/dev/rusty-hand-no-such-port", 115_200)
            .unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.send(&ControlMessage::default()),
            Err(TransportError::NotConnected)
        ));
    }
}
