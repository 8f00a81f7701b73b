//! Serial console delivery.
//!
//! Writes a built [`CommandSequence`] to a switch console one line at a time,
//! waiting a fixed interval after each write and reading back whatever the
//! switch echoed. Replies are captured for the transcript, never interpreted.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::commands::CommandSequence;
use crate::error::{DeliveryError, TransportError};
use crate::models::ConsoleEndpoint;
use crate::transcript::{NullTranscript, TranscriptSink, TranscriptStore};
use crate::utils::truncate_lines;

/// Appended to every submission
pub const LINE_ENDING: &str = "\r\n";

/// ConsoleLink is a byte-level connection to one switch console
pub trait ConsoleLink: Send {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Everything the console has sent since the last read. Never blocks
    /// waiting for more.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;
}

/// LinkFactory opens console links; one link per switch
pub trait LinkFactory: Send + Sync {
    fn open(&self, endpoint: &ConsoleEndpoint) -> Result<Box<dyn ConsoleLink>, TransportError>;
}

/// Serial device opened with the `serialport` crate
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink {
    pub fn open(endpoint: &ConsoleEndpoint, timeout: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(endpoint.serial_port.as_str(), endpoint.baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| TransportError::Open {
                endpoint: endpoint.to_string(),
                source: io::Error::from(e),
            })?;
        Ok(Self { port })
    }
}

impl ConsoleLink for SerialLink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(LINE_ENDING.as_bytes())?;
        self.port.flush()
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let waiting = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if waiting == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; waiting];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

pub struct SerialLinkFactory {
    pub timeout: Duration,
}

impl LinkFactory for SerialLinkFactory {
    fn open(&self, endpoint: &ConsoleEndpoint) -> Result<Box<dyn ConsoleLink>, TransportError> {
        Ok(Box::new(SerialLink::open(endpoint, self.timeout)?))
    }
}

/// Fixed waits applied after each submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub handshake_delay: Duration,
    pub command_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            handshake_delay: Duration::from_secs(3),
            command_delay: Duration::from_secs(2),
        }
    }
}

/// Result of a complete delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sent: usize,
    pub transcript: Option<String>,
}

/// ConsoleSession drives one open console link
pub struct ConsoleSession {
    link: Box<dyn ConsoleLink>,
    transcript: Box<dyn TranscriptSink>,
    pacing: Pacing,
    sent: usize,
}

impl ConsoleSession {
    pub fn new(link: Box<dyn ConsoleLink>, transcript: Box<dyn TranscriptSink>, pacing: Pacing) -> Self {
        Self {
            link,
            transcript,
            pacing,
            sent: 0,
        }
    }

    /// Number of submissions written so far
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Write one command, wait, and return what the console echoed
    pub fn send(&mut self, command: &str, wait: Duration) -> Result<String, TransportError> {
        self.link.write_line(command).map_err(|source| TransportError::Write {
            command: command.to_string(),
            source,
        })?;
        self.sent += 1;

        if !wait.is_zero() {
            std::thread::sleep(wait);
        }

        let bytes = self.link.read_available().map_err(|source| TransportError::Read {
            command: command.to_string(),
            source,
        })?;
        let output = String::from_utf8_lossy(&bytes).into_owned();

        tracing::debug!(command, "{}", truncate_lines(output.trim_end(), 20));
        self.transcript
            .record(command, &output)
            .map_err(TransportError::Transcript)?;
        Ok(output)
    }

    fn send_all(&mut self, sequence: &CommandSequence) -> Result<(), TransportError> {
        for command in &sequence.handshake {
            self.send(command, self.pacing.handshake_delay)?;
        }
        for command in &sequence.commands {
            self.send(command, self.pacing.command_delay)?;
        }
        Ok(())
    }

    /// Send the handshake then every command, stopping at the first failure
    pub fn deliver(mut self, sequence: &CommandSequence) -> Result<Delivery, DeliveryError> {
        let result = self.send_all(sequence);
        let finished = self.transcript.finish();

        if let Err(source) = result {
            return Err(DeliveryError { sent: self.sent(), source });
        }
        let transcript = finished.map_err(|e| DeliveryError {
            sent: self.sent(),
            source: TransportError::Transcript(e),
        })?;
        Ok(Delivery {
            sent: self.sent(),
            transcript,
        })
    }
}

/// Open the console for `endpoint` and deliver `sequence` on it. The
/// transcript is only started once the console is open, so a switch that
/// cannot be reached leaves no file behind.
/// This is blocking, so call from a spawn_blocking context.
pub fn deliver_blocking(
    links: &dyn LinkFactory,
    endpoint: &ConsoleEndpoint,
    transcripts: &dyn TranscriptStore,
    hostname: &str,
    pacing: Pacing,
    sequence: &CommandSequence,
) -> Result<Delivery, DeliveryError> {
    let link = links
        .open(endpoint)
        .map_err(|source| DeliveryError { sent: 0, source })?;
    tracing::debug!("Console {} open", endpoint);

    let transcript: Box<dyn TranscriptSink> = match transcripts.open(hostname) {
        Ok(sink) => sink,
        Err(e) => {
            tracing::warn!("Transcript unavailable for {}: {}", hostname, e);
            Box::new(NullTranscript)
        }
    };
    ConsoleSession::new(link, transcript, pacing).deliver(sequence)
}

/// Async wrapper for deliver_blocking - runs in the blocking thread pool.
/// The caller's tracing span is carried onto the blocking thread.
pub async fn deliver(
    links: Arc<dyn LinkFactory>,
    endpoint: ConsoleEndpoint,
    transcripts: Arc<dyn TranscriptStore>,
    hostname: String,
    pacing: Pacing,
    sequence: CommandSequence,
) -> Result<Delivery, DeliveryError> {
    let span = tracing::Span::current();

    tokio::task::spawn_blocking(move || {
        span.in_scope(|| {
            deliver_blocking(
                links.as_ref(),
                &endpoint,
                transcripts.as_ref(),
                &hostname,
                pacing,
                &sequence,
            )
        })
    })
    .await
    .map_err(|e| DeliveryError {
        sent: 0,
        source: TransportError::Task(e.to_string()),
    })?
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::transcript::testing::MemoryTranscriptStore;
    use crate::transcript::NullTranscriptStore;

    fn sequence() -> CommandSequence {
        CommandSequence {
            handshake: vec!["".into(), "".into(), "enable".into(), "configure terminal".into()],
            commands: vec!["hostname sw1".into(), "wr mem".into()],
        }
    }

    fn endpoint(port: &str) -> ConsoleEndpoint {
        ConsoleEndpoint {
            serial_port: port.to_string(),
            baud_rate: 9600,
        }
    }

    #[test]
    fn test_send_writes_terminated_line_and_returns_echo() {
        let link = MockLink::default();
        link.reply(b"Switch>enable\r\nSwitch#");
        let mut session = ConsoleSession::new(Box::new(link.clone()), Box::new(NullTranscript), no_delay());

        let output = session.send("enable", Duration::ZERO).unwrap();
        assert_eq!(output, "Switch>enable\r\nSwitch#");
        assert_eq!(link.written(), vec!["enable\r\n"]);
        assert_eq!(session.sent(), 1);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let link = MockLink::default();
        link.reply(&[b'o', b'k', 0xff]);
        let mut session = ConsoleSession::new(Box::new(link), Box::new(NullTranscript), no_delay());
        assert_eq!(session.send("", Duration::ZERO).unwrap(), "ok\u{fffd}");
    }

    #[test]
    fn test_deliver_sends_handshake_then_commands() {
        let link = MockLink::default();
        let store = MemoryTranscriptStore::default();
        let session = ConsoleSession::new(Box::new(link.clone()), store.open("sw1").unwrap(), no_delay());

        let delivery = session.deliver(&sequence()).unwrap();
        assert_eq!(delivery.sent, 6);
        assert_eq!(delivery.transcript.as_deref(), Some("memory:sw1"));
        assert_eq!(
            link.written(),
            vec!["\r\n", "\r\n", "enable\r\n", "configure terminal\r\n", "hostname sw1\r\n", "wr mem\r\n"]
        );
        let commands: Vec<String> = store.entries("sw1").into_iter().map(|(c, _)| c).collect();
        assert_eq!(commands, vec!["", "", "enable", "configure terminal", "hostname sw1", "wr mem"]);
    }

    #[test]
    fn test_deliver_stops_at_first_write_failure() {
        let link = MockLink {
            fail_write_at: Some(4),
            ..MockLink::default()
        };
        let session = ConsoleSession::new(Box::new(link.clone()), Box::new(NullTranscript), no_delay());

        let err = session.deliver(&sequence()).unwrap_err();
        assert_eq!(err.sent, 4);
        assert!(matches!(err.source, TransportError::Write { ref command, .. } if command == "hostname sw1"));
        assert_eq!(link.written().len(), 4);
    }

    #[test]
    fn test_deliver_blocking_open_failure_starts_no_transcript() {
        let factory = MockLinkFactory::default();
        let store = MemoryTranscriptStore::default();
        let err = deliver_blocking(&factory, &endpoint("/dev/ttyUSB9"), &store, "sw1", no_delay(), &sequence())
            .unwrap_err();
        assert_eq!(err.sent, 0);
        assert!(matches!(err.source, TransportError::Open { .. }));
        assert!(err.source.to_string().contains("/dev/ttyUSB9@9600"));
        assert!(store.transcripts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_deliver_blocking_uses_endpoint() {
        let link = MockLink::default();
        let factory = MockLinkFactory::default().with_link("/dev/ttyUSB1", link.clone());
        let store = MemoryTranscriptStore::default();
        let delivery = deliver_blocking(&factory, &endpoint("/dev/ttyUSB1"), &store, "sw1", no_delay(), &sequence())
            .unwrap();
        assert_eq!(delivery.sent, 6);
        assert_eq!(delivery.transcript.as_deref(), Some("memory:sw1"));
        assert_eq!(store.entries("sw1").len(), 6);
        assert_eq!(factory.opened(), vec![endpoint("/dev/ttyUSB1")]);
    }

    #[tokio::test]
    async fn test_async_deliver() {
        let link = MockLink::default();
        link.reply(b"Switch>");
        let factory = MockLinkFactory::default().with_link("/dev/ttyUSB0", link.clone());

        let delivery = deliver(
            Arc::new(factory),
            endpoint("/dev/ttyUSB0"),
            Arc::new(NullTranscriptStore),
            "sw1".to_string(),
            no_delay(),
            sequence(),
        )
        .await
        .unwrap();
        assert_eq!(delivery.sent, 6);
        assert_eq!(delivery.transcript, None);
        assert_eq!(link.written().last().map(String::as_str), Some("wr mem\r\n"));
    }

    #[test]
    fn test_default_pacing() {
        let pacing = Pacing::default();
        assert_eq!(pacing.handshake_delay, Duration::from_secs(3));
        assert_eq!(pacing.command_delay, Duration::from_secs(2));
    }
}
