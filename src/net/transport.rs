//! Byte transports underneath a session
//!
//! A [`Transport`] is the peer address plus the two halves of a byte stream
//! and a [`Closer`] for the whole stream. The input half is only touched by
//! the session's reader, the output half by its writers, so each half lives
//! behind its own lock in the terminal layer. The closer needs no lock and
//! works while a reader or writer is blocked on the stream.

use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

/// Blocking source of raw bytes
pub trait ByteSource: Send {
    /// Read one byte, `None` at end of stream
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

/// Sink for raw bytes
pub trait ByteSink: Send {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Shuts the whole stream down from any thread
///
/// A reader blocked on the input half wakes up with end of stream and a
/// writer blocked on the output half fails.
pub trait Closer: Send + Sync {
    fn close(&self) -> io::Result<()>;
}

/// The halves of an admitted transport
pub(crate) struct TransportParts {
    pub peer: SocketAddr,
    pub source: Box<dyn ByteSource>,
    pub sink: Box<dyn ByteSink>,
    pub closer: Box<dyn Closer>,
}

/// An accepted connection waiting for admission
pub struct Transport {
    peer: SocketAddr,
    source: Box<dyn ByteSource>,
    sink: Box<dyn ByteSink>,
    closer: Box<dyn Closer>,
}

impl Transport {
    pub fn new(
        peer: SocketAddr,
        source: Box<dyn ByteSource>,
        sink: Box<dyn ByteSink>,
        closer: Box<dyn Closer>,
    ) -> Self {
        Self {
            peer,
            source,
            sink,
            closer,
        }
    }

    /// Wrap an accepted TCP stream
    pub fn tcp(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        let reader = stream.try_clone()?;
        let closer = stream.try_clone()?;
        Ok(Self::new(
            peer,
            Box::new(TcpSource {
                reader: BufReader::new(reader),
            }),
            Box::new(TcpSink { stream }),
            Box::new(TcpCloser { stream: closer }),
        ))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Close the stream without using it
    pub fn close(self) {
        if let Err(e) = self.closer.close() {
            tracing::debug!(peer = %self.peer, "Closing rejected transport failed: {}", e);
        }
    }

    pub(crate) fn into_parts(self) -> TransportParts {
        TransportParts {
            peer: self.peer,
            source: self.source,
            sink: self.sink,
            closer: self.closer,
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").field("peer", &self.peer).finish()
    }
}

struct TcpSource {
    reader: BufReader<TcpStream>,
}

impl ByteSource for TcpSource {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

struct TcpSink {
    stream: TcpStream,
}

impl ByteSink for TcpSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

struct TcpCloser {
    stream: TcpStream,
}

impl Closer for TcpCloser {
    fn close(&self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // Already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// In-memory transports for driving sessions without sockets
pub mod memory {
    use std::io;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::{Duration, Instant};

    use super::{ByteSink, ByteSource, Closer, Transport};

    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    #[derive(Debug, Default)]
    struct Shared {
        output: Mutex<Output>,
        changed: Condvar,
        closed: AtomicBool,
    }

    #[derive(Debug, Default)]
    struct Output {
        bytes: Vec<u8>,
        flushes: usize,
    }

    /// The remote end of an in-memory transport
    #[derive(Debug, Clone)]
    pub struct RemotePeer {
        input: Sender<u8>,
        shared: Arc<Shared>,
    }

    /// Create a transport and the peer that talks to it
    pub fn pipe(peer: SocketAddr) -> (Transport, RemotePeer) {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared::default());
        let transport = Transport::new(
            peer,
            Box::new(MemorySource {
                input: rx,
                shared: Arc::clone(&shared),
            }),
            Box::new(MemorySink {
                shared: Arc::clone(&shared),
            }),
            Box::new(MemoryCloser {
                shared: Arc::clone(&shared),
            }),
        );
        (transport, RemotePeer { input: tx, shared })
    }

    impl RemotePeer {
        /// Send bytes towards the session; false once the session is gone
        pub fn send(&self, bytes: &[u8]) -> bool {
            bytes.iter().all(|b| self.input.send(*b).is_ok())
        }

        /// Everything the session wrote so far
        pub fn output(&self) -> Vec<u8> {
            match self.shared.output.lock() {
                Ok(out) => out.bytes.clone(),
                Err(poisoned) => poisoned.into_inner().bytes.clone(),
            }
        }

        /// Take everything the session wrote so far
        pub fn take_output(&self) -> Vec<u8> {
            match self.shared.output.lock() {
                Ok(mut out) => std::mem::take(&mut out.bytes),
                Err(poisoned) => std::mem::take(&mut poisoned.into_inner().bytes),
            }
        }

        /// How many times the session flushed
        pub fn flush_count(&self) -> usize {
            match self.shared.output.lock() {
                Ok(out) => out.flushes,
                Err(poisoned) => poisoned.into_inner().flushes,
            }
        }

        /// Wait until the written output contains `needle`
        pub fn wait_for(&self, needle: &[u8], timeout: Duration) -> bool {
            let deadline = Instant::now() + timeout;
            let Ok(mut out) = self.shared.output.lock() else {
                return false;
            };
            loop {
                if contains(&out.bytes, needle) {
                    return true;
                }
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                out = match self.shared.changed.wait_timeout(out, deadline - now) {
                    Ok((guard, _)) => guard,
                    Err(_) => return false,
                };
            }
        }

        /// Whether the session closed the stream
        pub fn is_closed(&self) -> bool {
            self.shared.closed.load(Ordering::SeqCst)
        }

        /// Wait until the session closes the stream
        pub fn wait_closed(&self, timeout: Duration) -> bool {
            let deadline = Instant::now() + timeout;
            while !self.is_closed() {
                if Instant::now() >= deadline {
                    return false;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            true
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
    }

    struct MemorySource {
        input: Receiver<u8>,
        shared: Arc<Shared>,
    }

    impl ByteSource for MemorySource {
        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            loop {
                if self.shared.closed.load(Ordering::SeqCst) {
                    return Ok(None);
                }
                match self.input.recv_timeout(POLL_INTERVAL) {
                    Ok(byte) => return Ok(Some(byte)),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return Ok(None),
                }
            }
        }
    }

    struct MemorySink {
        shared: Arc<Shared>,
    }

    impl ByteSink for MemorySink {
        fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "transport closed"));
            }
            let mut out = self
                .shared
                .output
                .lock()
                .map_err(|_| io::Error::other("output lock poisoned"))?;
            out.bytes.extend_from_slice(bytes);
            self.shared.changed.notify_all();
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            let mut out = self
                .shared
                .output
                .lock()
                .map_err(|_| io::Error::other("output lock poisoned"))?;
            out.flushes += 1;
            Ok(())
        }
    }

    struct MemoryCloser {
        shared: Arc<Shared>,
    }

    impl Closer for MemoryCloser {
        fn close(&self) -> io::Result<()> {
            self.shared.closed.store(true, Ordering::SeqCst);
            self.shared.changed.notify_all();
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::net::transport::TransportParts;

        fn addr() -> SocketAddr {
            "127.0.0.1:4000".parse().unwrap()
        }

        #[test]
        fn test_bytes_flow_both_ways() {
            let (transport, peer) = pipe(addr());
            let mut parts = transport.into_parts();
            assert!(peer.send(b"hi"));
            assert_eq!(parts.source.read_byte().unwrap(), Some(b'h'));
            assert_eq!(parts.source.read_byte().unwrap(), Some(b'i'));
            parts.sink.write_bytes(b"out").unwrap();
            parts.sink.flush().unwrap();
            assert_eq!(peer.output(), b"out");
            assert_eq!(peer.flush_count(), 1);
        }

        #[test]
        fn test_close_wakes_reader() {
            let (transport, peer) = pipe(addr());
            let TransportParts {
                mut source,
                mut sink,
                closer,
                ..
            } = transport.into_parts();
            let reader = std::thread::spawn(move || source.read_byte().unwrap());
            std::thread::sleep(Duration::from_millis(30));
            closer.close().unwrap();
            assert_eq!(reader.join().unwrap(), None);
            assert!(peer.is_closed());
            assert!(sink.write_bytes(b"x").is_err());
        }

        #[test]
        fn test_wait_for() {
            let (transport, peer) = pipe(addr());
            let mut sink = transport.into_parts().sink;
            let writer = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                sink.write_bytes(b"hello world").unwrap();
            });
            assert!(peer.wait_for(b"world", Duration::from_secs(2)));
            writer.join().unwrap();
            assert!(!peer.wait_for(b"missing", Duration::from_millis(20)));
        }
    }
}
