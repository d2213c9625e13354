//! Output sinks.
//!
//! Every byte a child prints is copied to the session's sink as it arrives.
//! The sink is pass-through only: nothing is filtered, reformatted, or
//! matched there.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for a verbatim copy of child output.
///
/// Cloning a sink shares the underlying destination.
#[derive(Clone, Default)]
pub struct Sink {
    inner: SinkInner,
}

#[derive(Clone, Default)]
enum SinkInner {
    #[default]
    Stdout,
    Null,
    Writer(Arc<Mutex<Box<dyn Write + Send>>>),
    Buffer(SharedBuffer),
}

impl Sink {
    /// Copy output to the process's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            inner: SinkInner::Stdout,
        }
    }

    /// Discard output.
    #[must_use]
    pub fn null() -> Self {
        Self {
            inner: SinkInner::Null,
        }
    }

    /// Copy output to any writer (a log file, a socket, ...).
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: SinkInner::Writer(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    /// Copy output into a shared in-memory buffer.
    #[must_use]
    pub fn buffer(buffer: &SharedBuffer) -> Self {
        Self {
            inner: SinkInner::Buffer(buffer.clone()),
        }
    }

    /// Write `data` and flush.
    pub fn write_all(&self, data: &[u8]) -> io::Result<()> {
        match &self.inner {
            SinkInner::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(data)?;
                out.flush()
            }
            SinkInner::Null => Ok(()),
            SinkInner::Writer(writer) => {
                let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
                writer.write_all(data)?;
                writer.flush()
            }
            SinkInner::Buffer(buffer) => {
                buffer.extend(data);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            SinkInner::Stdout => "stdout",
            SinkInner::Null => "null",
            SinkInner::Writer(_) => "writer",
            SinkInner::Buffer(_) => "buffer",
        };
        f.debug_tuple("Sink").field(&kind).finish()
    }
}

/// A cloneable in-memory byte buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn extend(&self, data: &[u8]) {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
    }

    /// Copy of the contents.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Contents as a string (lossy UTF-8 conversion).
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    /// Number of bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard the contents.
    pub fn clear(&self) {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_collects_verbatim() {
        let buffer = SharedBuffer::new();
        let sink = Sink::buffer(&buffer);
        sink.write_all(b"Type MASTER passphrase: ").unwrap();
        sink.clone().write_all(b"\r\nDone.\n").unwrap();

        assert_eq!(buffer.contents(), b"Type MASTER passphrase: \r\nDone.\n");
        assert_eq!(buffer.len(), 32);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn writer_sink_forwards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let sink = Sink::from_writer(std::fs::File::create(&path).unwrap());
        sink.write_all(b"navencrypt is now registered.\n").unwrap();

        let logged = std::fs::read_to_string(&path).unwrap();
        assert_eq!(logged, "navencrypt is now registered.\n");
    }

    #[test]
    fn null_sink_accepts_everything() {
        assert!(Sink::null().write_all(b"anything").is_ok());
        assert_eq!(format!("{:?}", Sink::default()), "Sink(\"stdout\")");
    }
}
