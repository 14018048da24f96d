//! In-memory writer for testing
//!
//! Provides a cloneable in-memory buffer that implements Write, letting a
//! test hand one handle to a format and keep another for assertions.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// In-memory writer for testing
#[derive(Clone, Debug, Default)]
pub(crate) struct InMemoryWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl InMemoryWriter {
    /// Create a new in-memory writer
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get the buffer contents as a UTF-8 string
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned or the buffer is not UTF-8
    #[must_use]
    pub(crate) fn get_string(&self) -> String {
        let bytes = self.buffer.lock().expect("mutex poisoned").clone();
        String::from_utf8(bytes).expect("buffer contains invalid UTF-8")
    }

    /// Get the non-empty lines written so far
    #[must_use]
    pub(crate) fn get_lines(&self) -> Vec<String> {
        self.get_string()
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Write for InMemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer
            .lock()
            .expect("mutex poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
