//! Tracing capture for the console buffer.
//!
//! [`ConsoleMakeWriter`] plugs into a `fmt` layer (built with
//! `.with_ansi(false)`) and feeds every formatted event into
//! [`LogHub::console`], which is what `GET console` serves.

use mccontrol_host::LogHub;
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Clone)]
pub struct ConsoleMakeWriter {
    logs: Arc<LogHub>,
}

impl ConsoleMakeWriter {
    pub fn new(logs: &Arc<LogHub>) -> Self {
        Self {
            logs: Arc::clone(logs),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            logs: Arc::clone(&self.logs),
            buf: Vec::with_capacity(256),
        }
    }
}

/// Per-event writer. Buffers the formatted event and pushes one console line
/// per text line on drop.
pub struct ConsoleWriter {
    logs: Arc<LogHub>,
    buf: Vec<u8>,
}

impl Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.buf);
        for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            self.logs.console(line);
        }
    }
}
