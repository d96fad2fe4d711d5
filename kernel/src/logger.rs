//! Kernel logger backend
//!
//! Routes `log` records to a console sink registered at boot (serial port,
//! VGA, ...). Formatting goes through a fixed stack buffer so logging works
//! before the heap is up and from interrupt context.

use core::fmt::Write;
use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

/// Console write function provided by the platform
pub type ConsoleSink = fn(&[u8]);

/// Size of the per-record formatting buffer
const RECORD_BUFFER_SIZE: usize = 512;

static SINK: Once<ConsoleSink> = Once::new();
static LOGGER: KernelLogger = KernelLogger;

struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = SINK.get() else {
            return;
        };

        let mut buf = [0u8; RECORD_BUFFER_SIZE];
        let pos = format_record(&mut buf, record.level(), record.args());
        sink(&buf[..pos]);
    }

    fn flush(&self) {}
}

/// Format `[LEVEL] message\n` into `buf`, truncating if needed
///
/// Returns the number of bytes written.
pub fn format_record(buf: &mut [u8], level: Level, args: &core::fmt::Arguments) -> usize {
    let level_str = match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    };

    let mut writer = BufferWriter { buffer: buf, pos: 0 };
    let _ = write!(&mut writer, "[{}] {}\n", level_str, args);
    writer.pos
}

/// Simple buffer writer for formatting without alloc
pub struct BufferWriter<'a> {
    pub buffer: &'a mut [u8],
    pub pos: usize,
}

impl<'a> Write for BufferWriter<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buffer.len() - self.pos;
        let to_write = bytes.len().min(remaining);

        if to_write > 0 {
            self.buffer[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
        }

        Ok(())
    }
}

/// Install the kernel logger
///
/// Only the first call registers a sink; later calls just adjust the level.
pub fn init(sink: ConsoleSink, level: LevelFilter) {
    SINK.call_once(|| sink);
    // set_logger fails if a logger is already installed, which is fine here
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_record_prefix() {
        let mut buf = [0u8; 64];
        let n = format_record(&mut buf, Level::Warn, &format_args!("tid {}", 7));
        assert_eq!(&buf[..n], b"[WARN ] tid 7\n");
    }

    #[test]
    fn test_format_record_truncates() {
        let mut buf = [0u8; 8];
        let n = format_record(&mut buf, Level::Info, &format_args!("a long message"));
        assert_eq!(n, 8);
        assert_eq!(&buf[..n], b"[INFO ] ");
    }
}
