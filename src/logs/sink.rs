// syslog writer for tracing-subscriber, on top of the syslog crate

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use syslog::{Facility, Formatter3164, Logger, LoggerBackend};
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

const PROCESS: &str = "rootdaemon";

type SharedLogger<B> = Arc<Mutex<Logger<B, Formatter3164>>>;

fn formatter() -> Formatter3164 {
    Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: PROCESS.to_string(),
        pid: std::process::id(),
    }
}

/// Hands out one [`SyslogWriter`] per event, all sharing one connection
pub struct Syslog<B: Write = LoggerBackend> {
    logger: SharedLogger<B>,
}

impl Syslog {
    /// Connect to the local syslog socket. The connection is made before any
    /// fork, so every process of the detach chain reuses it.
    pub fn connect() -> syslog::Result<Self> {
        Ok(Self::with_logger(syslog::unix(formatter())?))
    }
}

impl<B: Write> Syslog<B> {
    pub fn with_logger(logger: Logger<B, Formatter3164>) -> Self {
        Self {
            logger: Arc::new(Mutex::new(logger)),
        }
    }
}

impl<'a, B: Write + Send + 'static> MakeWriter<'a> for Syslog<B> {
    type Writer = SyslogWriter<B>;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogWriter::new(Arc::clone(&self.logger), Level::DEBUG)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogWriter::new(Arc::clone(&self.logger), *meta.level())
    }
}

/// Buffers one formatted event and sends it as a single syslog record on drop
pub struct SyslogWriter<B: Write = LoggerBackend> {
    logger: SharedLogger<B>,
    level: Level,
    buf: Vec<u8>,
}

impl<B: Write> SyslogWriter<B> {
    fn new(logger: SharedLogger<B>, level: Level) -> Self {
        Self {
            logger,
            level,
            buf: Vec::new(),
        }
    }

    fn record(&self) -> Option<String> {
        let text = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf);
        if text.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(text).into_owned())
    }
}

impl<B: Write> Write for SyslogWriter<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<B: Write> Drop for SyslogWriter<B> {
    fn drop(&mut self) {
        let Some(record) = self.record() else {
            return;
        };
        let Ok(mut logger) = self.logger.lock() else {
            return;
        };

        // Each process of the detach chain reports under its own pid
        logger.formatter.pid = std::process::id();

        // Nowhere left to report a failed send
        let _ = match self.level {
            Level::ERROR => logger.err(record),
            Level::WARN => logger.warning(record),
            Level::INFO => logger.info(record),
            _ => logger.debug(record),
        };
    }
}
