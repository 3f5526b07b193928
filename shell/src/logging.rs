use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::writer::MakeWriter;

/// Log sink for the shell. Stdout is reserved for results.
///
/// The log file, when given, receives every event down to DEBUG. Stderr only shows events at
/// or above `console_level`, so `--verbose` decides how chatty the terminal is without
/// changing what lands in the file.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
    console_level: Level,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>, verbose: bool) -> io::Result<Self> {
        let file = match path {
            Some(path) => Some(Arc::new(Mutex::new(File::create(path)?))),
            None => None,
        };
        Ok(Self {
            file,
            console_level: if verbose { Level::DEBUG } else { Level::INFO },
        })
    }

    /// Most detailed level any sink wants; the subscriber filters at this level.
    pub(crate) fn max_level(&self) -> Level {
        if self.file.is_some() {
            Level::DEBUG
        } else {
            self.console_level
        }
    }

    fn guard(&self, console: bool) -> LogWriterGuard {
        LogWriterGuard {
            file: self.file.clone(),
            console,
        }
    }
}

pub(crate) struct LogWriterGuard {
    file: Option<Arc<Mutex<File>>>,
    console: bool,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        self.guard(true)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        // `Level` orders more verbose levels as greater
        self.guard(*meta.level() <= self.console_level)
    }
}

impl LogWriterGuard {
    fn with_file(&self, op: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let mut handle = file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        op(&mut handle)
    }
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.console {
            io::stderr().write_all(buf)?;
        }
        self.with_file(|file| file.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.console {
            io::stderr().flush()?;
        }
        self.with_file(Write::flush)
    }
}
