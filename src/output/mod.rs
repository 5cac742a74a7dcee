//! Output adapter: where rendered documents go and how they are shaped.
//!
//! The destination is chosen once at startup as an [`OutputSink`]: the user's
//! pager when stdout is an interactive terminal, stdout directly otherwise.
//! Either way a downstream reader that goes away (closed pipe, pager quit
//! early) ends output quietly instead of failing the command.

pub mod format;
pub mod pager;
pub mod table;
pub mod units;

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

pub use format::{show_json, Document, OutputFormat};
pub use pager::{Output, PagerSink};
pub use table::Table;

pub const DEFAULT_PAGER: &str = "less";
pub const DEFAULT_TERMINAL_WIDTH: usize = 80;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Invalid format: {format}, valid formats are: {valid}")]
    InvalidFormat { format: String, valid: String },

    #[error("failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

/// Terminal facts captured once at startup.
#[derive(Debug, Clone)]
pub struct TerminalSettings {
    pub stdout_is_tty: bool,
    /// `FORCE_COLOR`: `Some(true)` for `1`, `Some(false)` for `0`.
    pub force_color: Option<bool>,
    /// Raw `COLUMNS` value.
    pub columns: Option<String>,
    pub pager: String,
}

impl TerminalSettings {
    /// Read the environment. `configured_pager` (from the config file) wins
    /// over `$PAGER`.
    pub fn from_env(configured_pager: Option<&str>) -> Self {
        use std::io::IsTerminal;

        let pager = configured_pager
            .map(str::to_string)
            .or_else(|| std::env::var("PAGER").ok())
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PAGER.to_string());

        Self {
            stdout_is_tty: io::stdout().is_terminal(),
            force_color: parse_force_color(std::env::var("FORCE_COLOR").ok().as_deref()),
            columns: std::env::var("COLUMNS").ok(),
            pager,
        }
    }

    /// Colour decision for a destination that is (or is not) a terminal.
    pub fn colors_for(&self, is_terminal: bool) -> bool {
        self.force_color.unwrap_or(is_terminal)
    }

    /// Width available for tables.
    pub fn terminal_width(&self) -> usize {
        let queried = crossterm::terminal::size().ok().map(|(cols, _)| cols);
        resolve_width(queried, self.columns.as_deref())
    }
}

fn parse_force_color(value: Option<&str>) -> Option<bool> {
    match value {
        Some("1") => Some(true),
        Some("0") => Some(false),
        _ => None,
    }
}

/// Terminal query first, then `COLUMNS`, then 80.
pub fn resolve_width(queried: Option<u16>, columns: Option<&str>) -> usize {
    if let Some(cols) = queried.filter(|c| *c > 0) {
        return usize::from(cols);
    }
    columns
        .and_then(|c| c.trim().parse::<usize>().ok())
        .filter(|c| *c > 0)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH)
}

/// A destination for one rendered document.
pub trait OutputSink: Send + Sync {
    /// Open the destination. `label` titles the pager prompt.
    fn open(&self, label: &str) -> io::Result<Output>;
}

/// Writes straight to stdout.
#[derive(Debug, Clone, Copy)]
pub struct StdoutSink {
    pub colors: bool,
}

impl OutputSink for StdoutSink {
    fn open(&self, _label: &str) -> io::Result<Output> {
        Ok(Output::direct(Box::new(io::stdout()), self.colors))
    }
}

/// Captures output in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<Vec<u8>>>,
    pub colors: bool,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

impl OutputSink for BufferSink {
    fn open(&self, _label: &str) -> io::Result<Output> {
        Ok(Output::direct(
            Box::new(SharedBuffer(Arc::clone(&self.buffer))),
            self.colors,
        ))
    }
}

struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Pick the sink for this process: pager on a terminal, stdout otherwise.
pub fn select_output_sink(settings: &TerminalSettings) -> Box<dyn OutputSink> {
    if settings.stdout_is_tty {
        Box::new(PagerSink::new(
            settings.pager.clone(),
            settings.colors_for(true),
            StdoutSink {
                colors: settings.colors_for(true),
            },
        ))
    } else {
        Box::new(StdoutSink {
            colors: settings.colors_for(false),
        })
    }
}

/// Run `generate` against a freshly opened destination and wait for it to
/// drain (for a pager: until the user quits it).
pub fn stream_output<F>(sink: &dyn OutputSink, label: &str, generate: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut Output) -> Result<(), OutputError>,
{
    let mut output = sink.open(label)?;
    let generated = generate(&mut output);
    let finished = output.finish();
    match generated {
        Err(OutputError::Io(err)) if err.kind() == io::ErrorKind::BrokenPipe => {}
        Err(err) => return Err(err),
        Ok(()) => {}
    }
    finished.map_err(OutputError::from)
}

/// Write adapter that treats a closed downstream as the end of output.
///
/// After the first `BrokenPipe` every write is accepted and discarded.
pub struct ClosedPipeGuard<W> {
    inner: W,
    closed: bool,
}

impl<W: Write> ClosedPipeGuard<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ClosedPipeGuard<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Ok(buf.len());
        }
        match self.inner.write(buf) {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!("output closed by reader");
                self.closed = true;
                Ok(buf.len())
            }
            other => other,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        match self.inner.flush() {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                self.closed = true;
                Ok(())
            }
            other => other,
        }
    }
}
