//! Hierarchical, leveled progress reporting.
//!
//! A [`Context`] prints lines prefixed with their level and indented by
//! depth. Nested calls receive a [`Context::sub`] one level deeper, so the
//! output of a call tree reads as an outline:
//!
//! ```text
//! 00: computing features
//! 01:   read cache for 'normalize' from /tmp/memo/normalize_3a9f.memo
//! ```

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use memo_config::Verbosity;

/// Indentation per level, in spaces.
pub const DEFAULT_INDENT: usize = 2;

/// Where report lines go.
#[derive(Debug, Clone, Default)]
pub enum ReportSink {
    /// Standard output.
    #[default]
    Stdout,
    /// A shared in-memory buffer.
    Buffer(Arc<Mutex<String>>),
}

impl ReportSink {
    /// A new in-memory sink and a handle to read its contents.
    pub fn buffer() -> (Self, Arc<Mutex<String>>) {
        let buf = Arc::new(Mutex::new(String::new()));
        (ReportSink::Buffer(Arc::clone(&buf)), buf)
    }

    fn emit(&self, text: &str) {
        match self {
            ReportSink::Stdout => {
                let mut out = std::io::stdout().lock();
                // Reports are best effort; a closed stdout must not fail the call.
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            ReportSink::Buffer(buf) => {
                buf.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_str(text);
            }
        }
    }
}

/// A reporting handle with a verbosity limit and a current level.
#[derive(Debug, Clone)]
pub struct Context {
    verbose: Verbosity,
    level: u32,
    indent: usize,
    sink: ReportSink,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Verbosity::All)
    }
}

impl Context {
    /// A level-0 context writing to stdout.
    pub fn new(verbose: Verbosity) -> Self {
        Self {
            verbose,
            level: 0,
            indent: DEFAULT_INDENT,
            sink: ReportSink::Stdout,
        }
    }

    /// A context that reports nothing.
    pub fn quiet() -> Self {
        Self::new(Verbosity::Quiet)
    }

    /// A context that reports everything.
    pub fn all() -> Self {
        Self::new(Verbosity::All)
    }

    /// Sends output to `sink` instead.
    pub fn with_sink(mut self, sink: ReportSink) -> Self {
        self.sink = sink;
        self
    }

    /// Uses `indent` spaces per level.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// The verbosity limit.
    pub fn verbose(&self) -> Verbosity {
        self.verbose
    }

    /// The current level; the root context is level 0.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Whether nothing is ever reported.
    pub fn is_quiet(&self) -> bool {
        self.verbose == Verbosity::Quiet
    }

    /// A context `add_level` levels deeper, sharing the sink.
    pub fn sub(&self, add_level: u32) -> Self {
        Self {
            level: self.level + add_level,
            ..self.clone()
        }
    }

    /// Whether a report `add_level` below the current level would print.
    pub fn shall_report(&self, add_level: u32) -> bool {
        self.verbose.allows(self.level + add_level)
    }

    /// A copy whose limit is the stricter of this and `other`'s limit.
    pub fn limit(&self, other: Verbosity) -> Self {
        let verbose = match (self.verbose, other) {
            (Verbosity::Quiet, _) | (_, Verbosity::Quiet) => Verbosity::Quiet,
            (Verbosity::All, v) | (v, Verbosity::All) => v,
            (Verbosity::Level(a), Verbosity::Level(b)) => Verbosity::Level(a.min(b)),
        };
        Self {
            verbose,
            ..self.clone()
        }
    }

    fn prefix(&self, level: u32) -> String {
        format!("{level:02}: {}", " ".repeat(self.indent * level as usize))
    }

    /// Formats `message` for `add_level` below the current level, prefixing
    /// every line; `None` if it would not be reported.
    pub fn fmt(&self, add_level: u32, message: impl fmt::Display) -> Option<String> {
        if !self.shall_report(add_level) {
            return None;
        }
        let prefix = self.prefix(self.level + add_level);
        let text = message.to_string();
        let mut out = String::with_capacity(text.len() + prefix.len());
        for line in text.lines() {
            out.push_str(&prefix);
            out.push_str(line);
            out.push('\n');
        }
        if text.is_empty() {
            out.push('\n');
        }
        Some(out)
    }

    /// Reports `message` `add_level` below the current level.
    pub fn report(&self, add_level: u32, message: impl fmt::Display) {
        if let Some(text) = self.fmt(add_level, message) {
            self.sink.emit(&text);
        }
    }

    /// Reports `message` at the current level.
    pub fn write(&self, message: impl fmt::Display) {
        self.report(0, message);
    }
}
