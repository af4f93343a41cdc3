//! Structured diagnostics for validating reads and writes.
//!
//! Validating operations never fail loudly; instead they report exactly one
//! [`Diagnostic`] to a caller-supplied [`DiagnosticSink`] and return an
//! absent value. There is no process-wide sink: callers choose one at the
//! call site, typically a `Vec<Diagnostic>` in tests or a [`LogSink`].

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// The `log` level used when forwarding to a [`LogSink`].
    pub fn log_level(self) -> log::Level {
        match self {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error | Severity::Critical => log::Level::Error,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// A single reported condition.
///
/// `template` contains `{}` placeholders that are filled, in order, from
/// `args` by [`Diagnostic::message`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub args: Vec<String>,
    pub template: &'static str,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, template: &'static str) -> Self {
        Diagnostic {
            severity,
            code,
            args: Vec::new(),
            template,
        }
    }

    /// Append a positional argument.
    pub fn with_arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// The template with each `{}` replaced by the next argument.
    ///
    /// Surplus placeholders are left as-is; surplus arguments are ignored.
    pub fn message(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut args = self.args.iter();
        let mut pieces = self.template.split("{}").peekable();
        while let Some(piece) = pieces.next() {
            out.push_str(piece);
            if pieces.peek().is_some() {
                match args.next() {
                    Some(arg) => out.push_str(arg),
                    None => out.push_str("{}"),
                }
            }
        }
        out
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.code, self.message())
    }
}

/// Something that accepts diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

/// A sink that forwards to the `log` crate.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    pub target: &'static str,
}

impl LogSink {
    pub fn new(target: &'static str) -> Self {
        LogSink { target }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        LogSink::new(module_path!())
    }
}

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::log!(
            target: self.target,
            diagnostic.severity.log_level(),
            "[{}] {}",
            diagnostic.code,
            diagnostic.message()
        );
    }
}
