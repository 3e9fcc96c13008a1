//! Per-command execution context: cancellation flag, operation label and the sinks used to talk
//! to the user.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide cancellation flag, set on Ctrl-C and polled at loop boundaries.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sets the flag whenever Ctrl-C is pressed until the returned task is aborted.
    #[must_use]
    pub fn watch_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let interrupt = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt requested");
                interrupt.set();
            }
        })
    }
}

/// Receives user-facing warnings.
pub trait Reporter: Send + Sync {
    fn warn(&self, label: &str, message: &str);
}

/// Prints warnings as `label: message` on stderr.
#[derive(Debug, Default)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn warn(&self, label: &str, message: &str) {
        tracing::debug!("{label}: {message}");
        if label.is_empty() {
            eprintln!("{message}");
        } else {
            eprintln!("{label}: {message}");
        }
    }
}

/// Reads one answer line for a question, `None` on end of input.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn ask(&self, question: &str) -> std::io::Result<Option<String>>;
}

/// Asks on stdout and reads the answer from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompter;

#[async_trait]
impl Prompter for StdinPrompter {
    async fn ask(&self, question: &str) -> std::io::Result<Option<String>> {
        let question = question.to_string();
        tokio::task::spawn_blocking(move || {
            use std::io::{BufRead, Write};
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(question.as_bytes())?;
            stdout.flush()?;
            let mut answer = String::new();
            if std::io::stdin().lock().read_line(&mut answer)? == 0 {
                return Ok(None);
            }
            Ok(Some(answer.trim_end_matches(['\n', '\r']).to_string()))
        })
        .await
        .map_err(std::io::Error::other)?
    }
}

/// Everything an engine operation needs besides the filesystems.
#[derive(Clone)]
pub struct Context {
    pub interrupt: Interrupt,
    pub label: String,
    pub reporter: Arc<dyn Reporter>,
    pub prompter: Arc<dyn Prompter>,
    pub show_progress: bool,
}

impl Context {
    #[must_use]
    pub fn new(
        interrupt: Interrupt,
        reporter: Arc<dyn Reporter>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            interrupt,
            label: String::new(),
            reporter,
            prompter,
            show_progress: false,
        }
    }

    /// Copy of this context reporting under another label.
    #[must_use]
    pub fn labeled(&self, label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.interrupt.is_set()
    }

    pub fn warn(&self, message: impl std::fmt::Display) {
        self.reporter.warn(&self.label, &message.to_string());
    }

    /// Reports `error` with its whole context chain.
    pub fn warn_error(&self, error: &anyhow::Error) {
        self.warn(format!("{error:#}"));
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("label", &self.label)
            .field("interrupted", &self.interrupted())
            .field("show_progress", &self.show_progress)
            .finish()
    }
}
