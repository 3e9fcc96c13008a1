//! Everything a command can see and change: both filesystems, variables, aliases and the sinks
//! output and warnings go to.

use common::config::SessionConfig;
use common::context::{Interrupt, Prompter, Reporter, StderrReporter, StdinPrompter};
use common::fs::{Filesystem, LocalFs};
use common::{Context, Side, Sides};
use remote::{MountResolver, ShareFs};
use std::sync::Arc;

use crate::alias::Aliases;
use crate::vars::Variables;

/// Label of warnings not tied to a command.
pub const PROGRAM: &str = "shareshell";

/// The local machine and, once `open` succeeded, the share.
#[derive(Debug, Default)]
pub struct Filesystems {
    pub local: LocalFs,
    pub remote: Option<ShareFs>,
}

impl Filesystems {
    #[must_use]
    pub fn connected(&self) -> bool {
        self.remote.is_some()
    }

    /// Both sides, `None` while not connected.
    #[must_use]
    pub fn sides(&self) -> Option<Sides<'_>> {
        self.remote.as_ref().map(|remote| Sides {
            local: &self.local,
            remote,
        })
    }

    #[must_use]
    pub fn side(&self, side: Side) -> Option<&dyn Filesystem> {
        match side {
            Side::Local => Some(&self.local),
            Side::Remote => self.remote.as_ref().map(|remote| remote as &dyn Filesystem),
        }
    }

    /// The share, or an error naming the missing connection.
    pub fn share(&self) -> anyhow::Result<&ShareFs> {
        self.remote
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("not connected"))
    }
}

pub struct Session {
    pub fs: Filesystems,
    pub vars: Variables,
    pub aliases: Aliases,
    pub resolver: MountResolver,
    pub interrupt: Interrupt,
    pub reporter: Arc<dyn Reporter>,
    pub prompter: Arc<dyn Prompter>,
    /// where command output goes
    pub out: Box<dyn std::io::Write + Send>,
    /// fixed terminal width, measured on every use when `None`
    pub width: Option<usize>,
    /// set by `quit` and `exit`
    pub done: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("fs", &self.fs)
            .field("vars", &self.vars)
            .field("aliases", &self.aliases)
            .field("resolver", &self.resolver)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A session talking to the terminal.
    #[must_use]
    pub fn new(config: &SessionConfig, resolver: MountResolver) -> Self {
        Self {
            fs: Filesystems::default(),
            vars: Variables::from(config),
            aliases: Aliases::default(),
            resolver,
            interrupt: Interrupt::new(),
            reporter: Arc::new(StderrReporter),
            prompter: Arc::new(StdinPrompter),
            out: Box::new(std::io::stdout()),
            width: None,
            done: false,
        }
    }

    #[must_use]
    pub fn with_local(mut self, local: LocalFs) -> Self {
        self.fs.local = local;
        self
    }

    #[must_use]
    pub fn with_output(mut self, out: impl std::io::Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Context for running command `label`.
    #[must_use]
    pub fn context(&self, label: &str) -> Context {
        let mut ctx = Context::new(
            self.interrupt.clone(),
            self.reporter.clone(),
            self.prompter.clone(),
        )
        .labeled(label);
        ctx.show_progress = self.vars.show_progress;
        ctx
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width.unwrap_or_else(common::progress::terminal_width)
    }
}
