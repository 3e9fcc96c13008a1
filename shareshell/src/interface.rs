//! The read-eval loop: a line editor with tab completion on a terminal, plain line reading
//! otherwise.

use anyhow::Context as _;
use common::complete::{self, Completion, display_matches};
use common::fs::Filesystem;
use common::tokenize::is_quoted;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Editor, Helper};
use std::io::IsTerminal;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::Mutex;

use crate::commands::Table;
use crate::dispatch;
use crate::session::Session;

pub const PROMPT: &str = "shareshell> ";

/// Start of the word ending at `pos`: just after the last blank that is not quoted.
#[must_use]
pub fn word_start(line: &str, pos: usize) -> usize {
    line.as_bytes()[..pos]
        .iter()
        .enumerate()
        .rev()
        .find(|&(i, &b)| (b == b' ' || b == b'\t') && !is_quoted(line, i))
        .map_or(0, |(i, _)| i + 1)
}

/// Editor candidates for a completion.
///
/// A single match replaces the word; several all carry the common prefix as replacement and
/// show their names without the shared directory.
#[must_use]
pub fn candidates(completion: Option<Completion>) -> Vec<Pair> {
    let Some(completion) = completion else {
        return Vec::new();
    };
    if let [only] = completion.matches.as_slice() {
        let mut replacement = completion.insert.clone();
        if completion.append_space {
            replacement.push(' ');
        }
        return vec![Pair {
            display: only.clone(),
            replacement,
        }];
    }
    display_matches(&completion.matches)
        .names
        .into_iter()
        .map(|display| Pair {
            display,
            replacement: completion.insert.clone(),
        })
        .collect()
}

pub struct ShellHelper {
    runtime: Arc<Runtime>,
    session: Arc<Mutex<Session>>,
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = word_start(line, pos);
        let completion = self.runtime.block_on(async {
            let session = self.session.lock().await;
            let ctx = session.context("complete");
            let remote = session
                .fs
                .remote
                .as_ref()
                .map(|share| share as &dyn Filesystem);
            complete::complete(&ctx, &Table, &session.fs.local, remote, line, start, pos).await
        });
        Ok((start, candidates(completion)))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// Runs one line with Ctrl-C turned into the interrupt flag; returns whether the session ended.
fn execute(runtime: &Runtime, session: &Arc<Mutex<Session>>, line: &str) -> bool {
    runtime.block_on(async {
        let mut session = session.lock().await;
        let watcher = session.interrupt.watch_ctrl_c();
        dispatch::execute(&mut session, line).await;
        watcher.abort();
        session.done
    })
}

fn history_path() -> Option<std::path::PathBuf> {
    let mut path = dirs::data_dir()?;
    path.push("shareshell");
    if let Err(error) = std::fs::create_dir_all(&path) {
        tracing::debug!("creating {}: {error}", path.display());
        return None;
    }
    path.push("history");
    Some(path)
}

fn interactive(runtime: Arc<Runtime>, session: Arc<Mutex<Session>>) -> anyhow::Result<()> {
    let config = Config::builder()
        .completion_type(CompletionType::List)
        .auto_add_history(false)
        .build();
    let mut editor: Editor<ShellHelper, DefaultHistory> =
        Editor::with_config(config).context("starting line editor")?;
    editor.set_helper(Some(ShellHelper {
        runtime: runtime.clone(),
        session: session.clone(),
    }));
    let history = history_path();
    if let Some(path) = &history
        && let Err(error) = editor.load_history(path)
    {
        tracing::debug!("loading history from {}: {error}", path.display());
    }
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty()
                    && let Err(error) = editor.add_history_entry(line.as_str())
                {
                    tracing::debug!("adding history entry: {error}");
                }
                if execute(&runtime, &session, &line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(error) => return Err(error).context("reading command line"),
        }
    }
    if let Some(path) = &history
        && let Err(error) = editor.save_history(path)
    {
        tracing::warn!("saving history to {}: {error}", path.display());
    }
    Ok(())
}

/// Reads commands from a pipe or file, without prompt or editing.
fn batch(runtime: &Runtime, session: &Arc<Mutex<Session>>) -> anyhow::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if std::io::stdin()
            .read_line(&mut line)
            .context("reading command line")?
            == 0
        {
            return Ok(());
        }
        if execute(runtime, session, line.trim_end_matches(['\n', '\r'])) {
            return Ok(());
        }
    }
}

/// Reads and executes commands until `quit`, `exit` or end of input.
pub fn run(runtime: Arc<Runtime>, session: Arc<Mutex<Session>>) -> anyhow::Result<()> {
    if std::io::stdin().is_terminal() {
        interactive(runtime, session)
    } else {
        batch(&runtime, &session)
    }
}
