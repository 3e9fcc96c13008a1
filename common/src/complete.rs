//! Tab completion of command names and file names.
//!
//! The editor reports the byte span of the word under the cursor. The line is tokenized again in
//! partial mode and completion is only offered when the tokenizer finds a word at exactly that
//! span; otherwise the editor would replace the wrong part of the line. In particular nothing is
//! offered while the cursor sits inside a word.

use crate::columns::Columns;
use crate::context::Context;
use crate::fs::{Filesystem, Side};
use crate::glob::match_pattern;
use crate::tokenize::{quote, tokenize_partial};

/// What completion needs to know about the command table.
pub trait Commands: Send + Sync {
    /// All command names.
    fn names(&self) -> Vec<&str>;

    /// Whether `command` needs an open connection; `None` for unknown commands.
    fn requires_connection(&self, command: &str) -> Option<bool>;
}

/// Result of completing one word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Quoted text replacing the word under the cursor.
    pub insert: String,
    /// Whether a blank should follow the inserted text: only after a single match that is not a
    /// directory.
    pub append_space: bool,
    /// Every candidate, sorted.
    pub matches: Vec<String>,
}

/// Side whose files complete the arguments of `command`, `None` when nothing should be offered.
#[must_use]
pub fn completion_side(commands: &dyn Commands, command: &str, connected: bool) -> Option<Side> {
    if command == "put" {
        return Some(Side::Local);
    }
    match commands.requires_connection(command) {
        Some(true) if connected => Some(Side::Remote),
        Some(true) => None,
        _ => Some(Side::Local),
    }
}

fn common_prefix<'a>(first: &'a str, last: &str) -> &'a str {
    let len = first
        .char_indices()
        .zip(last.chars())
        .take_while(|((_, a), b)| a == b)
        .last()
        .map_or(0, |((index, c), _)| index + c.len_utf8());
    &first[..len]
}

/// Completes the word spanning bytes `start..end` of `line`.
///
/// `remote` is `None` while no share is open.
pub async fn complete(
    ctx: &Context,
    commands: &dyn Commands,
    local: &dyn Filesystem,
    remote: Option<&dyn Filesystem>,
    line: &str,
    start: usize,
    end: usize,
) -> Option<Completion> {
    let partial = tokenize_partial(line, start, end);
    let Some(active) = partial.active else {
        tracing::debug!("no word at {start}..{end} of {line:?}");
        return None;
    };
    let word = partial.tokens.get(active)?;
    let mut matches = if active == 0 {
        commands
            .names()
            .into_iter()
            .filter(|name| name.starts_with(word.as_str()))
            .map(str::to_string)
            .collect()
    } else {
        let command = partial.tokens.first()?;
        let fs = match completion_side(commands, command, remote.is_some())? {
            Side::Local => local,
            Side::Remote => remote?,
        };
        let mut found = Vec::new();
        let pattern = format!("{word}*");
        if let Err(error) = match_pattern(ctx, fs, "", Some(&pattern), &mut found).await {
            tracing::debug!("completing {word:?}: {error}");
            return None;
        }
        found
    };
    if matches.is_empty() {
        return None;
    }
    matches.sort();
    let first = matches.first()?;
    let last = matches.last()?;
    let prefix = common_prefix(first, last);
    Some(Completion {
        insert: quote(prefix),
        append_space: matches.len() == 1 && !prefix.ends_with('/'),
        matches,
    })
}

/// Candidates prepared for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Leading directory shared by every candidate, including its final `/`.
    pub directory: Option<String>,
    /// Candidates with `directory` removed.
    pub names: Vec<String>,
}

/// Strips the leading directory all (sorted) `matches` share.
#[must_use]
pub fn display_matches(matches: &[String]) -> Listing {
    let (Some(first), Some(last)) = (matches.first(), matches.last()) else {
        return Listing {
            directory: None,
            names: Vec::new(),
        };
    };
    let prefix = common_prefix(first, last);
    match prefix.rfind('/') {
        Some(slash) => Listing {
            directory: Some(prefix[..=slash].to_string()),
            names: matches
                .iter()
                .map(|name| name[slash + 1..].to_string())
                .collect(),
        },
        None => Listing {
            directory: None,
            names: matches.to_vec(),
        },
    }
}

/// Renders candidates in columns, under a header naming their common directory.
#[must_use]
pub fn render(matches: &[String], width: usize) -> String {
    let listing = display_matches(matches);
    let mut out = String::new();
    if let Some(directory) = &listing.directory {
        out.push_str(directory);
        out.push('\n');
    }
    let columns: Columns = listing.names.into_iter().collect();
    out.push_str(&columns.render(width));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Interrupt;
    use crate::fs::LocalFs;
    use crate::testutils::{RecordingReporter, ScriptedPrompter};
    use std::sync::Arc;

    struct Table;

    impl Commands for Table {
        fn names(&self) -> Vec<&str> {
            vec!["cd", "close", "get", "lcd", "ls", "put"]
        }

        fn requires_connection(&self, command: &str) -> Option<bool> {
            match command {
                "cd" | "close" | "get" | "ls" | "put" => Some(true),
                "lcd" => Some(false),
                _ => None,
            }
        }
    }

    fn context() -> Context {
        Context::new(
            Interrupt::new(),
            Arc::new(RecordingReporter::default()),
            Arc::new(ScriptedPrompter::default()),
        )
    }

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn side_follows_command() {
        assert_eq!(completion_side(&Table, "put", false), Some(Side::Local));
        assert_eq!(completion_side(&Table, "get", true), Some(Side::Remote));
        assert_eq!(completion_side(&Table, "get", false), None);
        assert_eq!(completion_side(&Table, "lcd", true), Some(Side::Local));
        assert_eq!(completion_side(&Table, "bogus", true), Some(Side::Local));
    }

    #[tokio::test]
    async fn completes_command_names() {
        let local = LocalFs::new();
        let completion = complete(&context(), &Table, &local, None, "c", 0, 1).await;
        assert_eq!(
            completion,
            Some(Completion {
                insert: "c".to_string(),
                append_space: false,
                matches: strings(&["cd", "close"]),
            })
        );
        let completion = complete(&context(), &Table, &local, None, "lc", 0, 2).await;
        assert_eq!(completion.map(|c| c.insert), Some("lcd".to_string()));
        assert_eq!(complete(&context(), &Table, &local, None, "x", 0, 1).await, None);
    }

    #[tokio::test]
    async fn completes_files_on_the_right_side() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::create_dir(tmp.path().join("local"))?;
        std::fs::create_dir(tmp.path().join("remote"))?;
        std::fs::write(tmp.path().join("local/upload.txt"), "")?;
        std::fs::write(tmp.path().join("remote/download.txt"), "")?;
        let local = LocalFs::rooted(tmp.path().join("local"));
        let remote = LocalFs::rooted(tmp.path().join("remote"));
        let ctx = context();
        let put = complete(&ctx, &Table, &local, Some(&remote), "put u", 4, 5).await;
        assert_eq!(put.map(|c| c.insert), Some("upload.txt".to_string()));
        let get = complete(&ctx, &Table, &local, Some(&remote), "get d", 4, 5).await;
        assert_eq!(get.map(|c| c.insert), Some("download.txt".to_string()));
        let offline = complete(&ctx, &Table, &local, None, "get d", 4, 5).await;
        assert_eq!(offline, None);
        Ok(())
    }

    #[tokio::test]
    async fn directory_match_keeps_completing() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::create_dir(tmp.path().join("docs"))?;
        let local = LocalFs::rooted(tmp.path());
        let completion = complete(&context(), &Table, &local, None, "lcd d", 4, 5).await;
        assert_eq!(
            completion,
            Some(Completion {
                insert: "docs/".to_string(),
                append_space: false,
                matches: strings(&["docs/"]),
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn common_prefix_is_quoted() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::write(tmp.path().join("my file one"), "")?;
        std::fs::write(tmp.path().join("my file two"), "")?;
        let local = LocalFs::rooted(tmp.path());
        let completion = complete(&context(), &Table, &local, None, "lcd my", 4, 6).await;
        let completion = completion.ok_or_else(|| anyhow::anyhow!("no completion"))?;
        assert_eq!(completion.insert, "'my file '");
        assert!(!completion.append_space);
        assert_eq!(completion.matches, strings(&["my file one", "my file two"]));
        // the quoted prefix completes again once the editor inserted it
        let again = complete(&context(), &Table, &local, None, "lcd 'my file '", 4, 14).await;
        assert_eq!(again.map(|c| c.matches.len()), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn cursor_inside_word_offers_nothing() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::write(tmp.path().join("foobar"), "")?;
        let local = LocalFs::rooted(tmp.path());
        assert_eq!(
            complete(&context(), &Table, &local, None, "lcd foobar", 4, 7).await,
            None
        );
        Ok(())
    }

    #[test]
    fn listing_strips_common_directory() {
        let listing = display_matches(&strings(&["src/fs/a.rs", "src/fs/b.rs", "src/fs/c/"]));
        assert_eq!(listing.directory.as_deref(), Some("src/fs/"));
        assert_eq!(listing.names, strings(&["a.rs", "b.rs", "c/"]));
        let listing = display_matches(&strings(&["alpha", "beta"]));
        assert_eq!(listing.directory, None);
        assert_eq!(listing.names, strings(&["alpha", "beta"]));
        let listing = display_matches(&strings(&["dir/x", "dirt/y"]));
        assert_eq!(listing.directory, None);
    }

    #[test]
    fn render_puts_directory_above_columns() {
        let rendered = render(&strings(&["a/one", "a/two"]), 80);
        assert_eq!(rendered, "a/\none  two\n");
    }
}
