//! Shell-style glob expansion over either side of a session.
//!
//! Tokens arrive in the escaped flavor produced by [`crate::tokenize::tokenize_escaped`]: a
//! backslash in front of a pattern character makes it literal. A token containing at least one
//! unescaped `*`, `?`, `[` or `]` is expanded component by component:
//!
//! - literal components are only checked for existence,
//! - pattern components are matched against every entry of the directory reached so far, with
//!   entries starting with `.` matched only by patterns that start with a literal `.`.
//!
//! Matches of one token are sorted and replace the token; a token without matches is kept as
//! written (unescaped). The command word (token 0) is never expanded.
//!
//! # Examples
//!
//! ```text
//! *.txt          a.txt b.txt
//! src/*/mod.rs   src/fs/mod.rs src/glob/mod.rs
//! d*/            dir/            (trailing slash matches directories only)
//! '*'.txt        *.txt           (quoted, so literal)
//! ```

use crate::context::Context;
use crate::fs::{Filesystem, join};
use crate::tokenize::unescape;
use async_recursion::async_recursion;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("handling directories in globbing: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("interrupted")]
    Interrupted,
}

const METACHARS: &[char] = &['*', '?', '[', ']'];

/// Tells whether `token` contains a pattern character not preceded by a backslash.
#[must_use]
pub fn is_globbable(token: &str) -> bool {
    let mut escaped = false;
    for c in token.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if METACHARS.contains(&c) {
            return true;
        }
    }
    false
}

/// Matches a single path component against directory entry names.
enum ComponentMatcher {
    Pattern(globset::GlobMatcher),
    /// patterns globset rejects are compared literally
    Literal(String),
}

impl ComponentMatcher {
    fn new(pattern: &str) -> Self {
        let prepared = prepare_pattern(pattern);
        match globset::GlobBuilder::new(&prepared)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
        {
            Ok(glob) => Self::Pattern(glob.compile_matcher()),
            Err(error) => {
                tracing::debug!("pattern {pattern:?} taken literally: {error}");
                Self::Literal(unescape(pattern))
            }
        }
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Pattern(matcher) => matcher.is_match(name),
            Self::Literal(literal) => literal == name,
        }
    }
}

/// Rewrites a shell pattern into globset syntax: braces are literal in the shell, and runs of `*`
/// collapse into one.
fn prepare_pattern(pattern: &str) -> String {
    let mut prepared = String::with_capacity(pattern.len() + 4);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                prepared.push('\\');
                if let Some(escaped) = chars.next() {
                    prepared.push(escaped);
                }
            }
            '{' | '}' => {
                prepared.push('\\');
                prepared.push(c);
            }
            '*' if prepared.ends_with('*') && !prepared.ends_with("\\*") => {}
            _ => prepared.push(c),
        }
    }
    prepared
}

/// A leading period must be matched explicitly.
fn matches_leading_period(pattern: &str, name: &str) -> bool {
    !name.starts_with('.') || pattern.starts_with('.') || pattern.starts_with("\\.")
}

/// Splits off the first component of `pattern`; repeated slashes after it are skipped.
///
/// The remainder is `None` when the pattern has no further `/`.
fn split_component(pattern: &str) -> (&str, Option<&str>) {
    match pattern.find('/') {
        Some(slash) => (
            &pattern[..slash],
            Some(pattern[slash..].trim_start_matches('/')),
        ),
        None => (pattern, None),
    }
}

/// Expands `pattern` relative to `path`, appending every match to `matches`.
///
/// Directories in the result carry a trailing `/`. A path that does not exist, or is not a
/// directory where one is needed, ends that branch quietly.
#[async_recursion]
pub async fn match_pattern(
    ctx: &Context,
    fs: &dyn Filesystem,
    path: &str,
    pattern: Option<&str>,
    matches: &mut Vec<String>,
) -> Result<(), Error> {
    if ctx.interrupted() {
        return Err(Error::Interrupted);
    }
    let Some(pattern) = pattern else {
        let mut found = path.to_string();
        if !found.ends_with('/') && fs.is_dir(path).await {
            found.push('/');
        }
        matches.push(found);
        return Ok(());
    };
    if path.is_empty() && pattern.starts_with('/') {
        let rest = pattern.trim_start_matches('/');
        let rest = if rest.is_empty() { None } else { Some(rest) };
        return match_pattern(ctx, fs, "/", rest, matches).await;
    }
    let (component, rest) = split_component(pattern);
    if component.is_empty() {
        // trailing slash, only directories qualify
        if fs.is_dir(path).await {
            matches.push(join(path, ""));
        }
        return Ok(());
    }
    if !is_globbable(component) {
        let next = join(path, &unescape(component));
        if !fs.exists(&next).await {
            return Ok(());
        }
        return match_pattern(ctx, fs, &next, rest, matches).await;
    }
    let directory = if path.is_empty() { "." } else { path };
    let mut listing = match fs.open_dir(directory).await {
        Ok(listing) => listing,
        Err(error)
            if matches!(
                error.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
            ) =>
        {
            return Ok(());
        }
        Err(source) => {
            return Err(Error::Directory {
                path: directory.to_string(),
                source,
            });
        }
    };
    let matcher = ComponentMatcher::new(component);
    let mut outcome = Ok(());
    loop {
        if ctx.interrupted() {
            outcome = Err(Error::Interrupted);
            break;
        }
        let entry = match listing.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                outcome = Err(Error::Directory {
                    path: directory.to_string(),
                    source,
                });
                break;
            }
        };
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        if !matches_leading_period(component, &entry.name) || !matcher.is_match(&entry.name) {
            continue;
        }
        let next = join(path, &entry.name);
        if let Err(error) = match_pattern(ctx, fs, &next, rest, matches).await {
            outcome = Err(error);
            break;
        }
    }
    let closed = listing.close().await;
    outcome?;
    closed.map_err(|source| Error::Directory {
        path: directory.to_string(),
        source,
    })
}

/// Expands every token after the command word.
///
/// Returns a new sequence; the command word and literal tokens keep their positions.
#[tracing::instrument(skip(ctx, fs))]
pub async fn expand(
    ctx: &Context,
    fs: &dyn Filesystem,
    tokens: &[String],
) -> Result<Vec<String>, Error> {
    let mut expanded = Vec::with_capacity(tokens.len());
    let mut tokens = tokens.iter();
    if let Some(command) = tokens.next() {
        expanded.push(command.clone());
    }
    for token in tokens {
        if !is_globbable(token) {
            expanded.push(unescape(token));
            continue;
        }
        let mut matches = Vec::new();
        match_pattern(ctx, fs, "", Some(token), &mut matches).await?;
        if matches.is_empty() {
            tracing::debug!("no match for {token:?}, keeping it");
            expanded.push(unescape(token));
        } else {
            matches.sort();
            expanded.extend(matches);
        }
    }
    Ok(expanded)
}
