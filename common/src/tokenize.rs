//! Shell-like tokenizer for command lines.
//!
//! Words are separated by runs of blanks (space or tab). A single quote opens a quoted span
//! which runs until the next unpaired single quote; inside a span two consecutive quotes stand
//! for one literal quote character. A word may mix quoted and unquoted parts: `a'b c'd` is the
//! single word `ab cd`.
//!
//! Two output flavors exist:
//!
//! - **escaped** ([`tokenize_escaped`]): pattern characters (`\ ? * [ ]`) found inside quoted
//!   spans are prefixed with a backslash, so the glob engine treats them literally.
//! - **unescaped** ([`tokenize`]): the escaped flavor with backslash escapes resolved, used for
//!   arguments that are never glob-expanded.
//!
//! [`tokenize_partial`] never fails: an unterminated quote is closed at the end of the line and
//! the token under the cursor is reported so that tab completion can work on it.

/// Characters escaped inside quoted spans.
const PATTERN_CHARS: &[u8] = b"\\?*[]";

/// Characters that force [`quote`] to wrap a value.
const QUOTE_TRIGGERS: &[u8] = b" \t'\\*?[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unbalanced quote")]
    UnbalancedQuote,
}

/// Tokens of a line being edited and the index of the token under the cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partial {
    pub tokens: Vec<String>,
    /// `None` when the cursor span does not line up with a token boundary
    pub active: Option<usize>,
}

fn is_blank(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

fn skip_blanks(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| !is_blank(b))
        .map_or(bytes.len(), |offset| from + offset)
}

fn find_quote(bytes: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|&b| b == b'\'')
        .map(|offset| from + offset)
}

/// Finds the quote closing a span whose content starts at `from`, skipping `''` pairs.
fn closing_quote(bytes: &[u8], from: usize) -> Option<usize> {
    let mut candidate = find_quote(bytes, from);
    while let Some(pos) = candidate {
        if bytes.get(pos + 1) != Some(&b'\'') {
            return Some(pos);
        }
        candidate = find_quote(bytes, pos + 2);
    }
    None
}

/// Splits a line into raw (still quoted) words.
fn split(line: &str, cursor: Option<(usize, usize)>) -> Result<(Vec<String>, Option<usize>), Error> {
    let mut line = line.to_string();
    let mut words = Vec::new();
    let mut active = None;
    let mut quote_added = false;
    let mut begin = skip_blanks(line.as_bytes(), 0);
    if cursor.is_none() && begin == line.len() {
        return Ok((words, active));
    }
    let mut pos = begin;
    loop {
        let bytes = line.as_bytes();
        pos = bytes[pos..]
            .iter()
            .position(|&b| is_blank(b) || b == b'\'')
            .map_or(bytes.len(), |offset| pos + offset);
        if pos < bytes.len() && bytes[pos] == b'\'' {
            pos = match closing_quote(bytes, pos + 1) {
                Some(close) => close + 1,
                None if cursor.is_some() => {
                    line.push('\'');
                    quote_added = true;
                    line.len()
                }
                None => return Err(Error::UnbalancedQuote),
            };
            continue;
        }
        words.push(line[begin..pos].to_string());
        if let Some((start, end)) = cursor {
            if begin == start && pos - usize::from(quote_added) == end {
                active = Some(words.len() - 1);
            }
        }
        pos = skip_blanks(line.as_bytes(), pos);
        begin = pos;
        if let Some((start, end)) = cursor {
            // cursor sits on an empty word after trailing blanks
            if pos != 0 && pos == line.len() && start == end && pos == start {
                words.push(String::new());
                active = Some(words.len() - 1);
            }
        }
        if pos == line.len() {
            break;
        }
    }
    Ok((words, active))
}

/// Removes quoting from a raw word, backslash-escaping pattern characters found inside quotes.
fn unquote_escaped(word: &str) -> String {
    let mut result = String::with_capacity(word.len());
    let mut in_quote = false;
    let mut chars = word.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if in_quote && chars.peek() == Some(&'\'') {
                chars.next();
                result.push('\'');
            } else {
                in_quote = !in_quote;
            }
            continue;
        }
        if in_quote && c.is_ascii() && PATTERN_CHARS.contains(&(c as u8)) {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

/// Splits `line` into words in the escaped flavor, ready for glob expansion.
pub fn tokenize_escaped(line: &str) -> Result<Vec<String>, Error> {
    let (words, _) = split(line, None)?;
    Ok(words.iter().map(|word| unquote_escaped(word)).collect())
}

/// Splits `line` into literal words.
pub fn tokenize(line: &str) -> Result<Vec<String>, Error> {
    let (words, _) = split(line, None)?;
    Ok(words
        .iter()
        .map(|word| unescape(&unquote_escaped(word)))
        .collect())
}

/// Tokenizes a line that is still being typed.
///
/// `start..end` is the byte span of the word under the cursor. Tokens come in the escaped flavor.
pub fn tokenize_partial(line: &str, start: usize, end: usize) -> Partial {
    match split(line, Some((start, end))) {
        Ok((words, active)) => Partial {
            tokens: words.iter().map(|word| unquote_escaped(word)).collect(),
            active,
        },
        // partial mode closes open quotes instead of failing
        Err(_) => Partial::default(),
    }
}

/// Resolves backslash escapes: `\x` becomes `x`, a trailing lone backslash is dropped.
pub fn unescape(token: &str) -> String {
    let mut result = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Quotes a literal value so that tokenizing the result yields the value back.
///
/// Values without blanks, quotes, backslashes or pattern characters are returned as they are.
pub fn quote(value: &str) -> String {
    if !value.bytes().any(|b| QUOTE_TRIGGERS.contains(&b)) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "''"))
}

/// Tells whether byte `index` of `line` lies inside a quoted span.
///
/// The quote characters delimiting a span are not themselves quoted. An unterminated span extends
/// to the end of the line.
pub fn is_quoted(line: &str, index: usize) -> bool {
    let bytes = line.as_bytes();
    let mut from = 0;
    while let Some(open) = find_quote(bytes, from) {
        if index <= open {
            return false;
        }
        match closing_quote(bytes, open + 1) {
            None => return true,
            Some(close) if index < close => return true,
            Some(close) => from = close + 1,
        }
    }
    false
}
