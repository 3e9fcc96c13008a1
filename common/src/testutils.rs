//! Non-interactive sinks and shared checks used by the tests of every crate in the workspace.

use crate::context::{Prompter, Reporter};
use crate::fs::{EntryKind, Filesystem, WriteOptions};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Keeps every warning instead of printing it.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }
}

impl Reporter for RecordingReporter {
    fn warn(&self, label: &str, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("{label}: {message}"));
        }
    }
}

/// Answers prompts from a fixed script and remembers the questions.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<std::collections::VecDeque<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<S: Into<String>>(answers: impl IntoIterator<Item = S>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions
            .lock()
            .map(|questions| questions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&self, question: &str) -> std::io::Result<Option<String>> {
        if let Ok(mut questions) = self.questions.lock() {
            questions.push(question.to_string());
        }
        Ok(self
            .answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front()))
    }
}

/// A `Write` sink whose contents can be read back while a writer is still alive.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        self.data
            .lock()
            .map(|data| String::from_utf8_lossy(&data).into_owned())
            .unwrap_or_default()
    }

    /// Returns the contents and empties the buffer.
    pub fn take(&self) -> String {
        self.data
            .lock()
            .map(|mut data| String::from_utf8_lossy(&std::mem::take(&mut *data)).into_owned())
            .unwrap_or_default()
    }
}

/// A terminal for progress bars that records everything drawn into a [`SharedBuffer`].
#[derive(Debug, Clone)]
pub struct RecordingTerm {
    pub width: u16,
    pub out: SharedBuffer,
}

impl RecordingTerm {
    pub fn new(width: u16) -> Self {
        Self {
            width,
            out: SharedBuffer::default(),
        }
    }

    /// Every line drawn so far, redraws included, in order.
    pub fn frames(&self) -> Vec<String> {
        self.out
            .contents()
            .split(['\r', '\n'])
            .filter(|frame| !frame.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    fn push(&self, text: &str) -> std::io::Result<()> {
        let mut out = self.out.clone();
        std::io::Write::write_all(&mut out, text.as_bytes())
    }
}

impl indicatif::TermLike for RecordingTerm {
    fn width(&self) -> u16 {
        self.width
    }

    fn move_cursor_up(&self, _n: usize) -> std::io::Result<()> {
        Ok(())
    }

    fn move_cursor_down(&self, _n: usize) -> std::io::Result<()> {
        Ok(())
    }

    fn move_cursor_right(&self, _n: usize) -> std::io::Result<()> {
        Ok(())
    }

    fn move_cursor_left(&self, _n: usize) -> std::io::Result<()> {
        Ok(())
    }

    fn write_line(&self, s: &str) -> std::io::Result<()> {
        self.push(s)?;
        self.push("\n")
    }

    fn write_str(&self, s: &str) -> std::io::Result<()> {
        self.push(s)
    }

    fn clear_line(&self) -> std::io::Result<()> {
        self.push("\r")
    }

    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data
            .lock()
            .map_err(|_| std::io::Error::other("buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

async fn write_all(fs: &dyn Filesystem, path: &str, data: &[u8]) -> anyhow::Result<()> {
    let mut file = fs
        .open_write(path, WriteOptions::create_new())
        .await
        .with_context(|| format!("creating {path}"))?;
    let mut written = 0;
    while written < data.len() {
        written += file.write(&data[written..]).await?;
    }
    file.close().await?;
    Ok(())
}

async fn read_all(fs: &dyn Filesystem, path: &str) -> anyhow::Result<Vec<u8>> {
    let mut file = fs
        .open_read(path)
        .await
        .with_context(|| format!("opening {path}"))?;
    let mut data = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    file.close().await?;
    Ok(data)
}

/// Exercises every [`Filesystem`] operation on an empty working directory.
///
/// Both sides run the same checks so that they behave identically for the engines.
pub async fn check_filesystem_conformance(fs: &dyn Filesystem) -> anyhow::Result<()> {
    // files
    write_all(fs, "one.txt", b"hello world").await?;
    let metadata = fs.stat("one.txt").await?;
    assert_eq!(metadata.kind, EntryKind::File);
    assert_eq!(metadata.size, 11);
    assert!(metadata.modified.is_some());
    assert_eq!(read_all(fs, "one.txt").await?, b"hello world");
    // exclusive create refuses an existing file
    let error = fs
        .open_write("one.txt", WriteOptions::create_new())
        .await
        .err()
        .context("exclusive create of an existing file succeeded")?;
    assert_eq!(error.kind(), std::io::ErrorKind::AlreadyExists);
    // writing into an existing file at an offset
    let mut file = fs.open_write("one.txt", WriteOptions::existing()).await?;
    file.seek(6).await?;
    file.write(b"WORLD").await?;
    file.close().await?;
    assert_eq!(read_all(fs, "one.txt").await?, b"hello WORLD");
    // truncation
    let file = fs.open_write("one.txt", WriteOptions::overwrite()).await?;
    file.close().await?;
    assert_eq!(fs.stat("one.txt").await?.size, 0);
    // opening a missing file for writing without create fails
    assert!(fs.open_write("missing", WriteOptions::existing()).await.is_err());
    assert_eq!(
        fs.stat("missing").await.err().map(|error| error.kind()),
        Some(std::io::ErrorKind::NotFound)
    );
    // directories
    fs.mkdir("dir").await?;
    assert!(fs.is_dir("dir").await);
    assert!(!fs.is_dir("one.txt").await);
    assert_eq!(
        fs.mkdir("dir").await.err().map(|error| error.kind()),
        Some(std::io::ErrorKind::AlreadyExists)
    );
    write_all(fs, "dir/two.txt", b"2").await?;
    fs.mkdir("dir/sub").await?;
    let mut listing = fs.open_dir("dir").await?;
    let mut names = Vec::new();
    while let Some(entry) = listing.next_entry().await? {
        if entry.name != "." && entry.name != ".." {
            names.push((entry.name, entry.kind));
        }
    }
    listing.close().await?;
    names.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        names,
        vec![
            ("sub".to_string(), EntryKind::Directory),
            ("two.txt".to_string(), EntryKind::File),
        ]
    );
    assert!(fs.open_dir("one.txt").await.is_err());
    assert!(fs.open_dir("nowhere").await.is_err());
    // rename, unlink, rmdir
    fs.rename("one.txt", "dir/one.txt").await?;
    assert!(!fs.exists("one.txt").await);
    assert!(fs.exists("dir/one.txt").await);
    assert!(fs.rmdir("dir").await.is_err());
    fs.unlink("dir/one.txt").await?;
    fs.unlink("dir/two.txt").await?;
    fs.rmdir("dir/sub").await?;
    fs.rmdir("dir").await?;
    assert!(!fs.exists("dir").await);
    Ok(())
}
