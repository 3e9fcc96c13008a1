//! Copies files and directory trees between the two sides of a session.
//!
//! Transfers are best effort: problems are reported through the [`Context`] and the operation
//! moves on to the next file. When the destination file already exists, an [`OnExist`] policy
//! decides what happens. The policy is passed by mutable reference so that an "all" answer given
//! at the conflict prompt sticks for the rest of the command, including every file of a
//! recursive transfer.

use crate::context::Context;
use crate::fs::{FileHandle, Filesystem, Metadata, Side, Sides, WriteOptions, join};
use crate::progress::ProgressPrinter;
use async_recursion::async_recursion;
use tracing::instrument;

pub const BUFFER_SIZE: usize = 32 * 1024;
/// Bytes re-transferred before the end of a partial destination when resuming.
pub const RESUME_ROLLBACK: u64 = 8192;

const CHOICES: &str = "[O]verwrite [O!] all  [R]esume [R!] all  [S]kip [S!] all  [C]ancel > ";

/// What to do with a destination file that already exists.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OnExist {
    #[default]
    Ask,
    Resume,
    Overwrite,
    Skip,
}

impl std::fmt::Display for OnExist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OnExist::Ask => "ask",
            OnExist::Resume => "resume",
            OnExist::Overwrite => "overwrite",
            OnExist::Skip => "skip",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for OnExist {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ask" => Ok(OnExist::Ask),
            "resume" => Ok(OnExist::Resume),
            "overwrite" => Ok(OnExist::Overwrite),
            "skip" => Ok(OnExist::Skip),
            _ => Err("invalid value, must be one of ask, resume, overwrite, skip".to_string()),
        }
    }
}

/// Answer to the conflict prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// applies to this file only
    Once(OnExist),
    /// applies to this and every later conflict of the command
    All(OnExist),
    Cancel,
}

impl Answer {
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let answer = match input.trim().to_ascii_lowercase().as_str() {
            "o" => Answer::Once(OnExist::Overwrite),
            "o!" => Answer::All(OnExist::Overwrite),
            "r" => Answer::Once(OnExist::Resume),
            "r!" => Answer::All(OnExist::Resume),
            "s" => Answer::Once(OnExist::Skip),
            "s!" => Answer::All(OnExist::Skip),
            "c" => Answer::Cancel,
            _ => return None,
        };
        Some(answer)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_copied: u64,
    pub files_copied: usize,
    pub files_resumed: usize,
    pub files_skipped: usize,
    pub directories_created: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_copied: self.bytes_copied + other.bytes_copied,
            files_copied: self.files_copied + other.files_copied,
            files_resumed: self.files_resumed + other.files_resumed,
            files_skipped: self.files_skipped + other.files_skipped,
            directories_created: self.directories_created + other.directories_created,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes copied: {}\n\
            files copied: {}\n\
            files resumed: {}\n\
            files skipped: {}\n\
            directories created: {}",
            bytesize::ByteSize(self.bytes_copied),
            self.files_copied,
            self.files_resumed,
            self.files_skipped,
            self.directories_created,
        )
    }
}

impl Summary {
    fn skipped() -> Self {
        Self {
            files_skipped: 1,
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CopyError {
    #[error("interrupted")]
    Interrupted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Downloads `src` from the share to local `dst`.
pub async fn get(
    ctx: &Context,
    sides: Sides<'_>,
    src: &str,
    dst: &str,
    on_exist: &mut OnExist,
    recursive: bool,
) -> Summary {
    transfer(ctx, sides, Side::Remote, src, dst, on_exist, recursive).await
}

/// Uploads local `src` to `dst` on the share.
pub async fn put(
    ctx: &Context,
    sides: Sides<'_>,
    src: &str,
    dst: &str,
    on_exist: &mut OnExist,
    recursive: bool,
) -> Summary {
    transfer(ctx, sides, Side::Local, src, dst, on_exist, recursive).await
}

/// Downloads a single remote file to `dst`, replacing whatever is there without asking.
pub async fn get_to(ctx: &Context, sides: Sides<'_>, src: &str, dst: &str) -> Summary {
    let mut on_exist = OnExist::Overwrite;
    transfer_file(ctx, sides, Side::Remote, src, dst, &mut on_exist).await
}

/// Copies `src` on side `from` to `dst` on the other side.
///
/// Directories are copied entry by entry when `recursive` is set.
#[instrument(skip(ctx, sides, on_exist))]
#[async_recursion]
pub async fn transfer<'a>(
    ctx: &Context,
    sides: Sides<'a>,
    from: Side,
    src: &str,
    dst: &str,
    on_exist: &mut OnExist,
    recursive: bool,
) -> Summary
where
    'a: 'async_recursion,
{
    if ctx.interrupted() {
        return Summary::default();
    }
    let source_fs = sides.get(from);
    let metadata = match source_fs.stat(src).await {
        Ok(metadata) => metadata,
        Err(error) => {
            ctx.warn(format!("{src}: {error}"));
            return Summary::default();
        }
    };
    if !metadata.is_dir() {
        return transfer_file(ctx, sides, from, src, dst, on_exist).await;
    }
    if !recursive {
        ctx.warn(format!("{src}: cannot transfer directory non-recursively"));
        return Summary::default();
    }
    let target_fs = sides.get(from.opposite());
    let mut summary = Summary::default();
    match make_path(ctx, target_fs, dst).await {
        Ok(true) => summary.directories_created += 1,
        Ok(false) => {}
        Err(error) if error.kind() == std::io::ErrorKind::Interrupted => return summary,
        Err(error) => {
            ctx.warn(format!("creating {dst}: {error}"));
            return summary;
        }
    }
    let mut listing = match source_fs.open_dir(src).await {
        Ok(listing) => listing,
        Err(error) => {
            ctx.warn(format!("opening {src}: {error}"));
            return summary;
        }
    };
    loop {
        if ctx.interrupted() {
            if let Err(error) = listing.close().await {
                tracing::debug!("closing {src}: {error}");
            }
            return summary;
        }
        let entry = match listing.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(error) => {
                ctx.warn(format!("reading {src}: {error}"));
                break;
            }
        };
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        let entry_src = join(src, &entry.name);
        let entry_dst = join(dst, &entry.name);
        summary = summary
            + transfer(ctx, sides, from, &entry_src, &entry_dst, on_exist, recursive).await;
    }
    if let Err(error) = listing.close().await {
        ctx.warn(format!("closing {src}: {error}"));
    }
    summary
}

/// `mkdir -p`; returns whether the last component had to be created.
async fn make_path(ctx: &Context, fs: &dyn Filesystem, path: &str) -> std::io::Result<bool> {
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return Ok(false);
    }
    for (slash, _) in path.match_indices('/') {
        if ctx.interrupted() {
            return Err(std::io::ErrorKind::Interrupted.into());
        }
        let prefix = &path[..slash];
        if prefix.is_empty() {
            continue;
        }
        match fs.mkdir(prefix).await {
            Ok(()) => tracing::debug!("created {prefix}"),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }
    match fs.mkdir(path).await {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(error) => Err(error),
    }
}

/// Shows the conflict prompt until a valid answer arrives.
///
/// Returns the disposition for this file, `None` when no answer could be read or the user
/// cancelled. "All" answers are stored in `on_exist`.
async fn ask(
    ctx: &Context,
    dst: &str,
    source: &Metadata,
    target: &Metadata,
    on_exist: &mut OnExist,
) -> Option<OnExist> {
    let mut question = format!(
        "\nFile exists: {dst}\nsource: {:>20}  {}\ntarget: {:>20}  {}\n{CHOICES}",
        source.size,
        source.date_string(),
        target.size,
        target.date_string(),
    );
    while !ctx.interrupted() {
        let line = match ctx.prompter.ask(&question).await {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(error) => {
                tracing::debug!("reading answer failed: {error}");
                return None;
            }
        };
        match Answer::parse(&line) {
            Some(Answer::Once(disposition)) => return Some(disposition),
            Some(Answer::All(disposition)) => {
                *on_exist = disposition;
                return Some(disposition);
            }
            Some(Answer::Cancel) => {
                ctx.interrupt.set();
                return None;
            }
            None => question = CHOICES.to_string(),
        }
    }
    None
}

fn resume_refused(ctx: &Context, src: &str) -> Summary {
    ctx.warn(format!(
        "resuming {src}: already as large as or larger than source"
    ));
    Summary::skipped()
}

/// Copies one regular file, handling an existing destination according to `on_exist`.
async fn transfer_file(
    ctx: &Context,
    sides: Sides<'_>,
    from: Side,
    src: &str,
    dst: &str,
    on_exist: &mut OnExist,
) -> Summary {
    let source_fs = sides.get(from);
    let target_fs = sides.get(from.opposite());
    let mut disposition = *on_exist;
    let (target, offset) = loop {
        let options = if disposition == OnExist::Overwrite {
            WriteOptions::overwrite()
        } else {
            WriteOptions::create_new()
        };
        let error = match target_fs.open_write(dst, options).await {
            Ok(file) => break (file, 0),
            Err(error) => error,
        };
        if error.kind() != std::io::ErrorKind::AlreadyExists {
            ctx.warn(format!("opening {dst}: {error}"));
            return Summary::default();
        }
        if disposition == OnExist::Skip {
            tracing::debug!("skipping existing {dst}");
            return Summary::skipped();
        }
        let target_metadata = match target_fs.stat(dst).await {
            Ok(metadata) => metadata,
            Err(error) => {
                ctx.warn(format!("{dst}: {error}"));
                return Summary::default();
            }
        };
        let source_metadata = match source_fs.stat(src).await {
            Ok(metadata) => metadata,
            Err(error) => {
                ctx.warn(format!("{src}: {error}"));
                return Summary::default();
            }
        };
        if disposition == OnExist::Ask {
            match ask(ctx, dst, &source_metadata, &target_metadata, on_exist).await {
                Some(OnExist::Skip) => return Summary::skipped(),
                Some(choice) => {
                    disposition = choice;
                    continue;
                }
                None => {
                    if !ctx.interrupted() {
                        ctx.warn("could not read answer");
                    }
                    return Summary::default();
                }
            }
        }
        // only resume is left
        if source_metadata.size <= target_metadata.size {
            return resume_refused(ctx, src);
        }
        let mut file = match target_fs.open_write(dst, WriteOptions::existing()).await {
            Ok(file) => file,
            Err(error) => {
                ctx.warn(format!("opening {dst}: {error}"));
                return Summary::default();
            }
        };
        let offset = target_metadata.size.saturating_sub(RESUME_ROLLBACK);
        if offset > 0 {
            if let Err(error) = file.seek(offset).await {
                ctx.warn(format!("seeking {dst}: {error}"));
                close_abandoned(file, dst).await;
                return Summary::default();
            }
        }
        break (file, offset);
    };
    let mut source = match source_fs.open_read(src).await {
        Ok(file) => file,
        Err(error) => {
            ctx.warn(format!("opening {src}: {error}"));
            close_abandoned(target, dst).await;
            return Summary::default();
        }
    };
    if offset > 0 {
        if let Err(error) = source.seek(offset).await {
            ctx.warn(format!("seeking {src}: {error}"));
            close_abandoned(source, src).await;
            close_abandoned(target, dst).await;
            return Summary::default();
        }
    }
    let size = match source_fs.stat(src).await {
        Ok(metadata) => metadata.size,
        Err(error) => {
            ctx.warn(format!("{src}: {error}"));
            close_abandoned(source, src).await;
            close_abandoned(target, dst).await;
            return Summary::default();
        }
    };
    let resumed = offset > 0 || disposition == OnExist::Resume;
    let started = std::time::Instant::now();
    match copy_stream(ctx, source, target, offset, size, src).await {
        Ok(bytes) => {
            let elapsed = std::time::Duration::from_millis(started.elapsed().as_millis() as u64);
            tracing::info!(
                "{src} -> {dst}: {} in {}",
                bytesize::ByteSize(bytes),
                humantime::format_duration(elapsed)
            );
            Summary {
                bytes_copied: bytes,
                files_copied: 1,
                files_resumed: usize::from(resumed),
                ..Default::default()
            }
        }
        Err(CopyError::Interrupted) => {
            tracing::debug!("transfer of {src} interrupted");
            Summary::default()
        }
        Err(CopyError::Io(error)) => {
            ctx.warn(format!("transferring {src}: {error}"));
            Summary::default()
        }
    }
}

/// Closes a handle of a transfer that already failed; the first error has been reported.
async fn close_abandoned(handle: Box<dyn FileHandle>, path: &str) {
    if let Err(error) = handle.close().await {
        tracing::debug!("closing {path}: {error}");
    }
}

/// Pumps `source` into `target` until end of file; both handles are closed on every path.
///
/// A write that accepts no bytes ends the copy like end of file does.
async fn copy_stream(
    ctx: &Context,
    mut source: Box<dyn FileHandle>,
    mut target: Box<dyn FileHandle>,
    start_offset: u64,
    size: u64,
    name: &str,
) -> Result<u64, CopyError> {
    let mut printer = if ctx.show_progress {
        ProgressPrinter::start(name, start_offset, size)
    } else {
        None
    };
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut transferred = 0u64;
    let mut failure = None;
    'copy: while !ctx.interrupted() {
        let count = match source.read(&mut buffer).await {
            Ok(0) => break,
            Ok(count) => count,
            Err(error) => {
                failure = Some(error);
                break;
            }
        };
        let mut written = 0;
        while !ctx.interrupted() && written < count {
            match target.write(&buffer[written..count]).await {
                Ok(0) => break 'copy,
                Ok(n) => {
                    written += n;
                    transferred += n as u64;
                    if let Some(printer) = &mut printer {
                        printer.update(transferred);
                    }
                }
                Err(error) => {
                    failure = Some(error);
                    break 'copy;
                }
            }
        }
    }
    let source_closed = source.close().await;
    let target_closed = target.close().await;
    let interrupted = ctx.interrupted();
    let outcome = match failure {
        _ if interrupted => Err(CopyError::Interrupted),
        Some(error) => Err(error.into()),
        None => source_closed
            .and(target_closed)
            .map(|()| transferred)
            .map_err(CopyError::from),
    };
    if let Some(printer) = printer {
        printer.finish(outcome.is_ok());
    }
    outcome
}
