//! Filesystem capability shared by the local machine and the remote share.
//!
//! The glob and transfer engines only talk to [`Filesystem`]; which implementation they get is
//! decided by the caller through [`Side`].

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<std::time::SystemTime>,
}

impl Metadata {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Modification date as `ls` prints it: time of day within the last year, year otherwise.
    #[must_use]
    pub fn date_string(&self) -> String {
        let Some(modified) = self.modified else {
            return "?".to_string();
        };
        let date: chrono::DateTime<chrono::Local> = modified.into();
        let age = chrono::Local::now().signed_duration_since(date);
        if age > chrono::Duration::days(365) {
            date.format("%b %d  %Y").to_string()
        } else {
            date.format("%b %d %H:%M").to_string()
        }
    }

    fn from_std(metadata: &std::fs::Metadata) -> Self {
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Self {
            kind,
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// How [`Filesystem::open_write`] treats an existing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub create: bool,
    /// fail with `AlreadyExists` if the file exists
    pub exclusive: bool,
    pub truncate: bool,
}

impl WriteOptions {
    #[must_use]
    pub fn create_new() -> Self {
        Self {
            create: true,
            exclusive: true,
            truncate: false,
        }
    }

    #[must_use]
    pub fn overwrite() -> Self {
        Self {
            create: true,
            exclusive: false,
            truncate: true,
        }
    }

    #[must_use]
    pub fn existing() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait FileHandle: Send {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    async fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
    async fn seek(&mut self, offset: u64) -> std::io::Result<()>;
    async fn close(self: Box<Self>) -> std::io::Result<()>;
}

#[async_trait]
pub trait DirHandle: Send {
    /// Returns the next entry, `None` at the end of the listing.
    async fn next_entry(&mut self) -> std::io::Result<Option<DirEntry>>;
    async fn close(self: Box<Self>) -> std::io::Result<()>;
}

/// Operations every side must support.
///
/// Paths use `/` as separator. Relative paths are resolved against the side's working directory.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn stat(&self, path: &str) -> std::io::Result<Metadata>;
    async fn open_read(&self, path: &str) -> std::io::Result<Box<dyn FileHandle>>;
    async fn open_write(
        &self,
        path: &str,
        options: WriteOptions,
    ) -> std::io::Result<Box<dyn FileHandle>>;
    async fn open_dir(&self, path: &str) -> std::io::Result<Box<dyn DirHandle>>;
    async fn mkdir(&self, path: &str) -> std::io::Result<()>;
    async fn rmdir(&self, path: &str) -> std::io::Result<()>;
    async fn rename(&self, from: &str, to: &str) -> std::io::Result<()>;
    async fn unlink(&self, path: &str) -> std::io::Result<()>;

    async fn is_dir(&self, path: &str) -> bool {
        self.stat(path).await.is_ok_and(|metadata| metadata.is_dir())
    }

    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }
}

/// Both sides of a session, picked by [`Side`].
#[derive(Clone, Copy)]
pub struct Sides<'a> {
    pub local: &'a dyn Filesystem,
    pub remote: &'a dyn Filesystem,
}

impl<'a> Sides<'a> {
    #[must_use]
    pub fn get(&self, side: Side) -> &'a dyn Filesystem {
        match side {
            Side::Local => self.local,
            Side::Remote => self.remote,
        }
    }
}

/// Joins a directory prefix and a name with exactly one `/` between them.
#[must_use]
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if prefix.ends_with('/') {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}/{name}")
    }
}

/// Last path component, ignoring trailing slashes.
#[must_use]
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "" } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// A file opened through tokio, usable by any side backed by a mounted filesystem.
pub struct TokioFile {
    file: tokio::fs::File,
}

impl TokioFile {
    #[must_use]
    pub fn new(file: tokio::fs::File) -> Self {
        Self { file }
    }
}

#[async_trait]
impl FileHandle for TokioFile {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf).await
    }

    async fn seek(&mut self, offset: u64) -> std::io::Result<()> {
        self.file.seek(std::io::SeekFrom::Start(offset)).await?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> std::io::Result<()> {
        self.file.flush().await
    }
}

pub struct TokioDir {
    entries: tokio::fs::ReadDir,
}

impl TokioDir {
    #[must_use]
    pub fn new(entries: tokio::fs::ReadDir) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl DirHandle for TokioDir {
    async fn next_entry(&mut self) -> std::io::Result<Option<DirEntry>> {
        let Some(entry) = self.entries.next_entry().await? else {
            return Ok(None);
        };
        let file_type = entry.file_type().await?;
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Ok(Some(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
        }))
    }

    async fn close(self: Box<Self>) -> std::io::Result<()> {
        Ok(())
    }
}

/// Opens `path` with tokio according to `options`.
pub async fn open_tokio_write(
    path: &std::path::Path,
    options: WriteOptions,
) -> std::io::Result<Box<dyn FileHandle>> {
    let mut open = tokio::fs::OpenOptions::new();
    open.write(true).truncate(options.truncate);
    if options.exclusive {
        open.create_new(true);
    } else {
        open.create(options.create);
    }
    let file = open.open(path).await?;
    Ok(Box::new(TokioFile::new(file)))
}

/// Stats `path` with tokio, following symlinks.
pub async fn stat_tokio(path: &std::path::Path) -> std::io::Result<Metadata> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(Metadata::from_std(&metadata))
}

/// The machine the shell runs on.
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    base: Option<std::path::PathBuf>,
}

impl LocalFs {
    /// Relative paths resolve against the process working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative paths resolve against `base`.
    #[must_use]
    pub fn rooted(base: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        let path = if path.is_empty() { "." } else { path };
        match &self.base {
            Some(base) if !path.starts_with('/') => base.join(path),
            _ => std::path::PathBuf::from(path),
        }
    }

    /// Changes the local working directory.
    pub fn chdir(&mut self, path: &str) -> anyhow::Result<()> {
        let target = self.resolve(path);
        match &mut self.base {
            Some(base) => {
                if !target.is_dir() {
                    return Err(std::io::Error::from(std::io::ErrorKind::NotADirectory))
                        .with_context(|| path.to_string());
                }
                *base = target;
            }
            None => {
                std::env::set_current_dir(&target).with_context(|| path.to_string())?;
            }
        }
        Ok(())
    }

    /// Current local working directory.
    pub fn cwd(&self) -> anyhow::Result<std::path::PathBuf> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => std::env::current_dir().context("getting local working directory"),
        }
    }
}

#[async_trait]
impl Filesystem for LocalFs {
    async fn stat(&self, path: &str) -> std::io::Result<Metadata> {
        stat_tokio(&self.resolve(path)).await
    }

    async fn open_read(&self, path: &str) -> std::io::Result<Box<dyn FileHandle>> {
        let file = tokio::fs::File::open(self.resolve(path)).await?;
        Ok(Box::new(TokioFile::new(file)))
    }

    async fn open_write(
        &self,
        path: &str,
        options: WriteOptions,
    ) -> std::io::Result<Box<dyn FileHandle>> {
        open_tokio_write(&self.resolve(path), options).await
    }

    async fn open_dir(&self, path: &str) -> std::io::Result<Box<dyn DirHandle>> {
        let entries = tokio::fs::read_dir(self.resolve(path)).await?;
        Ok(Box::new(TokioDir::new(entries)))
    }

    async fn mkdir(&self, path: &str) -> std::io::Result<()> {
        tokio::fs::create_dir(self.resolve(path)).await
    }

    async fn rmdir(&self, path: &str) -> std::io::Result<()> {
        tokio::fs::remove_dir(self.resolve(path)).await
    }

    async fn rename(&self, from: &str, to: &str) -> std::io::Result<()> {
        tokio::fs::rename(self.resolve(from), self.resolve(to)).await
    }

    async fn unlink(&self, path: &str) -> std::io::Result<()> {
        tokio::fs::remove_file(self.resolve(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_paths() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("dir", "a"), "dir/a");
        assert_eq!(join("dir/", "a"), "dir/a");
    }

    #[test]
    fn basenames() {
        assert_eq!(basename("a/b/c.txt"), "c.txt");
        assert_eq!(basename("dir/"), "dir");
        assert_eq!(basename("plain"), "plain");
        assert_eq!(basename("/"), "/");
        assert_eq!(basename(""), "");
    }

    #[test]
    fn sides_select_by_flag() {
        let local = LocalFs::rooted("/tmp/local");
        let remote = LocalFs::rooted("/tmp/remote");
        let sides = Sides {
            local: &local,
            remote: &remote,
        };
        assert!(std::ptr::addr_eq(sides.get(Side::Local), &local as &dyn Filesystem));
        assert!(std::ptr::addr_eq(sides.get(Side::Remote), &remote as &dyn Filesystem));
        assert_eq!(Side::Local.opposite(), Side::Remote);
    }

    #[tokio::test]
    async fn local_fs_conformance() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let fs = LocalFs::rooted(tmp.path());
        crate::testutils::check_filesystem_conformance(&fs).await
    }

    #[tokio::test]
    async fn local_chdir_moves_base() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::create_dir(tmp.path().join("sub"))?;
        std::fs::write(tmp.path().join("sub/file"), "x")?;
        let mut fs = LocalFs::rooted(tmp.path());
        fs.chdir("sub")?;
        assert_eq!(fs.cwd()?, tmp.path().join("sub"));
        assert_eq!(fs.stat("file").await?.size, 1);
        assert!(fs.chdir("file").is_err());
        Ok(())
    }
}
