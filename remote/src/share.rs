//! A mounted share seen as a filesystem with its own working directory.

use crate::{Error, Location, MountResolver};
use anyhow::Context;
use async_trait::async_trait;
use common::fs::{
    DirHandle, FileHandle, Filesystem, Metadata, TokioDir, TokioFile, WriteOptions,
    open_tokio_write, stat_tokio,
};

/// Combines the share-relative directory `cwd` with `path`.
///
/// The result is absolute within the share and has no `.`, `..` or empty components; `..` at the
/// share root stays at the root.
#[must_use]
pub fn normalize(cwd: &str, path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    let base = if path.starts_with('/') { "" } else { cwd };
    for component in base.split('/').chain(path.split('/')) {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            name => components.push(name),
        }
    }
    format!("/{}", components.join("/"))
}

#[derive(Debug, Clone)]
pub struct ShareFs {
    location: Location,
    root: std::path::PathBuf,
    cwd: String,
}

impl ShareFs {
    /// Opens the share `location` names and changes to its initial directory.
    pub async fn connect(location: Location, resolver: &MountResolver) -> Result<Self, Error> {
        if !location.is_valid() {
            return Err(Error::InvalidParameters {
                uri: location.target_uri(),
            });
        }
        let root = resolver.resolve(&location);
        match tokio::fs::metadata(&root).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => {
                return Err(Error::NoSuchShare {
                    uri: location.target_uri(),
                });
            }
        }
        let mut share = Self {
            root,
            cwd: "/".to_string(),
            location,
        };
        let path = share.location.path.clone().unwrap_or_else(|| ".".to_string());
        if let Err(error) = share.change_dir(&path).await {
            return Err(Error::Io {
                uri: share.location.target_uri(),
                error,
            });
        }
        tracing::info!("connected to {}", share.uri());
        Ok(share)
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Working directory within the share, always starting with `/`.
    #[must_use]
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// URI of the working directory.
    #[must_use]
    pub fn uri(&self) -> String {
        self.location.uri(&self.cwd)
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        let within = normalize(&self.cwd, path);
        self.root.join(within.trim_start_matches('/'))
    }

    async fn change_dir(&mut self, path: &str) -> std::io::Result<()> {
        let metadata = stat_tokio(&self.resolve(path)).await?;
        if !metadata.is_dir() {
            return Err(std::io::ErrorKind::NotADirectory.into());
        }
        self.cwd = normalize(&self.cwd, path);
        Ok(())
    }

    /// Changes the working directory, which must exist and be a directory.
    pub async fn chdir(&mut self, path: &str) -> anyhow::Result<()> {
        self.change_dir(path)
            .await
            .with_context(|| path.to_string())?;
        tracing::debug!("remote directory is now {}", self.cwd);
        Ok(())
    }
}

#[async_trait]
impl Filesystem for ShareFs {
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
    fn normalizes_paths() {
        assert_eq!(normalize("/", "."), "/");
        assert_eq!(normalize("/", "docs"), "/docs");
        assert_eq!(normalize("/docs", "../music//albums/."), "/music/albums");
        assert_eq!(normalize("/docs", "/music"), "/music");
        assert_eq!(normalize("/", "../../.."), "/");
        assert_eq!(normalize("/a/b", "./../c/"), "/a/c");
        assert_eq!(normalize("/a", ""), "/a");
    }

    async fn share(tmp: &tempfile::TempDir) -> Result<ShareFs, Error> {
        let template = format!("{}/{{host}}/{{share}}", tmp.path().display());
        ShareFs::connect(
            Location::new("nas", "public"),
            &MountResolver::new(&template),
        )
        .await
    }

    #[tokio::test]
    async fn missing_mount_is_no_such_share() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let error = share(&tmp).await.err().context("connected without a mount")?;
        assert_eq!(error.to_string(), "smb://nas/public: no such host or share");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_location_is_rejected() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let resolver = MountResolver::new(&format!("{}/{{share}}", tmp.path().display()));
        let error = ShareFs::connect(Location::new("", "public"), &resolver)
            .await
            .err()
            .context("connected with empty host")?;
        assert!(matches!(error, Error::InvalidParameters { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn chdir_stays_inside_share() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::create_dir_all(tmp.path().join("nas/public/docs/old"))?;
        std::fs::write(tmp.path().join("nas/public/readme"), "hi")?;
        let mut share = share(&tmp).await?;
        assert_eq!(share.uri(), "smb://nas/public/");
        share.chdir("docs/old").await?;
        assert_eq!(share.cwd(), "/docs/old");
        share.chdir("../../..").await?;
        assert_eq!(share.cwd(), "/");
        assert!(share.chdir("readme").await.is_err());
        assert!(share.chdir("nowhere").await.is_err());
        assert_eq!(share.cwd(), "/");
        share.chdir("/docs").await?;
        assert_eq!(share.stat("../readme").await?.size, 2);
        assert_eq!(share.stat("/readme").await?.size, 2);
        Ok(())
    }

    #[tokio::test]
    async fn initial_path_must_exist() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::create_dir_all(tmp.path().join("nas/public"))?;
        let template = format!("{}/{{host}}/{{share}}", tmp.path().display());
        let location = Location::new("nas", "public").with_path(Some("missing".to_string()));
        let error = ShareFs::connect(location, &MountResolver::new(&template))
            .await
            .err()
            .context("connected to a missing directory")?;
        assert!(error.to_string().starts_with("smb://nas/public/missing: "));
        Ok(())
    }
}
