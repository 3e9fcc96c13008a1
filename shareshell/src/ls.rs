//! Directory listings for `ls`.

use async_recursion::async_recursion;
use common::Context;
use common::columns::Columns;
use common::fs::{Filesystem, Metadata, join};
use std::io::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// date and size in front of every name
    pub long: bool,
    pub recursive: bool,
    /// terminal width for the column layout
    pub width: usize,
}

struct Entry {
    name: String,
    metadata: Metadata,
}

/// Names in `dir` other than `.` and `..`, in the order the filesystem returns them.
pub async fn read_names(fs: &dyn Filesystem, dir: &str) -> std::io::Result<Vec<String>> {
    let mut listing = fs.open_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = listing.next_entry().await? {
        if entry.name != "." && entry.name != ".." {
            names.push(entry.name);
        }
    }
    listing.close().await?;
    Ok(names)
}

fn print_entries(
    out: &mut (dyn Write + Send),
    entries: &[Entry],
    options: Options,
) -> std::io::Result<()> {
    if options.long {
        for entry in entries {
            let slash = if entry.metadata.is_dir() { "/" } else { "" };
            writeln!(
                out,
                "{} {:>10} {}{slash}",
                entry.metadata.date_string(),
                entry.metadata.size,
                entry.name
            )?;
        }
        return Ok(());
    }
    let columns: Columns = entries.iter().map(|entry| entry.name.as_str()).collect();
    out.write_all(columns.render(options.width).as_bytes())
}

/// Lists the contents of `dir`, then of its subdirectories when recursive.
#[async_recursion]
async fn list_dir(
    ctx: &Context,
    fs: &dyn Filesystem,
    out: &mut (dyn Write + Send),
    dir: &str,
    options: Options,
) -> std::io::Result<()> {
    let names = match read_names(fs, dir).await {
        Ok(names) => names,
        Err(error) => {
            ctx.warn(format!("{dir}: {error}"));
            return Ok(());
        }
    };
    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        if ctx.interrupted() {
            return Ok(());
        }
        let path = join(dir, &name);
        match fs.stat(&path).await {
            Ok(metadata) => entries.push(Entry { name, metadata }),
            Err(error) => ctx.warn(format!("{path}: {error}")),
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    print_entries(out, &entries, options)?;
    if !options.recursive {
        return Ok(());
    }
    for entry in entries.iter().filter(|entry| entry.metadata.is_dir()) {
        if ctx.interrupted() {
            break;
        }
        let path = join(dir, &entry.name);
        write!(out, "\n{path}:\n")?;
        list_dir(ctx, fs, out, &path, options).await?;
    }
    Ok(())
}

/// Lists `paths`, or the working directory when there are none.
///
/// A single directory argument lists its contents. Otherwise files come first, then every
/// directory under a `name:` header.
pub async fn list(
    ctx: &Context,
    fs: &dyn Filesystem,
    out: &mut (dyn Write + Send),
    paths: &[String],
    options: Options,
) -> std::io::Result<()> {
    if paths.is_empty() {
        return list_dir(ctx, fs, out, ".", options).await;
    }
    if let [path] = paths
        && fs.is_dir(path).await
    {
        return list_dir(ctx, fs, out, path, options).await;
    }
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for path in paths {
        if ctx.interrupted() {
            return Ok(());
        }
        match fs.stat(path).await {
            Ok(metadata) => {
                let entry = Entry {
                    name: path.clone(),
                    metadata,
                };
                if metadata.is_dir() {
                    dirs.push(entry);
                } else {
                    files.push(entry);
                }
            }
            Err(error) => ctx.warn(format!("{path}: {error}")),
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    print_entries(out, &files, options)?;
    for (i, dir) in dirs.iter().enumerate() {
        if ctx.interrupted() {
            break;
        }
        if i > 0 || !files.is_empty() {
            writeln!(out)?;
        }
        writeln!(out, "{}:", dir.name)?;
        list_dir(ctx, fs, out, &dir.name, options).await?;
    }
    Ok(())
}
