//! What every command does once dispatch has checked and expanded its arguments.
//!
//! Every function receives the full argument vector with the command name first. Problems with
//! individual files are reported through the context and the command carries on; anything that
//! stops the command is returned as an error.

use anyhow::Context as _;
use async_recursion::async_recursion;
use common::fs::{Filesystem, basename, join};
use common::transfer;
use common::version::Version;
use common::{Context, OnExist, Side, Summary};
use remote::{Location, ShareFs};
use std::io::Write;

use crate::commands::{COMMANDS, Command, Name};
use crate::ls;
use crate::session::Session;

/// Misuse of a command; its usage is printed after the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("wrong number of arguments")]
    WrongArguments,
    #[error("illegal combination of options")]
    IllegalCombination,
    #[error("host and share expected")]
    HostShareExpected,
    #[error("{0}")]
    Parse(String),
}

/// Parses `args` (command name first) with clap, keeping only the first line of its message.
fn parse<T: clap::Parser>(args: &[String]) -> Result<T, CommandError> {
    T::try_parse_from(args).map_err(|error| {
        let message = error.to_string();
        let first = message.lines().next().unwrap_or_default();
        CommandError::Parse(first.trim_start_matches("error: ").to_string())
    })
}

#[derive(clap::Parser, Debug)]
#[command(disable_help_flag = true)]
struct TransferArgs {
    #[arg(short = 'c')]
    resume: bool,
    #[arg(short = 'f')]
    force: bool,
    #[arg(short = 's')]
    skip: bool,
    #[arg(short = 'r')]
    recursive: bool,
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<String>,
    files: Vec<String>,
}

impl TransferArgs {
    /// Conflict policy for this command: the flags, or `default` when none is given.
    fn on_exist(&self, default: OnExist) -> Result<OnExist, CommandError> {
        let policy = match (self.resume, self.force, self.skip) {
            (false, false, false) => default,
            (true, false, false) => OnExist::Resume,
            (false, true, false) => OnExist::Overwrite,
            (false, false, true) => OnExist::Skip,
            _ => return Err(CommandError::IllegalCombination),
        };
        if self.output.is_some() && (self.recursive || self.files.len() != 1) {
            return Err(CommandError::IllegalCombination);
        }
        Ok(policy)
    }
}

#[derive(clap::Parser, Debug)]
#[command(disable_help_flag = true)]
struct LocationArgs {
    #[arg(short = 'u', value_name = "USER")]
    user: Option<String>,
    #[arg(short = 'p', value_name = "PASS")]
    pass: Option<String>,
    targets: Vec<String>,
}

impl LocationArgs {
    fn location(self) -> Result<Location, CommandError> {
        let (host, share, path) = match self.targets.as_slice() {
            [host, share] => (host, share, None),
            [host, share, path] => (host, share, Some(path.clone())),
            _ => return Err(CommandError::HostShareExpected),
        };
        Ok(Location::new(host, share)
            .with_user(self.user, self.pass)
            .with_path(path))
    }
}

#[derive(clap::Parser, Debug)]
#[command(disable_help_flag = true)]
struct LsArgs {
    #[arg(short = 'l')]
    long: bool,
    #[arg(short = 'r')]
    recursive: bool,
    paths: Vec<String>,
}

#[derive(clap::Parser, Debug)]
#[command(disable_help_flag = true)]
struct RmArgs {
    #[arg(short = 'r')]
    recursive: bool,
    paths: Vec<String>,
}

/// Runs `command` with `args`.
pub async fn run(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    args: &[String],
) -> anyhow::Result<()> {
    match command.id {
        Name::Alias => alias(session, args),
        Name::Cd => cd(session, args).await,
        Name::Close => close(session, args),
        Name::Exit | Name::Quit => quit(session, args),
        Name::Get => copy(session, ctx, args, Side::Remote).await,
        Name::Help => help(session, ctx, args),
        Name::Lcd => lcd(session, args),
        Name::Lpwd => lpwd(session, args),
        Name::Ls => list(session, ctx, args).await,
        Name::Lumask => lumask(session, args),
        Name::Mkdir => mkdir(session, ctx, args).await,
        Name::Mv => rename(session, ctx, args).await,
        Name::Open => open(session, args).await,
        Name::Page => page(session, ctx, args).await,
        Name::Put => copy(session, ctx, args, Side::Local).await,
        Name::Pwd => pwd(session, args),
        Name::Rm => remove(session, ctx, args).await,
        Name::Rmdir => rmdir(session, ctx, args).await,
        Name::Set => set(session, args),
        Name::Version => version(session, args),
    }
}

/// Opens the share at `location`.
pub async fn connect(session: &mut Session, location: Location) -> anyhow::Result<()> {
    let share = ShareFs::connect(location, &session.resolver).await?;
    session.fs.remote = Some(share);
    Ok(())
}

fn no_arguments(args: &[String]) -> Result<(), CommandError> {
    if args.len() == 1 {
        Ok(())
    } else {
        Err(CommandError::WrongArguments)
    }
}

fn alias(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    let [command, name, rest @ ..] = args else {
        for (name, location) in session.aliases.iter() {
            writeln!(session.out, "{name} = {location}")?;
        }
        return Ok(());
    };
    let mut location_args = vec![command.clone()];
    location_args.extend_from_slice(rest);
    let location = parse::<LocationArgs>(&location_args)?.location()?;
    session.aliases.define(name, location)?;
    Ok(())
}

async fn cd(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    let [_, dir] = args else {
        return Err(CommandError::WrongArguments.into());
    };
    let share = session.fs.remote.as_mut().context("not connected")?;
    share.chdir(dir).await
}

fn close(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    no_arguments(args)?;
    if let Some(share) = session.fs.remote.take() {
        tracing::info!("closed {}", share.uri());
    }
    Ok(())
}

fn quit(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    no_arguments(args)?;
    session.fs.remote = None;
    session.done = true;
    Ok(())
}

/// `get` when `from` is the share, `put` when it is the local side.
async fn copy(
    session: &mut Session,
    ctx: &Context,
    args: &[String],
    from: Side,
) -> anyhow::Result<()> {
    let parsed: TransferArgs = parse(args)?;
    if parsed.files.is_empty() {
        return Err(CommandError::WrongArguments.into());
    }
    let mut on_exist = parsed.on_exist(session.vars.on_exist)?;
    let sides = session.fs.sides().context("not connected")?;
    let mut summary = Summary::default();
    if let (Some(output), [file]) = (&parsed.output, parsed.files.as_slice()) {
        summary = transfer::transfer(ctx, sides, from, file, output, &mut on_exist, false).await;
    } else {
        for file in &parsed.files {
            if ctx.interrupted() {
                break;
            }
            let metadata = match sides.get(from).stat(file).await {
                Ok(metadata) => metadata,
                Err(error) => {
                    ctx.warn(format!("{file}: {error}"));
                    continue;
                }
            };
            let dst = if !metadata.is_dir() {
                basename(file).to_string()
            } else if !parsed.recursive {
                ctx.warn(match from {
                    Side::Remote => "cannot retrieve directory non-recursively",
                    Side::Local => "cannot put directory non-recursively",
                });
                continue;
            } else if file.starts_with('/') || file == ".." || file.starts_with("../") {
                ".".to_string()
            } else {
                file.clone()
            };
            summary = summary
                + transfer::transfer(ctx, sides, from, file, &dst, &mut on_exist, parsed.recursive)
                    .await;
        }
    }
    tracing::info!("{}:\n{summary}", ctx.label);
    Ok(())
}

fn help(session: &mut Session, ctx: &Context, args: &[String]) -> anyhow::Result<()> {
    match args {
        [_] => {
            let names: common::columns::Columns =
                COMMANDS.iter().map(|command| command.name).collect();
            let width = session.width();
            session.out.write_all(names.render(width).as_bytes())?;
        }
        [_, name] => match crate::commands::find(name) {
            Some(command) => session.out.write_all(command.help_text().as_bytes())?,
            None => ctx.warn("no such command"),
        },
        _ => return Err(CommandError::WrongArguments.into()),
    }
    Ok(())
}

fn lcd(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    let dir = match args {
        [_] => {
            let home = dirs::home_dir().context("no home directory")?;
            home.to_str()
                .context("home directory is not valid UTF-8")?
                .to_string()
        }
        [_, dir] => dir.clone(),
        _ => return Err(CommandError::WrongArguments.into()),
    };
    session.fs.local.chdir(&dir)?;
    tracing::debug!("local directory is now {dir}");
    Ok(())
}

fn lpwd(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    no_arguments(args)?;
    let cwd = session.fs.local.cwd()?;
    writeln!(session.out, "{}", cwd.display())?;
    Ok(())
}

async fn list(session: &mut Session, ctx: &Context, args: &[String]) -> anyhow::Result<()> {
    let parsed: LsArgs = parse(args)?;
    let options = ls::Options {
        long: parsed.long,
        recursive: parsed.recursive,
        width: session.width(),
    };
    let share = session.fs.share()?;
    ls::list(ctx, share, &mut *session.out, &parsed.paths, options)
        .await
        .context("writing listing")
}

/// Parses one to three octal digits.
fn parse_umask(text: &str) -> Option<nix::libc::mode_t> {
    if text.is_empty() || text.len() > 3 || !text.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    nix::libc::mode_t::from_str_radix(text, 8).ok()
}

fn lumask(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    use nix::sys::stat::{Mode, umask};
    match args {
        [_] => {
            let current = umask(Mode::empty());
            umask(current);
            writeln!(session.out, "{:03o}", current.bits())?;
        }
        [_, mask] => {
            let mask = parse_umask(mask).context("invalid umask")?;
            let old = umask(Mode::from_bits_truncate(mask));
            tracing::debug!("umask {:03o} -> {mask:03o}", old.bits());
        }
        _ => return Err(CommandError::WrongArguments.into()),
    }
    Ok(())
}

async fn mkdir(session: &mut Session, ctx: &Context, args: &[String]) -> anyhow::Result<()> {
    if args.len() < 2 {
        return Err(CommandError::WrongArguments.into());
    }
    let share = session.fs.share()?;
    for dir in &args[1..] {
        if ctx.interrupted() {
            break;
        }
        if let Err(error) = share.mkdir(dir).await {
            ctx.warn(format!("creating {dir}: {error}"));
        }
    }
    Ok(())
}

/// Renames one file, or moves several into a directory.
async fn rename(session: &mut Session, ctx: &Context, args: &[String]) -> anyhow::Result<()> {
    let share = session.fs.share()?;
    let (sources, target) = match args {
        [_, sources @ .., target] if !sources.is_empty() => (sources, target),
        _ => return Err(CommandError::WrongArguments.into()),
    };
    let into_directory = match share.stat(target).await {
        Ok(metadata) => metadata.is_dir(),
        Err(error) if sources.len() > 1 => {
            ctx.warn(format!("{target}: {error}"));
            return Ok(());
        }
        Err(_) => false,
    };
    if sources.len() > 1 && !into_directory {
        ctx.warn(format!("{target}: last argument must be a directory"));
        return Ok(());
    }
    for source in sources {
        if ctx.interrupted() {
            break;
        }
        let destination = if into_directory {
            join(target, basename(source))
        } else {
            target.clone()
        };
        if let Err(error) = share.rename(source, &destination).await {
            ctx.warn(format!("renaming {source}: {error}"));
        }
    }
    Ok(())
}

async fn open(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    let location = match args {
        [_] => return Err(CommandError::WrongArguments.into()),
        [_, alias] if !alias.starts_with('-') => session
            .aliases
            .get(alias)
            .cloned()
            .context("no such alias")?,
        _ => parse::<LocationArgs>(args)?.location()?,
    };
    connect(session, location).await
}

/// Downloads `file` to a temporary file and shows it in the pager.
async fn page(session: &mut Session, ctx: &Context, args: &[String]) -> anyhow::Result<()> {
    let [_, file] = args else {
        return Err(CommandError::WrongArguments.into());
    };
    let sides = session.fs.sides().context("not connected")?;
    let temp = tempfile::Builder::new()
        .prefix("shareshell-")
        .tempfile()
        .context("creating temporary file")?;
    let path = temp
        .path()
        .to_str()
        .context("temporary file name is not valid UTF-8")?
        .to_string();
    let summary = transfer::get_to(ctx, sides, file, &path).await;
    if summary.files_copied == 0 {
        // the transfer already said why
        return Ok(());
    }
    let pager = &session.vars.pager;
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(format!("{pager} \"$1\""))
        .arg("sh")
        .arg(&path)
        .status()
        .await
        .with_context(|| format!("running {pager}"))?;
    tracing::debug!("{pager} exited with {status}");
    temp.close().with_context(|| format!("removing {path}"))
}

fn pwd(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    no_arguments(args)?;
    let uri = session.fs.share()?.uri();
    writeln!(session.out, "{uri}")?;
    Ok(())
}

/// Removes `path`; directories and their contents too when `recursive`.
#[async_recursion]
async fn remove_path(ctx: &Context, fs: &dyn Filesystem, path: &str, recursive: bool) {
    if !recursive {
        if let Err(error) = fs.unlink(path).await {
            if fs.is_dir(path).await {
                ctx.warn(format!("{path}: is a directory"));
            } else {
                ctx.warn(format!("removing {path}: {error}"));
            }
        }
        return;
    }
    let metadata = match fs.stat(path).await {
        Ok(metadata) => metadata,
        Err(error) => {
            ctx.warn(format!("{path}: {error}"));
            return;
        }
    };
    if !metadata.is_dir() {
        if let Err(error) = fs.unlink(path).await {
            ctx.warn(format!("removing {path}: {error}"));
        }
        return;
    }
    let names = match ls::read_names(fs, path).await {
        Ok(names) => names,
        Err(error) => {
            ctx.warn(format!("{path}: {error}"));
            return;
        }
    };
    for name in names {
        if ctx.interrupted() {
            return;
        }
        remove_path(ctx, fs, &join(path, &name), true).await;
    }
    if let Err(error) = fs.rmdir(path).await {
        ctx.warn(format!("removing {path}: {error}"));
    }
}

async fn remove(session: &mut Session, ctx: &Context, args: &[String]) -> anyhow::Result<()> {
    let parsed: RmArgs = parse(args)?;
    if parsed.paths.is_empty() {
        return Err(CommandError::WrongArguments.into());
    }
    let share = session.fs.share()?;
    for path in &parsed.paths {
        if ctx.interrupted() {
            break;
        }
        remove_path(ctx, share, path, parsed.recursive).await;
    }
    Ok(())
}

async fn rmdir(session: &mut Session, ctx: &Context, args: &[String]) -> anyhow::Result<()> {
    if args.len() < 2 {
        return Err(CommandError::WrongArguments.into());
    }
    let share = session.fs.share()?;
    for dir in &args[1..] {
        if ctx.interrupted() {
            break;
        }
        if let Err(error) = share.rmdir(dir).await {
            ctx.warn(format!("removing {dir}: {error}"));
        }
    }
    Ok(())
}

fn set(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    match args {
        [_] => {
            for (name, value) in session.vars.list() {
                writeln!(session.out, "{name} = {value}")?;
            }
        }
        [_, name] => {
            let value = session.vars.get(name).context("no such variable")?;
            writeln!(session.out, "{name} = {value}")?;
        }
        [_, name, value] => session.vars.set(name, value)?,
        _ => return Err(CommandError::WrongArguments.into()),
    }
    Ok(())
}

fn version(session: &mut Session, args: &[String]) -> anyhow::Result<()> {
    no_arguments(args)?;
    writeln!(session.out, "shareshell {}", Version::current())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn transfer_args(line: &str) -> Result<TransferArgs, CommandError> {
        parse(&args(line))
    }

    #[test]
    fn transfer_flags_pick_policy() -> anyhow::Result<()> {
        assert_eq!(transfer_args("get a")?.on_exist(OnExist::Skip)?, OnExist::Skip);
        assert_eq!(transfer_args("get -c a b")?.on_exist(OnExist::Ask)?, OnExist::Resume);
        assert_eq!(transfer_args("get -rf a")?.on_exist(OnExist::Ask)?, OnExist::Overwrite);
        assert_eq!(transfer_args("put -s -o x a")?.on_exist(OnExist::Ask)?, OnExist::Skip);
        Ok(())
    }

    #[test]
    fn illegal_transfer_flags() -> anyhow::Result<()> {
        for line in ["get -cf a", "get -cs a", "get -fs a", "get -o x a b", "get -r -o x a"] {
            assert_eq!(
                transfer_args(line)?.on_exist(OnExist::Ask),
                Err(CommandError::IllegalCombination),
                "{line}"
            );
        }
        Ok(())
    }

    #[test]
    fn clap_errors_are_one_line() {
        let error = transfer_args("get -x a").err();
        match error {
            Some(CommandError::Parse(message)) => {
                assert!(message.contains("'-x'"), "{message}");
                assert!(!message.contains('\n'));
                assert!(!message.starts_with("error:"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(TransferArgs::try_parse_from(["get", "-o"]).is_err());
    }

    #[test]
    fn location_arguments() -> anyhow::Result<()> {
        let location = parse::<LocationArgs>(&args("open -u jo -p pw nas public docs"))?.location()?;
        assert_eq!(
            location,
            Location::new("nas", "public")
                .with_user(Some("jo".to_string()), Some("pw".to_string()))
                .with_path(Some("docs".to_string()))
        );
        assert_eq!(
            parse::<LocationArgs>(&args("open -u jo nas"))?.location(),
            Err(CommandError::HostShareExpected)
        );
        Ok(())
    }

    #[test]
    fn umask_parsing() {
        assert_eq!(parse_umask("022"), Some(0o22));
        assert_eq!(parse_umask("7"), Some(0o7));
        assert_eq!(parse_umask("777"), Some(0o777));
        assert_eq!(parse_umask("0777"), None);
        assert_eq!(parse_umask("8"), None);
        assert_eq!(parse_umask(""), None);
        assert_eq!(parse_umask("+7"), None);
    }
}
