use anyhow::{Context, anyhow};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;

use common::OnExist;
use common::config::{OutputConfig, SessionConfig, default_pager};
use remote::{Location, MountResolver};
use shareshell::session::{PROGRAM, Session};
use shareshell::{interface, ops};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "shareshell",
    version,
    about = "Interactive shell for browsing SMB shares and moving files to and from them",
    long_about = "`shareshell` is an interactive shell, similar to `ftp` or `sftp`, for SMB shares.

Shares are reached through the directory they are mounted on (by gvfs, `mount.cifs` or an automounter); `open host share` finds that directory from a mount template.

Commands are read from the terminal with line editing and tab completion, or one per line from standard input when it is not a terminal. Type `help` for the list of commands.

EXAMPLES:
    # Start and connect to a share right away
    shareshell fileserver public

    # Start in a subdirectory of the share, as user jo
    shareshell -u jo fileserver public docs/2024

    # Shares mounted under /mnt/<host>/<share>
    shareshell --mount-template '/mnt/{host}/{share}' fileserver public

    # Run commands from a script
    printf 'open nas media\\nget -r music\\n' | shareshell"
)]
struct Args {
    // Connection
    /// Login using given username
    #[arg(short = 'u', long, value_name = "USER", help_heading = "Connection")]
    user: Option<String>,

    /// Login using given password
    #[arg(short = 'p', long = "pass", value_name = "PASS", help_heading = "Connection")]
    pass: Option<String>,

    /// Where shares are mounted
    ///
    /// May use {uid}, {user}, {host} and {share}. Defaults to $SHARESHELL_MOUNT_TEMPLATE, then to
    /// the gvfs location /run/user/{uid}/gvfs/smb-share:server={host},share={share}.
    #[arg(long, value_name = "TEMPLATE", help_heading = "Connection")]
    mount_template: Option<String>,

    // Transfer options
    /// What to do when a transfer target already exists
    #[arg(
        long,
        value_enum,
        default_value_t = OnExist::Ask,
        value_name = "ACTION",
        help_heading = "Transfer options"
    )]
    onexist: OnExist,

    /// Program used by `page` (default: $PAGER, then less)
    #[arg(long, value_name = "COMMAND", help_heading = "Transfer options")]
    pager: Option<String>,

    /// Never draw progress bars
    ///
    /// Progress is only drawn when standard output is a terminal.
    #[arg(long, help_heading = "Transfer options")]
    no_progress: bool,

    // Output
    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output")]
    verbose: u8,

    /// Quiet mode, don't log anything
    #[arg(short = 'q', long = "quiet", help_heading = "Output")]
    quiet: bool,

    // ARGUMENTS
    /// Host, share and initial directory to open at start
    #[arg(value_name = "HOST SHARE [PATH]")]
    targets: Vec<String>,
}

/// The share named on the command line, if any.
fn initial_location(args: &Args) -> anyhow::Result<Option<Location>> {
    let (host, share, path) = match args.targets.as_slice() {
        [] => {
            if args.user.is_some() || args.pass.is_some() {
                return Err(anyhow!("--user and --pass need a host and share"));
            }
            return Ok(None);
        }
        [host, share] => (host, share, None),
        [host, share, path] => (host, share, Some(path.clone())),
        _ => return Err(anyhow!("expected host and share, optionally followed by a path")),
    };
    Ok(Some(
        Location::new(host, share)
            .with_user(args.user.clone(), args.pass.clone())
            .with_path(path),
    ))
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let output = OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
    };
    output.validate().map_err(|error| anyhow!(error))?;
    common::logging::init(&output)?;
    let config = SessionConfig {
        on_exist: args.onexist,
        pager: args.pager.clone().unwrap_or_else(default_pager),
        show_progress: !args.no_progress && std::io::stdout().is_terminal(),
    };
    config.validate().map_err(|error| anyhow!(error))?;
    let location = initial_location(&args)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let runtime = Arc::new(runtime);
    let resolver = MountResolver::from_env(args.mount_template.as_deref());
    tracing::debug!("mount template {}", resolver.template());
    let session = Arc::new(tokio::sync::Mutex::new(Session::new(&config, resolver)));
    if let Some(location) = location {
        runtime.block_on(async {
            let mut session = session.lock().await;
            let ctx = session.context(PROGRAM);
            if let Err(error) = ops::connect(&mut session, location).await {
                ctx.warn_error(&error);
            }
        });
    }
    interface::run(runtime, session)
}
