//! The command table: names, connection prerequisites and help texts.

/// Connection state a command needs before it can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conn {
    MustConnect,
    MayConnect,
    MustNotConnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Name {
    Alias,
    Cd,
    Close,
    Exit,
    Get,
    Help,
    Lcd,
    Lpwd,
    Ls,
    Lumask,
    Mkdir,
    Mv,
    Open,
    Page,
    Put,
    Pwd,
    Quit,
    Rm,
    Rmdir,
    Set,
    Version,
}

#[derive(Debug)]
pub struct Command {
    pub name: &'static str,
    pub id: Name,
    pub conn: Conn,
    /// arguments are glob-expanded before the command runs
    pub glob: bool,
    pub description: &'static str,
    pub usage: &'static [&'static str],
    pub options: &'static [&'static str],
}

/// Every command, sorted by name.
pub const COMMANDS: &[Command] = &[
    Command {
        name: "alias",
        id: Name::Alias,
        conn: Conn::MayConnect,
        glob: false,
        description: "define or list aliases for shares",
        usage: &["alias", "alias name [-u user] [-p pass] host share [path]"],
        options: &["-p pass  login using given password", "-u user  login using given username"],
    },
    Command {
        name: "cd",
        id: Name::Cd,
        conn: Conn::MustConnect,
        glob: true,
        description: "change current remote directory",
        usage: &["cd directory"],
        options: &[],
    },
    Command {
        name: "close",
        id: Name::Close,
        conn: Conn::MustConnect,
        glob: false,
        description: "close current connection",
        usage: &["close"],
        options: &[],
    },
    Command {
        name: "exit",
        id: Name::Exit,
        conn: Conn::MayConnect,
        glob: false,
        description: "quit program",
        usage: &["exit"],
        options: &[],
    },
    Command {
        name: "get",
        id: Name::Get,
        conn: Conn::MustConnect,
        glob: true,
        description: "retrieve remote files",
        usage: &["get [-rcfs] file ...", "get [-rcfs] -o file1 file2"],
        options: &[
            "-c       resume (continue) local file if it exists",
            "-f       force overwrite of local file if it exists",
            "-o file  give local file specified name",
            "-r       retrieve recursively",
            "-s       skip if local file exists",
        ],
    },
    Command {
        name: "help",
        id: Name::Help,
        conn: Conn::MayConnect,
        glob: false,
        description: "print help information of command",
        usage: &["help [command]"],
        options: &[],
    },
    Command {
        name: "lcd",
        id: Name::Lcd,
        conn: Conn::MayConnect,
        glob: true,
        description: "change current local directory",
        usage: &["lcd [directory]"],
        options: &[],
    },
    Command {
        name: "lpwd",
        id: Name::Lpwd,
        conn: Conn::MayConnect,
        glob: false,
        description: "print current local directory",
        usage: &["lpwd"],
        options: &[],
    },
    Command {
        name: "ls",
        id: Name::Ls,
        conn: Conn::MustConnect,
        glob: true,
        description: "list remote files",
        usage: &["ls [-lr] [file ...]"],
        options: &["-l print extra information", "-r recursively list directories"],
    },
    Command {
        name: "lumask",
        id: Name::Lumask,
        conn: Conn::MayConnect,
        glob: false,
        description: "show or change local umask",
        usage: &["lumask [mode]"],
        options: &[],
    },
    Command {
        name: "mkdir",
        id: Name::Mkdir,
        conn: Conn::MustConnect,
        glob: true,
        description: "create directories on remote host",
        usage: &["mkdir directory ..."],
        options: &[],
    },
    Command {
        name: "mv",
        id: Name::Mv,
        conn: Conn::MustConnect,
        glob: true,
        description: "rename remote file or move remote files to directory",
        usage: &["mv file1 file2", "mv file ... directory"],
        options: &[],
    },
    Command {
        name: "open",
        id: Name::Open,
        conn: Conn::MustNotConnect,
        glob: false,
        description: "open connection to host or alias",
        usage: &["open [-u user] [-p pass] host share [path]", "open alias"],
        options: &["-p pass  login using given password", "-u user  login using given username"],
    },
    Command {
        name: "page",
        id: Name::Page,
        conn: Conn::MustConnect,
        glob: true,
        description: "show remote file in pager",
        usage: &["page file"],
        options: &[],
    },
    Command {
        name: "put",
        id: Name::Put,
        conn: Conn::MustConnect,
        glob: true,
        description: "write local files and directories to remote host",
        usage: &["put [-cfrs] file ...", "put [-cfrs] -o file1 file2"],
        options: &[
            "-c       resume (continue) remote file if it exists",
            "-f       force overwriting remote file if it exists",
            "-o file  give remote file specified name",
            "-r       upload recursively",
            "-s       skip if remote file exists",
        ],
    },
    Command {
        name: "pwd",
        id: Name::Pwd,
        conn: Conn::MustConnect,
        glob: false,
        description: "print current remote working directory",
        usage: &["pwd"],
        options: &[],
    },
    Command {
        name: "quit",
        id: Name::Quit,
        conn: Conn::MayConnect,
        glob: false,
        description: "quit program",
        usage: &["quit"],
        options: &[],
    },
    Command {
        name: "rm",
        id: Name::Rm,
        conn: Conn::MustConnect,
        glob: true,
        description: "remove remote files",
        usage: &["rm [-r] file ..."],
        options: &["-r recursively remove remote directories"],
    },
    Command {
        name: "rmdir",
        id: Name::Rmdir,
        conn: Conn::MustConnect,
        glob: true,
        description: "remove remote directories",
        usage: &["rmdir directory ..."],
        options: &[],
    },
    Command {
        name: "set",
        id: Name::Set,
        conn: Conn::MayConnect,
        glob: false,
        description: "show/modify values of variables",
        usage: &["set [variable [value]]"],
        options: &[],
    },
    Command {
        name: "version",
        id: Name::Version,
        conn: Conn::MayConnect,
        glob: false,
        description: "show version information",
        usage: &["version"],
        options: &[],
    },
];

#[must_use]
pub fn find(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|command| command.name == name)
}

/// Lines under a heading printed once, right-aligned to `width`.
fn headed(heading: &str, width: usize, lines: &[&str]) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let heading = if i == 0 { heading } else { "" };
        out.push_str(&format!("{heading:>width$} {line}\n"));
    }
    out
}

impl Command {
    /// `usage:` followed by every usage line.
    #[must_use]
    pub fn usage_text(&self) -> String {
        headed("usage:", 6, self.usage)
    }

    /// Description, usage and options, as `help <command>` prints them.
    #[must_use]
    pub fn help_text(&self) -> String {
        format!(
            "description: {}\n{}{}",
            self.description,
            self.usage_text(),
            headed("options:", 8, self.options)
        )
    }
}

/// The command table as completion sees it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Table;

impl common::complete::Commands for Table {
    fn names(&self) -> Vec<&str> {
        COMMANDS.iter().map(|command| command.name).collect()
    }

    fn requires_connection(&self, name: &str) -> Option<bool> {
        find(name).map(|command| command.conn == Conn::MustConnect)
    }
}
