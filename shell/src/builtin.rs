use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Output};
use crate::env::Environment;
use crate::external::find_command_path;
use crate::interpreter::Factory;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Names of all builtins, sorted.
pub(crate) const NAMES: &[&str] = &["cd", "echo", "exit", "pwd", "type"];

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided output streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdout: Box<dyn Output>,
        mut stderr: Box<dyn Output>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = match T::execute(*self, &mut stdout, &mut stderr, env) {
            Ok(x) => x,
            Err(e) => {
                writeln!(stderr, "{}", e)?;
                1
            }
        };
        stdout.flush()?;
        stderr.flush()?;
        Ok(code)
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        mut stdout: Box<dyn Output>,
        mut stderr: Box<dyn Output>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            writeln!(stderr, "{}", self.output.trim_end())?;
            Ok(1)
        } else {
            stdout.write_all(self.output.as_bytes())?;
            stdout.flush()?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative to the current directory, or starting with `~`.
    pub target: Option<String>,
}

fn home_dir(env: &Environment) -> Result<PathBuf> {
    env.get_var("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("cd: HOME not set"))
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let shown = self.target.as_deref().unwrap_or("~");
        let target = match shown {
            "" | "~" => home_dir(env)?,
            t => match t.strip_prefix("~/") {
                Some(rest) => home_dir(env)?.join(rest),
                None => PathBuf::from(t),
            },
        };

        // `join` keeps an absolute target as is.
        let new_dir = env.current_dir.join(target);

        let canonical = fs::canonicalize(&new_dir)
            .map_err(|_| anyhow!("cd: {}: No such file or directory", shown))?;
        if !canonical.is_dir() {
            return Err(anyhow!("cd: {}: Not a directory", shown));
        }

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

/// Exit the shell with the given status.
pub struct Exit {
    /// exit status; 0 when omitted.
    pub status: Option<String>,
}

/// Any word is a status to validate, so argh's flag and `help` handling is bypassed.
impl FromArgs for Exit {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Exit {
            status: args.first().map(|s| s.to_string()),
        })
    }
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = match self.status.as_deref() {
            None => 0,
            Some(status) => match status.parse::<i64>() {
                Ok(n) => ExitCode::from((n & 0xff) as u8),
                Err(_) => {
                    writeln!(stderr, "exit: {}: numeric argument required", status)?;
                    2
                }
            },
        };
        env.exit_status = Some(code);
        Ok(code)
    }
}

/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    /// do not output the trailing newline.
    pub no_newline: bool,

    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

/// Leading `-n` words (`-n`, `-nn`, ...) are switches; every other word is printed,
/// including ones that look like flags.
impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        let switches = args
            .iter()
            .take_while(|arg| {
                arg.strip_prefix('-')
                    .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c == 'n'))
            })
            .count();
        Ok(Echo {
            no_newline: switches > 0,
            args: args[switches..].iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// tell how each name would be interpreted if used as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let mut status = 0;
        for name in &self.names {
            if NAMES.contains(&name.as_str()) {
                writeln!(stdout, "{} is a shell builtin", name)?;
            } else if let Some(path) = find_command_path(OsStr::new(&search_paths), Path::new(name))
            {
                writeln!(stdout, "{} is {}", name, path.display())?;
            } else {
                writeln!(stderr, "{}: not found", name)?;
                status = 1;
            }
        }
        Ok(status)
    }
}
