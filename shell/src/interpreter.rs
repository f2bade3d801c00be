use crate::command::{CommandFactory, ExitCode, Output};
use crate::editor::{EditorError, LineEditor};
use crate::env::Environment;
use crate::lexer;
use crate::parser::{self, SimpleCommand, Stream};
use crate::terminal::Terminal;
use std::io::{self, Read, Write};

/// Creates [`ExecutableCommand`](crate::command::ExecutableCommand) instances of type `T`.
///
/// Implemented for every builtin and for the external command launcher.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal interactive shell that can execute built-in and external commands.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`] objects
/// that are queried in order to create commands by name. See [`Default`] for the
/// factories included out of the box.
///
/// Example
/// ```
/// use minish::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("echo", &["hello", "world"]).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run a single command invocation by name with arguments on the console streams.
    ///
    /// Returns the command's exit code, or an error if the command fails to execute.
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        self.dispatch(name, args, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Execute a resolved command line, applying its redirection.
    pub fn execute(&mut self, command: &SimpleCommand) -> anyhow::Result<ExitCode> {
        let Some((name, args)) = command.argv.split_first() else {
            return Ok(0);
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let (stdout, stderr): (Box<dyn Output>, Box<dyn Output>) = match &command.redirect {
            None => (Box::new(io::stdout()), Box::new(io::stderr())),
            Some(redirect) => {
                let file = match redirect.open(&self.env.current_dir) {
                    Ok(file) => file,
                    Err(e) => {
                        eprintln!("minish: {}: {}", redirect.target.display(), e);
                        return Ok(1);
                    }
                };
                match redirect.stream {
                    Stream::Stdout => (Box::new(file), Box::new(io::stderr())),
                    Stream::Stderr => (Box::new(io::stdout()), Box::new(file)),
                }
            }
        };
        self.dispatch(name, &args, stdout, stderr)
    }

    fn dispatch(
        &mut self,
        name: &str,
        args: &[&str],
        stdout: Box<dyn Output>,
        mut stderr: Box<dyn Output>,
    ) -> anyhow::Result<ExitCode> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, args) {
                log::debug!("dispatching {} with {} argument(s)", name, args.len());
                return cmd.execute(stdout, stderr, &mut self.env);
            }
        }
        log::debug!("no factory accepts {}", name);
        writeln!(stderr, "{}: command not found", name)?;
        stderr.flush()?;
        Ok(127)
    }

    /// The Read-Eval-Print Loop.
    ///
    /// Reads lines until end of input or `exit`, and returns the status the shell should
    /// exit with. Errors from the editor end the loop; the terminal is already restored
    /// by the time they are returned.
    pub fn repl<R: Read, W: Write, T: Terminal + ?Sized>(
        &mut self,
        editor: &mut LineEditor<R, W>,
        terminal: &mut T,
    ) -> Result<ExitCode, EditorError> {
        loop {
            let Some(line) = editor.read_line(terminal)? else {
                log::debug!("end of input");
                return Ok(0);
            };

            let command = parser::resolve(lexer::tokenize(&line));
            if let Err(e) = self.execute(&command) {
                eprintln!("minish: {:#}", e);
            }

            if let Some(status) = self.env.exit_status.take() {
                return Ok(status);
            }
        }
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands:
    /// - built-ins: `pwd`, `cd`, `echo`, `exit`, `type`
    /// - external command launcher
    fn default() -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Type>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}
