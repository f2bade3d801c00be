use minish::Interpreter;
use minish::completion::Completer;
use minish::editor::LineEditor;
use minish::terminal::TtyTerminal;
use std::io;
use std::process;

fn main() {
    env_logger::init();

    let mut shell = Interpreter::default();
    let completer = Completer::from_env(shell.env());
    let mut editor = LineEditor::new(io::stdin(), io::stdout(), completer);
    let mut terminal = TtyTerminal::new();
    log::debug!("interactive terminal: {}", terminal.is_interactive());

    match shell.repl(&mut editor, &mut terminal) {
        Ok(status) => process::exit(status),
        Err(e) => {
            eprintln!("minish: {}", e);
            process::exit(1);
        }
    }
}
