use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use afnix_engine::error::{EngineError, Result};
use afnix_engine::eval::terminal::Terminal;

/// Line-editing terminal for the interactive loop, with history persisted
/// under the user's config directory.
pub struct ReplTerminal {
    editor: DefaultEditor,
    history: Option<std::path::PathBuf>,
}

impl ReplTerminal {
    pub fn new() -> Result<ReplTerminal> {
        let mut editor = DefaultEditor::new()
            .map_err(|err| EngineError::IoError(err.to_string()))?;
        let history = history_file();
        if let Some(ref path) = history {
            let _ = editor.load_history(path);
        }
        Ok(ReplTerminal { editor, history })
    }
}

impl Terminal for ReplTerminal {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let prompt = format!("{} ", prompt.trim_end().cyan().bold());
        match self.editor.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(&line);
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "Interrupted".yellow());
                Ok(Some(String::new()))
            }
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(EngineError::IoError(err.to_string())),
        }
    }
}

impl Drop for ReplTerminal {
    fn drop(&mut self) {
        if let Some(ref path) = self.history {
            let _ = self.editor.save_history(path);
        }
    }
}

pub fn print_banner() {
    println!(
        "{} {} ({})",
        "AFNIX".cyan().bold(),
        afnix_engine::revision(),
        afnix_engine::os_name()
    );
    println!("{}", "Type Ctrl-D to quit".dimmed());
}

fn history_file() -> Option<std::path::PathBuf> {
    dirs::config_dir().and_then(|mut path| {
        path.push("afnix");
        std::fs::create_dir_all(&path).ok()?;
        path.push("repl_history.txt");
        Some(path)
    })
}
