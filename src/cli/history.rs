use std::error::Error;
use std::fs;

use crate::cli::HistoryCommands;
use crate::core::config::path_display;
use crate::core::history::{ChatHistory, HistoryError};

pub fn run_history(command: HistoryCommands) -> Result<(), Box<dyn Error>> {
    match command {
        HistoryCommands::Export { file, output } => {
            let history = ChatHistory::load(&file)?;
            let json = history.export_json()?;
            match output {
                Some(path) => {
                    fs::write(&path, json).map_err(|source| HistoryError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    println!(
                        "✅ Exported {} item(s) to {}",
                        history.len(),
                        path_display(&path)
                    );
                }
                None => println!("{json}"),
            }
        }
        HistoryCommands::Import { file, from } => {
            let json = fs::read_to_string(&from).map_err(|source| HistoryError::Io {
                path: from.clone(),
                source,
            })?;
            let mut history = ChatHistory::default();
            history.import_json(&json)?;
            history.save(&file)?;
            println!(
                "✅ Imported {} item(s) into {}",
                history.len(),
                path_display(&file)
            );
        }
        HistoryCommands::Clear { file } => {
            let mut history = ChatHistory::load(&file)?;
            history.clear();
            history.save(&file)?;
            println!("✅ Cleared chat history at {}", path_display(&file));
        }
    }
    Ok(())
}
