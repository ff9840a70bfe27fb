//! Shared helpers for commands.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Write to a file when `output` is set, else to stdout.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
