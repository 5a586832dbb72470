//! Request input and report output for the one-shot CLI
//!
//! Requests are read from a file or stdin (`-`); responses are written as
//! JSON to a file or stdout.

use crate::domain::types::CalculateResponse;
use anyhow::Context;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Read raw request bytes from `source` (`-` for stdin)
pub fn read_input(source: &str) -> anyhow::Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("Failed to read request from stdin")?;
        return Ok(buf);
    }

    fs::read(source).with_context(|| format!("Failed to read request file {}", source))
}

/// Serialize a response, optionally pretty-printed
pub fn render(response: &CalculateResponse, pretty: bool) -> anyhow::Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(response)
    } else {
        serde_json::to_string(response)
    };
    json.context("Failed to serialize response")
}

/// Report writer: a file path, or stdout when none is given
pub struct ReportWriter {
    file_path: Option<String>,
}

impl ReportWriter {
    pub fn new(file_path: Option<&str>) -> Self {
        Self { file_path: file_path.map(str::to_string) }
    }

    /// Write a rendered report, replacing any existing file
    pub fn write(&self, rendered: &str) -> anyhow::Result<()> {
        let Some(file_path) = &self.file_path else {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", rendered).context("Failed to write report to stdout")?;
            return Ok(());
        };

        let path = Path::new(file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create report directory {}", parent.display())
                })?;
            }
        }

        let mut file = fs::File::create(path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        writeln!(file, "{}", rendered)
            .with_context(|| format!("Failed to write report file {}", path.display()))?;

        debug!(file = %file_path, bytes = %rendered.len(), "report_written");
        info!(file = %file_path, "report_saved");
        Ok(())
    }
}
