use crate::signal::Events;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse newline-delimited peak indices, ignoring blank/comment lines.
/// An empty file is a valid empty stream.
pub fn parse_events(text: &str) -> Result<Events> {
    let mut indices = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: usize = trimmed
            .parse()
            .with_context(|| format!("line {} is not a sample index: {}", idx + 1, trimmed))?;
        indices.push(val);
    }
    Ok(Events::from_indices(indices))
}

/// Read a newline-delimited peak index file from disk.
pub fn read_events(path: &Path) -> Result<Events> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_events(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Write one sample index per line.
pub fn write_events(path: &Path, events: &Events) -> Result<()> {
    let mut out = String::new();
    for &idx in &events.indices {
        out.push_str(&idx.to_string());
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))
}
