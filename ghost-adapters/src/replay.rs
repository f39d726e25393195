//! Replay source reading recorded events from newline-delimited JSON
//!
//! One `SourceEvent` per line:
//!
//! ```text
//! {"type":"sample","timestamp":0.0,"distance":0.0,...}
//! {"type":"end_of_lap"}
//! ```

use anyhow::{Context, Result};
use ghost_core::model::{Lap, SourceEvent};
use ghost_core::source::TelemetrySource;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct ReplaySource {
    name: String,
    path: Option<PathBuf>,
    reader: Option<Box<dyn BufRead + Send>>,
    line: usize,
    active: bool,
}

impl ReplaySource {
    /// Replay a recording from disk; the file is opened on `start()`
    pub fn open(path: &Path) -> Self {
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "replay".to_string()),
            path: Some(path.to_path_buf()),
            reader: None,
            line: 0,
            active: false,
        }
    }

    /// Replay from an in-memory or already-open reader
    pub fn from_reader(name: impl Into<String>, reader: impl BufRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            path: None,
            reader: Some(Box::new(reader)),
            line: 0,
            active: false,
        }
    }

    /// Lines consumed so far
    pub fn line(&self) -> usize {
        self.line
    }
}

impl TelemetrySource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<()> {
        if let Some(path) = &self.path {
            let file = File::open(path)
                .with_context(|| format!("Failed to open recording: {}", path.display()))?;
            self.reader = Some(Box::new(BufReader::new(file)));
            self.line = 0;
            info!("Replaying {}", path.display());
        }
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active = false;
        if self.path.is_some() {
            self.reader = None;
        }
        Ok(())
    }

    fn next_event(&mut self) -> Result<Option<SourceEvent>> {
        if !self.active {
            return Ok(None);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut buf = String::new();
        loop {
            buf.clear();
            let read = reader
                .read_line(&mut buf)
                .with_context(|| format!("Failed to read line {} of {}", self.line + 1, self.name))?;
            if read == 0 {
                debug!("{}: end of recording after {} lines", self.name, self.line);
                self.active = false;
                return Ok(None);
            }
            self.line += 1;
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event = serde_json::from_str(trimmed)
                .with_context(|| format!("Invalid event on line {} of {}", self.line, self.name))?;
            return Ok(Some(event));
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Write laps as a replayable recording, an end-of-lap marker after each
pub fn write_recording(writer: &mut impl Write, laps: &[Lap]) -> Result<()> {
    for lap in laps {
        for sample in &lap.samples {
            serde_json::to_writer(&mut *writer, &SourceEvent::Sample(sample.clone()))?;
            writeln!(writer)?;
        }
        serde_json::to_writer(&mut *writer, &SourceEvent::EndOfLap)?;
        writeln!(writer)?;
    }
    Ok(())
}
