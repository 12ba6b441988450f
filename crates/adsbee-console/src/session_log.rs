//! Append-only session log. Raw received lines with timestamps, flushed
//! per line so a crash loses nothing.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;

pub struct SessionLog {
    file: File,
}

impl SessionLog {
    pub fn open(path: &Path, host: &str) -> io::Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let rule = "=".repeat(80);
        writeln!(file, "\n{rule}")?;
        writeln!(file, "Session started: {}", Local::now())?;
        writeln!(file, "Host: {host}")?;
        writeln!(file, "{rule}")?;
        Ok(Self { file })
    }

    pub fn record(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.file, "{}: {line}", Local::now())?;
        self.file.flush()
    }
}
