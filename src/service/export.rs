//! Loot log output: semicolon CSV rows and JSON export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{ProtocolError, Result};
use crate::service::sink::LootObserver;
use crate::world::{LootEvent, CSV_HEADER};

/// Appends one CSV row per event after writing the header.
#[derive(Debug)]
pub struct LootLogWriter<W: Write> {
    writer: W,
    rows: usize,
}

impl<W: Write> LootLogWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "{CSV_HEADER}")?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_event(&mut self, event: &LootEvent) -> Result<()> {
        writeln!(self.writer, "{}", event.to_csv_line())?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl LootLogWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }

    /// Create `loot-events-<UTC timestamp>.csv` inside `dir`.
    pub fn create_in<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let name = format!("loot-events-{}.csv", Utc::now().format("%Y%m%d-%H%M%S"));
        Self::create(dir.as_ref().join(name))
    }
}

/// Observer writing every event to a shared [`LootLogWriter`].
#[derive(Debug)]
pub struct CsvLogObserver<W: Write + Send> {
    writer: Mutex<LootLogWriter<W>>,
}

impl<W: Write + Send> CsvLogObserver<W> {
    pub fn new(writer: LootLogWriter<W>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> LootObserver for CsvLogObserver<W> {
    fn on_loot(&self, event: &LootEvent) -> Result<()> {
        self.writer
            .lock()
            .map_err(|_| ProtocolError::Observer("csv writer lock poisoned".to_string()))?
            .write_event(event)
    }
}

pub fn events_to_json(events: &[LootEvent]) -> Result<String> {
    Ok(serde_json::to_string_pretty(events)?)
}

pub fn events_from_json(content: &str) -> Result<Vec<LootEvent>> {
    Ok(serde_json::from_str(content)?)
}

pub fn write_json<P: AsRef<Path>>(path: P, events: &[LootEvent]) -> Result<()> {
    std::fs::write(path, events_to_json(events)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Player;

    fn sample() -> LootEvent {
        LootEvent::new(
            "T4_BAG",
            "Adept's Bag",
            2,
            Player::with_tags("Alice", "Knights", ""),
            Player::new("Bob"),
        )
    }

    #[test]
    fn test_csv_writer() {
        let mut writer = LootLogWriter::new(Vec::new()).unwrap();
        writer.write_event(&sample()).unwrap();
        assert_eq!(writer.rows(), 1);
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(";;Knights;Alice;T4_BAG;Adept's Bag;2;;;Bob"));
    }

    #[test]
    fn test_json_export_nests_players() {
        let events = vec![sample()];
        let json = events_to_json(&events).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["looted_by"]["guild"], "Knights");
        assert_eq!(value[0]["looted_from"]["name"], "Bob");
        assert_eq!(events_from_json(&json).unwrap(), events);
    }

    #[test]
    fn test_csv_observer_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loot.csv");
        let observer = CsvLogObserver::new(LootLogWriter::create(&path).unwrap());
        observer.on_loot(&sample()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
