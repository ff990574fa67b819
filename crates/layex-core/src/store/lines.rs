//! One JSON document per line.

use std::io::Write;

use super::RecordStore;
use crate::error::StoreError;
use crate::models::record::ParsedRecord;

/// Writes records as JSON lines, e.g. to stdout.
#[derive(Debug)]
pub struct JsonLinesStore<W: Write> {
    writer: W,
    in_batch: bool,
}

impl<W: Write> JsonLinesStore<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            in_batch: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordStore for JsonLinesStore<W> {
    fn upsert(&mut self, record: &ParsedRecord) -> Result<(), StoreError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n").map_err(StoreError::Stream)?;
        if !self.in_batch {
            self.writer.flush().map_err(StoreError::Stream)?;
        }
        Ok(())
    }

    fn begin_batch(&mut self) -> Result<(), StoreError> {
        self.in_batch = true;
        Ok(())
    }

    fn end_batch(&mut self) -> Result<(), StoreError> {
        self.in_batch = false;
        self.writer.flush().map_err(StoreError::Stream)
    }

    // Lines already handed to the writer cannot be taken back.
    fn abort_batch(&mut self) -> Result<(), StoreError> {
        self.in_batch = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_one_line_per_record() {
        let mut store = JsonLinesStore::new(Vec::new());
        store.begin_batch().unwrap();
        store.upsert(&ParsedRecord::new("AB-1", "AB1.PDF")).unwrap();
        store.upsert(&ParsedRecord::unreadable("AB-2", "AB2.PDF")).unwrap();
        store.end_batch().unwrap();

        let output = String::from_utf8(store.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"case_id":"AB-1","filename":"AB1.PDF","parsed":false}"#);
        assert!(lines[1].contains(r#""unreadable":true"#));
    }
}
