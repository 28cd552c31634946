use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::{Reader, StringRecord};
use log::{error, trace};
use serde_json::{Map, Value};

use super::SampleSource;
use crate::error::SourceError;
use crate::message::Reading;

/// Replays a delimited file, one reading per row in file order.
///
/// Each row becomes a JSON object keyed by the header row. A row whose field
/// count does not match the header is a parse error, not a skipped row.
pub struct ReplaySource {
    path: PathBuf,
    reader: Reader<File>,
    headers: StringRecord,
    record: StringRecord,
    exhausted: bool,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        trace!("Opening replay file {}", path.display());
        let mut reader = Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            headers,
            record: StringRecord::new(),
            exhausted: false,
        })
    }

    fn row_to_reading(&self) -> Reading {
        let row: Map<String, Value> = self
            .headers
            .iter()
            .zip(self.record.iter())
            .map(|(name, cell)| (name.to_owned(), Value::String(cell.to_owned())))
            .collect();
        Value::Object(row)
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn next_reading(&mut self) -> Result<Option<Reading>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }
        match self.reader.read_record(&mut self.record) {
            Ok(true) => Ok(Some(self.row_to_reading())),
            Ok(false) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(source) => {
                let line = source.position().map_or(0, |pos| pos.line());
                error!("Error reading {}, line {line}: {source}", self.path.display());
                self.exhausted = true;
                Err(SourceError::Parse { line, source })
            }
        }
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
