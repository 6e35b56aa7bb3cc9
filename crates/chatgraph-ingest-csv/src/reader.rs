//! Lazy, typed CSV readers.

use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;

use crate::records::{CsvEntity, RowError};
use crate::IngestError;

/// Iterator over the entities of one CSV file.
///
/// Rows are decoded one at a time. The first error is returned as an item; the
/// caller decides whether to stop (the loader always does).
pub struct EntityReader<T: CsvEntity, R: Read> {
    source: String,
    rows: csv::DeserializeRecordsIntoIter<R, T::Row>,
    row: usize,
    _entity: PhantomData<T>,
}

impl<T: CsvEntity, R: Read> EntityReader<T, R> {
    /// `source` labels errors (usually the file path).
    pub fn from_reader(source: impl Into<String>, reader: R) -> Self {
        let rows = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_deserialize();
        Self {
            source: source.into(),
            rows,
            row: 0,
            _entity: PhantomData,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl<T: CsvEntity> EntityReader<T, BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        let file = File::open(path).map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(
            path.display().to_string(),
            BufReader::new(file),
        ))
    }
}

impl<T: CsvEntity, R: Read> Iterator for EntityReader<T, R> {
    type Item = Result<T, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.rows.next()?;
        self.row += 1;
        let row = self.row;

        let decoded = match raw {
            Ok(raw) => raw,
            Err(source) => {
                return Some(Err(IngestError::Csv {
                    source_name: self.source.clone(),
                    row,
                    source,
                }))
            }
        };

        Some(T::from_row(decoded).map_err(|e| match e {
            RowError::Field { column, message } => IngestError::Field {
                source_name: self.source.clone(),
                row,
                column,
                message,
            },
            RowError::Literal { column, source } => IngestError::Literal {
                source_name: self.source.clone(),
                row,
                column,
                source,
            },
            RowError::MessageTarget { uid, problem } => IngestError::MessageTarget {
                source_name: self.source.clone(),
                row,
                uid,
                problem,
            },
        }))
    }
}

/// Read a whole file, stopping at the first bad row.
pub fn read_all<T: CsvEntity>(path: &Path) -> Result<Vec<T>, IngestError> {
    EntityReader::<T, _>::open(path)?.collect()
}
