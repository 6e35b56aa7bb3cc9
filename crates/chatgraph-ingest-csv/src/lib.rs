//! CSV ingestion for chatgraph
//!
//! Reads the four demo exports into typed records:
//! - `users.csv`    -> [`UserRecord`]
//! - `groups.csv`   -> [`GroupRecord`]
//! - `messages.csv` -> [`MessageRecord`]
//! - `statuses.csv` -> [`StatusRecord`]
//!
//! Relationship columns hold Python-literal lists of temporary ids; they are
//! decoded here but resolved to server uids by the loader.

pub mod literal;
pub mod reader;
pub mod records;
pub mod temp_id;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use literal::LiteralError;
pub use reader::{read_all, EntityReader};
pub use records::{
    CsvEntity, EntityKind, GeoPoint, GroupRecord, MessageRecord, MessageTarget, StatusRecord,
    Timestamp, UserRecord,
};
pub use temp_id::TempId;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{source_name}: row {row}: {source}")]
    Csv {
        source_name: String,
        row: usize,
        source: csv::Error,
    },
    #[error("{source_name}: row {row}, column `{column}`: {message}")]
    Field {
        source_name: String,
        row: usize,
        column: &'static str,
        message: String,
    },
    #[error("{source_name}: row {row}, column `{column}`: {source}")]
    Literal {
        source_name: String,
        row: usize,
        column: &'static str,
        source: LiteralError,
    },
    #[error("{source_name}: row {row}: message `{uid}`: {problem}")]
    MessageTarget {
        source_name: String,
        row: usize,
        uid: String,
        problem: &'static str,
    },
}

/// Locations of the four CSV exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSet {
    pub users: PathBuf,
    pub groups: PathBuf,
    pub messages: PathBuf,
    pub statuses: PathBuf,
}

impl DataSet {
    /// The standard file names inside `dir`.
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            users: dir.join(EntityKind::User.file_name()),
            groups: dir.join(EntityKind::Group.file_name()),
            messages: dir.join(EntityKind::Message.file_name()),
            statuses: dir.join(EntityKind::Status.file_name()),
        }
    }

    pub fn path(&self, kind: EntityKind) -> &Path {
        match kind {
            EntityKind::User => &self.users,
            EntityKind::Group => &self.groups,
            EntityKind::Message => &self.messages,
            EntityKind::Status => &self.statuses,
        }
    }

    /// Fail early when a file is missing, before anything is sent to the server.
    pub fn check(&self) -> Result<(), IngestError> {
        for kind in EntityKind::ALL {
            let path = self.path(kind);
            std::fs::metadata(path).map_err(|source| IngestError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}
