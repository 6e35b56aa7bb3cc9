//! Typed entity records decoded from CSV rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::literal::{parse_pair, parse_string_list, LiteralError};
use crate::temp_id::TempId;

// ============================================================================
// Entity kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Group,
    Message,
    Status,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::User,
        EntityKind::Group,
        EntityKind::Message,
        EntityKind::Status,
    ];

    /// Value of `dgraph.type` for nodes of this kind.
    pub fn dgraph_type(self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Group => "Group",
            EntityKind::Message => "Message",
            EntityKind::Status => "Status",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            EntityKind::User => "users.csv",
            EntityKind::Group => "groups.csv",
            EntityKind::Message => "messages.csv",
            EntityKind::Status => "statuses.csv",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dgraph_type())
    }
}

// ============================================================================
// Cell values
// ============================================================================

/// A geo point, serialized as a GeoJSON `Point`.
///
/// Coordinates are kept in the order they appear in the cell, which is the
/// GeoJSON order: longitude, then latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    /// Parse a `(longitude, latitude)` cell.
    pub fn parse(text: &str) -> Result<Self, LiteralError> {
        let [lon, lat] = parse_pair(text)?;
        if !(-180.0..=180.0).contains(&lon) {
            return Err(LiteralError::new(
                text,
                format!("longitude {lon} outside [-180, 180]"),
            ));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(LiteralError::new(
                text,
                format!("latitude {lat} outside [-90, 90]"),
            ));
        }
        Ok(Self {
            coordinates: [lon, lat],
        })
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("GeoPoint", 2)?;
        s.serialize_field("type", "Point")?;
        s.serialize_field("coordinates", &self.coordinates)?;
        s.end()
    }
}

/// A UTC timestamp accepted in RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`
/// form. Date-only values are midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(Self(naive.and_utc()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(midnight.and_utc()));
            }
        }
        Err(format!("invalid timestamp `{text}`"))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

/// Where a message goes: a single user or a single group, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    ToUser(TempId),
    ToGroup(TempId),
}

impl MessageTarget {
    /// Pick the target from the `RECEIVE` and `BELONGS_TO` cells; exactly one
    /// must be non-empty.
    pub fn from_columns(receive: &str, belongs_to: &str) -> Result<Self, &'static str> {
        match (TempId::parse(receive), TempId::parse(belongs_to)) {
            (Some(user), None) => Ok(MessageTarget::ToUser(user)),
            (None, Some(group)) => Ok(MessageTarget::ToGroup(group)),
            (Some(_), Some(_)) => Err("both RECEIVE and BELONGS_TO are set"),
            (None, None) => Err("neither RECEIVE nor BELONGS_TO is set"),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Failure to decode one row; the reader adds file and row context.
#[derive(Debug)]
pub enum RowError {
    Field {
        column: &'static str,
        message: String,
    },
    Literal {
        column: &'static str,
        source: LiteralError,
    },
    MessageTarget {
        uid: String,
        problem: &'static str,
    },
}

/// An entity decoded from one CSV row.
pub trait CsvEntity: Sized {
    /// Raw row shape, deserialized by header name.
    type Row: DeserializeOwned;

    const KIND: EntityKind;

    fn from_row(row: Self::Row) -> Result<Self, RowError>;

    fn temp_id(&self) -> &TempId;
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub uid: TempId,
    pub name: String,
    pub description: String,
    pub phone: i64,
    pub location: GeoPoint,
    pub send: Vec<TempId>,
    pub post: Vec<TempId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub uid: TempId,
    pub name: String,
    pub description: String,
    pub has: Vec<TempId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub uid: TempId,
    pub content: String,
    pub reactions: Vec<String>,
    pub send_at: Timestamp,
    pub target: MessageTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub uid: TempId,
    pub content: String,
    pub text: String,
    pub posted_at: Timestamp,
    pub seen: Vec<TempId>,
}

#[derive(Debug, Deserialize)]
pub struct UserRow {
    uid: String,
    name: String,
    description: String,
    phone: String,
    location: String,
    #[serde(rename = "SEND")]
    send: String,
    #[serde(rename = "POST")]
    post: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupRow {
    uid: String,
    name: String,
    description: String,
    #[serde(rename = "HAS")]
    has: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRow {
    uid: String,
    content: String,
    reactions: String,
    #[serde(rename = "sendAt")]
    send_at: String,
    #[serde(rename = "BELONGS_TO")]
    belongs_to: String,
    #[serde(rename = "RECEIVE")]
    receive: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRow {
    uid: String,
    content: String,
    text: String,
    #[serde(rename = "postedAt")]
    posted_at: String,
    #[serde(rename = "SEEN")]
    seen: String,
}

fn temp_id(column: &'static str, raw: &str) -> Result<TempId, RowError> {
    TempId::parse(raw).ok_or_else(|| RowError::Field {
        column,
        message: "empty identifier".to_string(),
    })
}

fn temp_id_list(column: &'static str, raw: &str) -> Result<Vec<TempId>, RowError> {
    parse_string_list(raw)
        .map_err(|source| RowError::Literal { column, source })?
        .iter()
        .map(|id| temp_id(column, id))
        .collect()
}

fn timestamp(column: &'static str, raw: &str) -> Result<Timestamp, RowError> {
    Timestamp::parse(raw).map_err(|message| RowError::Field { column, message })
}

impl CsvEntity for UserRecord {
    type Row = UserRow;
    const KIND: EntityKind = EntityKind::User;

    fn from_row(row: UserRow) -> Result<Self, RowError> {
        let phone = row.phone.trim().parse::<i64>().map_err(|e| RowError::Field {
            column: "phone",
            message: format!("invalid integer `{}`: {e}", row.phone.trim()),
        })?;
        let location = GeoPoint::parse(&row.location).map_err(|source| RowError::Literal {
            column: "location",
            source,
        })?;

        Ok(UserRecord {
            uid: temp_id("uid", &row.uid)?,
            name: row.name,
            description: row.description,
            phone,
            location,
            send: temp_id_list("SEND", &row.send)?,
            post: temp_id_list("POST", &row.post)?,
        })
    }

    fn temp_id(&self) -> &TempId {
        &self.uid
    }
}

impl CsvEntity for GroupRecord {
    type Row = GroupRow;
    const KIND: EntityKind = EntityKind::Group;

    fn from_row(row: GroupRow) -> Result<Self, RowError> {
        Ok(GroupRecord {
            uid: temp_id("uid", &row.uid)?,
            name: row.name,
            description: row.description,
            has: temp_id_list("HAS", &row.has)?,
        })
    }

    fn temp_id(&self) -> &TempId {
        &self.uid
    }
}

impl CsvEntity for MessageRecord {
    type Row = MessageRow;
    const KIND: EntityKind = EntityKind::Message;

    fn from_row(row: MessageRow) -> Result<Self, RowError> {
        let uid = temp_id("uid", &row.uid)?;
        let target = MessageTarget::from_columns(&row.receive, &row.belongs_to).map_err(
            |problem| RowError::MessageTarget {
                uid: uid.to_string(),
                problem,
            },
        )?;
        let reactions = parse_string_list(&row.reactions).map_err(|source| RowError::Literal {
            column: "reactions",
            source,
        })?;

        Ok(MessageRecord {
            uid,
            content: row.content,
            reactions,
            send_at: timestamp("sendAt", &row.send_at)?,
            target,
        })
    }

    fn temp_id(&self) -> &TempId {
        &self.uid
    }
}

impl CsvEntity for StatusRecord {
    type Row = StatusRow;
    const KIND: EntityKind = EntityKind::Status;

    fn from_row(row: StatusRow) -> Result<Self, RowError> {
        Ok(StatusRecord {
            uid: temp_id("uid", &row.uid)?,
            content: row.content,
            text: row.text,
            posted_at: timestamp("postedAt", &row.posted_at)?,
            seen: temp_id_list("SEEN", &row.seen)?,
        })
    }

    fn temp_id(&self) -> &TempId {
        &self.uid
    }
}
