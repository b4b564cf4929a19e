/// Event identifiers are UUID v4 strings unless the producer supplies its own.
pub type EventId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
