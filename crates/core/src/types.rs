/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Username recorded for requests without an authenticated user.
pub const ANONYMOUS: &str = "anonymous";
