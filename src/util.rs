//! Small shared helpers.

use chrono::{SecondsFormat, Utc};

/// Current time as an RFC 3339 / ISO 8601 string with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
