use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One observation in a time series.
///
/// The timestamp keeps the UTC offset it was recorded with so scripts can
/// reason about local calendar days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default)]
    pub feature_id: i64,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub note: String,
}

impl DataPoint {
    pub fn new(timestamp: DateTime<FixedOffset>, value: f64) -> Self {
        Self {
            timestamp,
            feature_id: 0,
            value,
            label: String::new(),
            note: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_feature(mut self, feature_id: i64) -> Self {
        self.feature_id = feature_id;
        self
    }

    /// Epoch milliseconds, the unit scripts see.
    pub fn epoch_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// UTC offset in seconds.
    pub fn offset_seconds(&self) -> i32 {
        self.timestamp.offset().local_minus_utc()
    }
}

/// Build a timestamp from the (millis, offset seconds) pair scripts use.
///
/// Returns `None` when either component is out of chrono's range.
pub fn timestamp_from_parts(epoch_millis: i64, offset_seconds: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset_seconds)?;
    let utc = DateTime::<Utc>::from_timestamp_millis(epoch_millis)?;
    Some(offset.from_utc_datetime(&utc.naive_utc()))
}
