use chrono::{DateTime, Utc};

pub const MILLIS_PER_DAY: i64 = 86_400_000;

pub const ERROR_TITLE: &str = "ERROR";
pub const ERROR_TEXT: &str = "UNABLE TO LOAD POEM";
pub const LOADING_TITLE: &str = "LOADING...";
pub const LOADING_TEXT: &str = "LOADING POEM...";

/// Converts a service day index (days since the Unix epoch) into a UTC timestamp.
///
/// Returns `None` if the index is outside the range chrono can represent.
pub fn day_index_to_date(day_index: i64) -> Option<DateTime<Utc>> {
    let millis = day_index.checked_mul(MILLIS_PER_DAY)?;
    DateTime::from_timestamp_millis(millis)
}

/// Day index containing `now`, rounding toward the start of time for pre-epoch instants.
pub fn day_index_for(now: DateTime<Utc>) -> i64 {
    now.timestamp_millis().div_euclid(MILLIS_PER_DAY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    Rejected,
    PartialLoad,
}

impl FailureKind {
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::Unavailable | FailureKind::PartialLoad => {
                "The poem service could not be reached."
            }
            FailureKind::Rejected => "The poem service declined to write a new poem.",
        }
    }
}

/// Poem body and optional title as returned by the current-poem query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurrentPoem {
    pub title: Option<String>,
    pub text: String,
}

/// Fully assembled client view of the remote poem state.
///
/// Snapshots are never edited after construction; the controller replaces the current one
/// wholesale. The calendar date is derived from `last_update_day_index` on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoemSnapshot {
    title: String,
    text: String,
    count: u64,
    last_update_day_index: Option<i64>,
    status: SnapshotStatus,
    error_message: String,
}

impl PoemSnapshot {
    pub fn idle() -> Self {
        Self {
            title: String::new(),
            text: String::new(),
            count: 0,
            last_update_day_index: None,
            status: SnapshotStatus::Idle,
            error_message: String::new(),
        }
    }

    pub fn loading() -> Self {
        Self {
            status: SnapshotStatus::Loading,
            ..Self::idle()
        }
    }

    /// Builds a ready snapshot. The caller must have checked that the day index converts.
    pub fn ready(poem: CurrentPoem, count: u64, last_update_day_index: i64) -> Self {
        Self {
            title: poem.title.unwrap_or_default(),
            text: poem.text,
            count,
            last_update_day_index: Some(last_update_day_index),
            status: SnapshotStatus::Ready,
            error_message: String::new(),
        }
    }

    pub fn failed(kind: FailureKind) -> Self {
        Self {
            title: ERROR_TITLE.to_string(),
            text: ERROR_TEXT.to_string(),
            count: 0,
            last_update_day_index: None,
            status: SnapshotStatus::Error,
            error_message: kind.user_message().to_string(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn last_update_day_index(&self) -> Option<i64> {
        self.last_update_day_index
    }

    pub fn last_update_date(&self) -> Option<DateTime<Utc>> {
        self.last_update_day_index.and_then(day_index_to_date)
    }

    pub fn status(&self) -> SnapshotStatus {
        self.status
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn is_busy(&self) -> bool {
        self.status == SnapshotStatus::Loading
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            LOADING_TITLE
        } else {
            &self.title
        }
    }

    pub fn display_text(&self) -> &str {
        if self.text.is_empty() {
            LOADING_TEXT
        } else {
            &self.text
        }
    }
}

impl Default for PoemSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
