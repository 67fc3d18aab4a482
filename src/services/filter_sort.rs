use crate::core::{Record, SortDirection, SortSpec, Value};
use crate::services::debounce::{BusyIndicator, Debouncer};
use std::cmp::Ordering;
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest accepted filter string, in characters
pub const MAX_FILTER_LEN: usize = 100;
pub const DEFAULT_FILTER_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_BUSY_MIN: Duration = Duration::from_millis(500);

/// Pinned ordering for mixed-type values
///
/// Kinds rank `Null < Bool < Number < Text`; within a kind booleans order
/// false before true, numbers by `f64::total_cmp` and text byte-wise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    }
}

/// Compare two records by `key`; a missing field ranks as null
pub fn compare_records(a: &Record, b: &Record, key: &str) -> Ordering {
    let null = Value::Null;
    compare_values(a.get(key).unwrap_or(&null), b.get(key).unwrap_or(&null))
}

/// Case-insensitive substring match against every field's display form
pub fn record_matches(record: &Record, needle_lower: &str) -> bool {
    needle_lower.is_empty()
        || record
            .values()
            .any(|value| value.to_string().to_lowercase().contains(needle_lower))
}

/// Indices of records passing `filter`, in input order
pub fn filter_indices(records: &[Record], filter: &str) -> Vec<usize> {
    let needle = filter.to_lowercase();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| record_matches(record, &needle))
        .map(|(i, _)| i)
        .collect()
}

pub fn filter_records<'a>(records: &'a [Record], filter: &str) -> Vec<&'a Record> {
    filter_indices(records, filter)
        .into_iter()
        .map(|i| &records[i])
        .collect()
}

/// Stable sort of record references; a `None` key leaves the order unchanged
pub fn sort_records(rows: &mut [&Record], key: Option<&str>, direction: SortDirection) {
    let Some(key) = key else {
        return;
    };
    rows.sort_by(|a, b| {
        let ord = compare_records(a, b, key);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

/// Visible row indices: filter, then stable sort
///
/// A sort key that is not a field of any record leaves the filtered order as is.
pub fn visible_indices(records: &[Record], filter: &str, sort: &SortSpec) -> Vec<usize> {
    let mut indices = filter_indices(records, filter);
    if let Some(key) = sort.key.as_deref() {
        indices.sort_by(|&a, &b| {
            let ord = compare_records(&records[a], &records[b], key);
            match sort.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }
    indices
}

pub fn visible_rows<'a>(records: &'a [Record], filter: &str, sort: &SortSpec) -> Vec<&'a Record> {
    visible_indices(records, filter, sort)
        .into_iter()
        .map(|i| &records[i])
        .collect()
}

/// Filter text and sort state of one grid view
///
/// The typed filter is applied after a quiet window; `revision` bumps every
/// time the applied filter or the sort changes so views know to recompute.
#[derive(Debug, Clone)]
pub struct QueryState {
    filter: String,
    applied_filter: String,
    sort: SortSpec,
    debounce: Debouncer<String>,
    busy: BusyIndicator,
    revision: u64,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_DEBOUNCE, DEFAULT_BUSY_MIN)
    }
}

impl QueryState {
    pub fn new(debounce_window: Duration, busy_min: Duration) -> Self {
        Self {
            filter: String::new(),
            applied_filter: String::new(),
            sort: SortSpec::default(),
            debounce: Debouncer::new(debounce_window),
            busy: BusyIndicator::new(busy_min),
            revision: 0,
        }
    }

    /// Text as typed
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Text the visible rows are currently filtered by
    pub fn applied_filter(&self) -> &str {
        &self.applied_filter
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_active()
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Update the filter text
    ///
    /// Returns false and leaves the state untouched when `text` exceeds
    /// [`MAX_FILTER_LEN`]. Clearing the filter restores the default sort.
    pub fn set_filter(&mut self, text: impl Into<String>, now: Instant) -> bool {
        let text = text.into();
        if text.chars().count() > MAX_FILTER_LEN {
            debug!("Rejected filter of {} characters", text.chars().count());
            return false;
        }
        if text.is_empty() && self.sort != SortSpec::default() {
            self.sort = SortSpec::default();
            self.revision += 1;
        }
        self.filter = text.clone();
        self.debounce.push(text, now);
        self.busy.raise(now);
        true
    }

    pub fn push_char(&mut self, c: char, now: Instant) -> bool {
        let mut text = self.filter.clone();
        text.push(c);
        self.set_filter(text, now)
    }

    pub fn pop_char(&mut self, now: Instant) -> bool {
        if self.filter.is_empty() {
            return false;
        }
        let mut text = self.filter.clone();
        text.pop();
        self.set_filter(text, now)
    }

    pub fn clear_filter(&mut self, now: Instant) -> bool {
        self.set_filter(String::new(), now)
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        if self.sort != sort {
            self.sort = sort;
            self.revision += 1;
        }
    }

    /// Sort by `key`; the same key again flips the direction
    pub fn toggle_sort(&mut self, key: &str) {
        let next = match &self.sort.key {
            Some(current) if current == key => {
                SortSpec::new(key, self.sort.direction.reversed())
            }
            _ => SortSpec::new(key, SortDirection::Ascending),
        };
        self.set_sort(next);
    }

    /// Advance timers; returns true when the applied filter changed
    pub fn tick(&mut self, now: Instant) -> bool {
        let changed = match self.debounce.poll(now) {
            Some(text) => self.apply(text),
            None => false,
        };
        if !self.debounce.is_pending() {
            self.busy.try_clear(now);
        }
        changed
    }

    /// Apply the pending filter right away
    pub fn flush(&mut self) -> bool {
        let changed = match self.debounce.flush() {
            Some(text) => self.apply(text),
            None => false,
        };
        self.busy.clear();
        changed
    }

    /// Drop pending work; used when the view is torn down
    pub fn cancel(&mut self) {
        if self.debounce.cancel() {
            debug!("Cancelled pending filter update");
        }
        self.busy.clear();
    }

    fn apply(&mut self, text: String) -> bool {
        if self.applied_filter == text {
            return false;
        }
        self.applied_filter = text;
        self.revision += 1;
        true
    }
}
