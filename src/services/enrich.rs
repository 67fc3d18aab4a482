//! Date bucket enrichment for the pivot view.
//!
//! `Week` pairs the calendar year with the ISO 8601 week number, so the last
//! days of December can read `2024-01` and the first days of January `2021-53`.

use crate::core::{Dataset, Record, Value};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

pub const DATE_FIELD: &str = "date";
pub const YEAR_FIELD: &str = "Year";
pub const MONTH_FIELD: &str = "Month";
pub const WEEK_FIELD: &str = "Week";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse the date forms found in the source data
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Year, Month and Week bucket strings for a date
pub fn date_buckets(date: NaiveDate) -> (String, String, String) {
    let year = date.format("%Y").to_string();
    (
        year.clone(),
        date.format("%Y-%m").to_string(),
        format!("{}-{:02}", year, date.iso_week().week()),
    )
}

/// Copy of `record` with derived date fields when its `date` field parses
///
/// Records without a usable `date` come back with identical fields.
pub fn enrich_record(record: &Record) -> Record {
    let mut enriched = record.clone();
    if let Some(date) = record
        .get(DATE_FIELD)
        .and_then(Value::as_text)
        .and_then(parse_date)
    {
        let (year, month, week) = date_buckets(date);
        enriched.insert(YEAR_FIELD, year);
        enriched.insert(MONTH_FIELD, month);
        enriched.insert(WEEK_FIELD, week);
    }
    enriched
}

pub fn enrich_records(records: &[Record]) -> Vec<Record> {
    records.iter().map(enrich_record).collect()
}

/// Enrich every record; derived fields join the header list when any record gained them
pub fn enrich_dataset(dataset: &Dataset) -> Dataset {
    let records = enrich_records(dataset.records());
    let mut headers = dataset.headers().to_vec();
    if records.iter().any(|r| r.contains_key(WEEK_FIELD)) {
        for field in [YEAR_FIELD, MONTH_FIELD, WEEK_FIELD] {
            if !headers.iter().any(|h| h == field) {
                headers.push(field.to_string());
            }
        }
    }
    Dataset::new(headers, records)
}
