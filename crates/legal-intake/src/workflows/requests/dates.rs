//! Date normalization for form fields.
//!
//! Persisted documents carry dates in whatever shape the previous writer used
//! (`2025-03-01`, `2025-03-01T00:00:00.000Z`, `01/03/2025`). Every date field in
//! the form deserializes through these helpers so the session only ever sees
//! `NaiveDate`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serializer};

pub const FORM_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_form_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, FORM_DATE_FORMAT) {
        return Ok(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(stamp.date_naive());
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(stamp.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
        return Ok(date);
    }

    Err(format!(
        "failed to parse '{raw}' as YYYY-MM-DD, RFC 3339 or DD/MM/YYYY"
    ))
}

/// Serde adapter for optional date fields.
pub mod lenient_date_opt {
    use super::*;

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format(FORM_DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<String>::deserialize(deserializer)?;
        opt.filter(|value| !value.trim().is_empty())
            .map(|value| parse_form_date(&value).map_err(serde::de::Error::custom))
            .transpose()
    }
}
