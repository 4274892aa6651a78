//! 5-field Vixie-cron parsing on top of the `cron` crate's native 6/7-field
//! (`sec min hour dom month dow [year]`) syntax.
//!
//! VolSync's schedule fields are `minute hour day-of-month month
//! day-of-week`, optionally replaced by one of the `@predefined` aliases.
//! Rather than hand-rolling a parser, every alias and raw 5-field
//! expression is normalized onto the 6-field form by prepending a literal
//! `"0"` seconds field, so `cron::Schedule::from_str` does the actual
//! step/range/list/wildcard parsing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use once_cell::sync::Lazy;
use regex::Regex;

/// Shape of a single Vixie cron field: a wildcard or number, optionally a
/// range and/or step, any number of comma-separated repeats.
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\*|[0-9]+)(-[0-9]+)?(/[0-9]+)?(,(\*|[0-9]+)(-[0-9]+)?(/[0-9]+)?)*$").unwrap()
});

fn expand_alias(expr: &str) -> Option<&'static str> {
    match expr.trim() {
        "@yearly" | "@annually" => Some("0 0 1 1 *"),
        "@monthly" => Some("0 0 1 * *"),
        "@weekly" => Some("0 0 * * 0"),
        "@daily" => Some("0 0 * * *"),
        "@hourly" => Some("0 * * * *"),
        _ => None,
    }
}

/// Validate that `expr` is a syntactically well-formed 5-field expression
/// or a recognized `@alias`, and that the normalized form is accepted by
/// the underlying cron engine.
pub fn validate_5field(expr: &str) -> Result<(), String> {
    to_schedule(expr).map(|_| ())
}

/// Normalize and parse a VolSync schedule string into a `cron::Schedule`.
pub fn to_schedule(expr: &str) -> Result<Schedule, String> {
    let five_field = if let Some(expanded) = expand_alias(expr) {
        expanded.to_string()
    } else {
        let trimmed = expr.trim();
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "cron schedule {:?} must have exactly 5 fields (minute hour dom month dow) \
                 or be a @predefined alias, found {}",
                expr,
                fields.len()
            ));
        }
        for field in &fields {
            if !FIELD_RE.is_match(field) {
                return Err(format!(
                    "cron schedule {:?} has an invalid field {:?}",
                    expr, field
                ));
            }
        }
        trimmed.to_string()
    };

    let six_field = format!("0 {}", five_field);
    Schedule::from_str(&six_field)
        .map_err(|e| format!("cron schedule {:?} is invalid: {}", expr, e))
}

/// First fire time strictly after `after`, in UTC, per the spec's
/// `firstFireTimeAfter` semantics.
pub fn first_fire_time_after(expr: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, String> {
    let schedule = to_schedule(expr)?;
    Ok(schedule.after(&after).next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hourly_alias_matches_explicit_expression() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 10, 0).unwrap();
        let alias_next = first_fire_time_after("@hourly", from).unwrap();
        let explicit_next = first_fire_time_after("0 * * * *", from).unwrap();
        assert_eq!(alias_next, explicit_next);
        assert_eq!(alias_next, Some(Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap()));
    }

    #[test]
    fn rejects_non_cron_garbage() {
        assert!(validate_5field("every-tuesday").is_err());
    }

    #[test]
    fn accepts_standard_five_field() {
        assert!(validate_5field("*/15 * * * *").is_ok());
        assert!(validate_5field("0 2 * * 2").is_ok());
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(validate_5field("* * * *").is_err());
        assert!(validate_5field("* * * * * *").is_err());
    }

    #[test]
    fn every_15_minutes_from_creation() {
        let creation = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let next = first_fire_time_after("*/15 * * * *", creation).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 1, 0, 15, 0).unwrap());
    }
}
