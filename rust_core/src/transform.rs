//! Pure field-level transforms applied to vendor records.
//!
//! Every function here is total over its string input: malformed values map
//! to `None` (or a neutral default), never to an error. Record-level skip
//! decisions live in the vendor clients; this module only normalizes fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a height string like `6'4"` into total inches.
///
/// Accepts a bare feet value (`6'`) and a bare number already in inches
/// (`"76"`). Returns `None` for anything unparseable.
pub fn parse_height(raw: &str) -> Option<i32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some((feet_part, inch_part)) = s.split_once('\'') {
        let feet: i32 = feet_part.trim().parse().ok()?;
        let inch_str = inch_part.trim().trim_end_matches('"').trim();
        let inches: i32 = if inch_str.is_empty() {
            0
        } else {
            inch_str.parse().ok()?
        };
        if feet < 0 || !(0..12).contains(&inches) {
            return None;
        }
        return Some(feet * 12 + inches);
    }

    // Some feeds already report inches as a plain number.
    s.parse().ok()
}

/// Parse a weight string like `215lbs`, `215 lbs` or `215` into pounds.
pub fn parse_weight(raw: &str) -> Option<i32> {
    let s = raw
        .trim()
        .to_lowercase()
        .trim_end_matches("lbs.")
        .trim_end_matches("lbs")
        .trim_end_matches("lb")
        .trim()
        .to_string();
    if s.is_empty() {
        return None;
    }
    // Tolerate "215.0" style values.
    match s.parse::<i32>() {
        Ok(v) => Some(v),
        Err(_) => s.parse::<f64>().ok().map(|f| f.round() as i32),
    }
}

/// Normalize a vendor timestamp to UTC.
///
/// Tries RFC 3339 first, then the zone-less `YYYY-MM-DDTHH:MM:SS` format
/// some feeds emit (assumed UTC).
pub fn normalize_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Normalize a vendor date (possibly a full timestamp) to a calendar date.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    // A valid YYYY-MM-DD prefix is ASCII; get() rejects anything where the
    // tenth byte lands inside a multibyte character instead of panicking.
    let prefix = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Shooting/success percentage with a zero-attempt guard.
pub fn pct(makes: f64, attempts: f64) -> f64 {
    if attempts <= 0.0 {
        0.0
    } else {
        makes / attempts * 100.0
    }
}

/// Split a full team name like "Boston Red Sox" into (city, nickname).
///
/// The first word is taken as the city and the rest as the nickname, so
/// multi-word nicknames ("Red Sox", "Maple Leafs") survive intact.
/// Single-word names come back with an empty city.
pub fn split_city_name(full_name: &str) -> (String, String) {
    let trimmed = full_name.trim();
    match trimmed.split_once(' ') {
        Some((city, nickname)) => (city.to_string(), nickname.to_string()),
        None => (String::new(), trimmed.to_string()),
    }
}

/// Best-effort string for JSON values that may be string or number.
pub fn value_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
