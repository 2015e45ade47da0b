//! Date/time functions
//!
//! Instants are numbers of milliseconds since 1970-01-01T00:00:00Z. All
//! parsing and formatting happens in UTC so that results do not depend on
//! the host's time zone. Formatting functions take the instant as their
//! argument (a number, or text accepted by `Date.parse`).

use super::arg;
use crate::error::{FormulaError, FormulaResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rowcalc_core::Value;

/// Largest representable distance from the epoch, in milliseconds
const MAX_TIME_MS: f64 = 8.64e15;
const MS_PER_DAY: f64 = 86_400_000.0;

const INVALID_DATE: &str = "Invalid Date";

/// NOW (volatile)
pub fn fn_now(_args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(Utc::now().timestamp_millis() as f64))
}

/// PARSE: text to milliseconds, NaN when unrecognized
pub fn fn_parse(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(parse_timestamp(&arg(args, 0).to_text())))
}

/// UTC(year, monthIndex, day = 1, hours = 0, minutes = 0, seconds = 0, ms = 0)
///
/// Months are zero-based and out-of-range fields carry over, so
/// `UTC(2024, 12, 1)` is 2025-01-01. Years 0 through 99 mean 1900-1999.
pub fn fn_utc(args: &[Value]) -> FormulaResult<Value> {
    let field = |index: usize, default: f64| match args.get(index) {
        Some(v) => v.to_number().trunc(),
        None => default,
    };
    let fields = [
        field(0, f64::NAN),
        field(1, 0.0),
        field(2, 1.0),
        field(3, 0.0),
        field(4, 0.0),
        field(5, 0.0),
        field(6, 0.0),
    ];
    if fields.iter().any(|f| !f.is_finite()) {
        return Ok(Value::Number(f64::NAN));
    }
    let [mut year, month, day, hours, minutes, seconds, millis] = fields;
    if (0.0..=99.0).contains(&year) {
        year += 1900.0;
    }

    let year = year + (month / 12.0).floor();
    let month = month.rem_euclid(12.0);
    let epoch_days = match days_from_epoch(year, month as u32 + 1) {
        Some(days) => days,
        None => return Ok(Value::Number(f64::NAN)),
    };

    let ms = (epoch_days + day - 1.0) * MS_PER_DAY
        + hours * 3_600_000.0
        + minutes * 60_000.0
        + seconds * 1_000.0
        + millis;
    Ok(Value::Number(time_clip(ms)))
}

pub fn fn_to_iso_string(args: &[Value]) -> FormulaResult<Value> {
    let dt = datetime_arg(args)
        .ok_or_else(|| FormulaError::Argument("Invalid time value".into()))?;
    Ok(Value::Text(dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()))
}

pub fn fn_to_locale_string(args: &[Value]) -> FormulaResult<Value> {
    Ok(format_or_invalid(args, "%-m/%-d/%Y, %-I:%M:%S %p"))
}

pub fn fn_to_locale_date_string(args: &[Value]) -> FormulaResult<Value> {
    Ok(format_or_invalid(args, "%-m/%-d/%Y"))
}

pub fn fn_to_locale_time_string(args: &[Value]) -> FormulaResult<Value> {
    Ok(format_or_invalid(args, "%-I:%M:%S %p"))
}

pub fn fn_to_string(args: &[Value]) -> FormulaResult<Value> {
    Ok(format_or_invalid(
        args,
        "%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)",
    ))
}

pub fn fn_value_of(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(timestamp_arg(args)))
}

fn format_or_invalid(args: &[Value], pattern: &str) -> Value {
    match datetime_arg(args) {
        Some(dt) => Value::Text(dt.format(pattern).to_string()),
        None => Value::Text(INVALID_DATE.to_string()),
    }
}

fn timestamp_arg(args: &[Value]) -> f64 {
    match arg(args, 0) {
        Value::Text(s) => parse_timestamp(s),
        other => time_clip(other.to_number()),
    }
}

fn datetime_arg(args: &[Value]) -> Option<DateTime<Utc>> {
    let ms = timestamp_arg(args);
    if ms.is_nan() {
        return None;
    }
    Utc.timestamp_millis_opt(ms as i64).single()
}

/// Parse the date formats expressions commonly produce.
///
/// Date-times without an offset are read as UTC.
fn parse_timestamp(text: &str) -> f64 {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return time_clip(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return time_clip(dt.timestamp_millis() as f64);
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
            return time_clip(Utc.from_utc_datetime(&naive).timestamp_millis() as f64);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return time_clip(Utc.from_utc_datetime(&midnight).timestamp_millis() as f64);
        }
    }

    f64::NAN
}

fn days_from_epoch(year: f64, month: u32) -> Option<f64> {
    if year.abs() > 400_000.0 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year as i32, month, 1)?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    Some(first.signed_duration_since(epoch).num_days() as f64)
}

fn time_clip(ms: f64) -> f64 {
    if !ms.is_finite() || ms.abs() > MAX_TIME_MS {
        return f64::NAN;
    }
    ms.trunc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    #[test]
    fn test_utc() {
        assert_eq!(fn_utc(&[n(1970.0), n(0.0)]).unwrap(), n(0.0));
        assert_eq!(
            fn_utc(&[n(2024.0), n(0.0), n(2.0), n(3.0), n(4.0), n(5.0), n(6.0)]).unwrap(),
            n(1_704_164_645_006.0)
        );
        // Month overflow carries into the year
        assert_eq!(
            fn_utc(&[n(2024.0), n(12.0)]).unwrap(),
            fn_utc(&[n(2025.0), n(0.0)]).unwrap()
        );
        // Two-digit years
        assert_eq!(
            fn_utc(&[n(99.0), n(0.0)]).unwrap(),
            fn_utc(&[n(1999.0), n(0.0)]).unwrap()
        );
        assert!(fn_utc(&[Value::from("x")]).unwrap().to_number().is_nan());
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            fn_parse(&[Value::from("2024-01-02T03:04:05.006Z")]).unwrap(),
            n(1_704_164_645_006.0)
        );
        assert_eq!(
            fn_parse(&[Value::from("2024-01-02")]).unwrap(),
            n(1_704_153_600_000.0)
        );
        assert_eq!(
            fn_parse(&[Value::from("2024-01-02T01:00:00+01:00")]).unwrap(),
            n(1_704_153_600_000.0)
        );
        assert!(fn_parse(&[Value::from("yesterday")])
            .unwrap()
            .to_number()
            .is_nan());
    }

    #[test]
    fn test_formatting() {
        let ms = [n(1_704_164_645_006.0)];
        assert_eq!(
            fn_to_iso_string(&ms).unwrap(),
            Value::from("2024-01-02T03:04:05.006Z")
        );
        assert_eq!(
            fn_to_locale_string(&ms).unwrap(),
            Value::from("1/2/2024, 3:04:05 AM")
        );
        assert_eq!(fn_to_locale_date_string(&ms).unwrap(), Value::from("1/2/2024"));
        assert_eq!(
            fn_to_string(&ms).unwrap(),
            Value::from("Tue Jan 02 2024 03:04:05 GMT+0000 (Coordinated Universal Time)")
        );
        assert_eq!(
            fn_to_iso_string(&[Value::from("2024-01-02")]).unwrap(),
            Value::from("2024-01-02T00:00:00.000Z")
        );
    }

    #[test]
    fn test_invalid_dates() {
        assert!(fn_to_iso_string(&[n(f64::NAN)]).is_err());
        assert_eq!(
            fn_to_locale_time_string(&[Value::from("nope")]).unwrap(),
            Value::from("Invalid Date")
        );
        assert!(fn_value_of(&[n(1e20)]).unwrap().to_number().is_nan());
    }

    #[test]
    fn test_now_is_recent() {
        let now = fn_now(&[]).unwrap().to_number();
        assert!(now > 1_700_000_000_000.0);
    }
}
