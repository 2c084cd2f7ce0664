use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{CmteError, Result};

/// Dynamically typed field value moved between wire messages, namespaces
/// and template operators. Closed set: every traversal pattern-matches,
/// unknown shapes are rejected at construction instead of at read time.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    /// Signed duration in nanoseconds
    Usage(i64),
    Time(DateTime<Utc>),
    Bytes(Vec<u8>),
    /// Ordered sequence of values (repeated attributes, multi-item leaves)
    Seq(Vec<FieldValue>),
}

impl FieldValue {
    /// Duration value from whole seconds
    pub fn usage_secs(secs: i64) -> Self {
        Self::Usage(secs * NANOS_PER_SEC)
    }

    /// True when the rendered value would be the empty string
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
            Self::Seq(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Coerce to a signed integer, parsing string forms on demand
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Coerce to a duration in nanoseconds; bare numbers read as nanoseconds
    pub fn as_duration(&self) -> Option<i64> {
        match self {
            Self::Usage(ns) => Some(*ns),
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Float(v) => Some(*v as i64),
            Self::Str(s) => parse_duration(s).ok(),
            _ => None,
        }
    }

    /// Coerce to a timestamp, detecting the layout of string forms
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            Self::Str(s) => parse_time(s).ok(),
            Self::Int(v) => Utc.timestamp_opt(*v, 0).single(),
            Self::UInt(v) => Utc.timestamp_opt(*v as i64, 0).single(),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Usage(ns) => write!(f, "{}", format_duration(*ns)),
            Self::Time(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Self::Seq(vals) => {
                let rendered: Vec<String> = vals.iter().map(ToString::to_string).collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Time(t)
    }
}

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Parse a duration string; bare numbers are nanoseconds
pub fn parse_duration(s: &str) -> Result<i64> {
    parse_duration_with_default(s, 1)
}

/// Parse a duration string; bare numbers are seconds
pub fn parse_duration_secs(s: &str) -> Result<i64> {
    parse_duration_with_default(s, NANOS_PER_SEC)
}

fn parse_duration_with_default(s: &str, default_unit_ns: i64) -> Result<i64> {
    let t = s.trim();
    if t.is_empty() {
        return Err(CmteError::InvalidDuration(s.to_string()));
    }
    if let Ok(v) = t.parse::<f64>() {
        return Ok((v * default_unit_ns as f64) as i64);
    }
    parse_unit_duration(t).ok_or_else(|| CmteError::InvalidDuration(s.to_string()))
}

// Unit-suffixed compound form: [+-]?(<number><unit>)+ with units
// ns, us, µs, ms, s, m, h (e.g. "1h2m3s", "-90s", "1.5s", "300ms").
fn parse_unit_duration(s: &str) -> Option<i64> {
    let (neg, mut rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if rest == "0" {
        return Some(0);
    }
    let mut total = 0f64;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if num_end == 0 {
            return None;
        }
        let num: f64 = rest[..num_end].parse().ok()?;
        rest = &rest[num_end..];
        let (unit_ns, unit_len) = match_unit(rest)?;
        rest = &rest[unit_len..];
        total += num * unit_ns as f64;
    }
    let total = total as i64;
    Some(if neg { -total } else { total })
}

fn match_unit(s: &str) -> Option<(i64, usize)> {
    for (unit, ns) in [
        ("ns", 1),
        ("us", 1_000),
        ("\u{00b5}s", 1_000), // µs
        ("ms", 1_000_000),
        ("s", NANOS_PER_SEC),
        ("m", 60 * NANOS_PER_SEC),
        ("h", 3600 * NANOS_PER_SEC),
    ] {
        if s.starts_with(unit) {
            return Some((ns, unit.len()));
        }
    }
    None
}

/// Format nanoseconds as a compound duration string: `90s` renders as
/// `1m30s`, `20s` stays `20s`, zero is `0s`, sub-second values pick the
/// largest fitting unit.
pub fn format_duration(ns: i64) -> String {
    if ns == 0 {
        return "0s".to_string();
    }
    let u = ns.unsigned_abs();
    let body = if u < NANOS_PER_SEC as u64 {
        if u < 1_000 {
            format!("{u}ns")
        } else if u < 1_000_000 {
            format!("{}\u{00b5}s", with_frac(u, 1_000))
        } else {
            format!("{}ms", with_frac(u, 1_000_000))
        }
    } else {
        let frac = u % NANOS_PER_SEC as u64;
        let mut secs = u / NANOS_PER_SEC as u64;
        let s = secs % 60;
        secs /= 60;
        let m = secs % 60;
        let h = secs / 60;
        let s_str = with_frac(s * NANOS_PER_SEC as u64 + frac, NANOS_PER_SEC as u64);
        if h > 0 {
            format!("{h}h{m}m{s_str}s")
        } else if m > 0 {
            format!("{m}m{s_str}s")
        } else {
            format!("{s_str}s")
        }
    };
    if ns < 0 {
        format!("-{body}")
    } else {
        body
    }
}

/// Whole seconds of a duration, fractional part rendered only when present
pub fn duration_seconds(ns: i64) -> String {
    if ns % NANOS_PER_SEC == 0 {
        (ns / NANOS_PER_SEC).to_string()
    } else {
        format!("{}", ns as f64 / NANOS_PER_SEC as f64)
    }
}

fn with_frac(value: u64, div: u64) -> String {
    let whole = value / div;
    let frac = value % div;
    if frac == 0 {
        return whole.to_string();
    }
    let width = div.ilog10() as usize;
    let mut digits = format!("{frac:0width$}");
    while digits.ends_with('0') {
        digits.pop();
    }
    format!("{whole}.{digits}")
}

/// Parse a timestamp, auto-detecting the layout: unix seconds, unix
/// milli/micro/nanoseconds (13/16/19 digits), RFC 3339, `T`-separated and
/// SQL-style date-times. Anything else is an unsupported time format.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    let t = s.trim();
    if t.is_empty() {
        return Err(CmteError::UnsupportedTimeFormat);
    }
    if t.chars().all(|c| c.is_ascii_digit()) {
        let v: i64 = t.parse().map_err(|_| CmteError::UnsupportedTimeFormat)?;
        let parsed = match t.len() {
            13 => Utc.timestamp_millis_opt(v).single(),
            16 => Utc
                .timestamp_opt(v / 1_000_000, ((v % 1_000_000) * 1_000) as u32)
                .single(),
            19 => Utc
                .timestamp_opt(v / NANOS_PER_SEC, (v % NANOS_PER_SEC) as u32)
                .single(),
            _ => Utc.timestamp_opt(v, 0).single(),
        };
        return parsed.ok_or(CmteError::UnsupportedTimeFormat);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(t) {
        return Ok(t.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, layout) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(CmteError::UnsupportedTimeFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(10 * NANOS_PER_SEC), "10s");
        assert_eq!(format_duration(90 * NANOS_PER_SEC), "1m30s");
        assert_eq!(format_duration(180 * NANOS_PER_SEC), "3m0s");
        assert_eq!(format_duration(3600 * NANOS_PER_SEC), "1h0m0s");
        assert_eq!(format_duration(-10 * NANOS_PER_SEC), "-10s");
        assert_eq!(format_duration(1_500), "1.5\u{00b5}s");
        assert_eq!(format_duration(250_000_000), "250ms");
        assert_eq!(format_duration(90 * NANOS_PER_SEC + 500_000_000), "1m30.5s");
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("10s").unwrap(), 10 * NANOS_PER_SEC);
        assert_eq!(parse_duration("5m").unwrap(), 300 * NANOS_PER_SEC);
        assert_eq!(parse_duration("1h2m3s").unwrap(), 3723 * NANOS_PER_SEC);
        assert_eq!(parse_duration("300ms").unwrap(), 300_000_000);
        assert_eq!(parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert_eq!(parse_duration("-90s").unwrap(), -90 * NANOS_PER_SEC);
        assert_eq!(parse_duration("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_duration_bare_numbers() {
        // bare numbers are nanoseconds by default, seconds in the secs variant
        assert_eq!(parse_duration("1250").unwrap(), 1250);
        assert_eq!(parse_duration_secs("120").unwrap(), 120 * NANOS_PER_SEC);
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ocs-gw;1449573472;00002").is_err());
    }

    #[test]
    fn test_parse_time_unix() {
        let t = parse_time("1560325161").unwrap();
        assert_eq!(t.timestamp(), 1560325161);
    }

    #[test]
    fn test_parse_time_layouts() {
        let t = parse_time("2005-08-26T14:16:56").unwrap();
        assert_eq!(t.timestamp(), 1125065816);
        let t2 = parse_time("2005-08-26 14:16:56").unwrap();
        assert_eq!(t, t2);
        let t3 = parse_time("2005-08-26T14:16:56Z").unwrap();
        assert_eq!(t, t3);
    }

    #[test]
    fn test_parse_time_unsupported() {
        assert_eq!(
            parse_time("ocs-gw;1449573472;00002"),
            Err(CmteError::UnsupportedTimeFormat)
        );
        assert_eq!(parse_time(""), Err(CmteError::UnsupportedTimeFormat));
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldValue::Str("1001".into()).to_string(), "1001");
        assert_eq!(FieldValue::Int(-3).to_string(), "-3");
        assert_eq!(FieldValue::usage_secs(120).to_string(), "2m0s");
        assert_eq!(
            FieldValue::Time(Utc.with_ymd_and_hms(2013, 12, 30, 15, 0, 1).unwrap()).to_string(),
            "2013-12-30T15:00:01Z"
        );
        assert_eq!(
            FieldValue::Seq(vec![FieldValue::Int(1), FieldValue::Str("a".into())]).to_string(),
            "1,a"
        );
    }

    #[test]
    fn test_coercions() {
        assert_eq!(FieldValue::Str(" 42 ".into()).as_int(), Some(42));
        assert_eq!(FieldValue::Str("x".into()).as_int(), None);
        assert_eq!(
            FieldValue::Str("10s".into()).as_duration(),
            Some(10 * NANOS_PER_SEC)
        );
        assert_eq!(FieldValue::usage_secs(3).as_duration(), Some(3 * NANOS_PER_SEC));
        let t = FieldValue::Str("1560325161".into()).as_time().unwrap();
        assert_eq!(t.timestamp(), 1560325161);
    }

    #[test]
    fn test_duration_seconds_rendering() {
        assert_eq!(duration_seconds(180 * NANOS_PER_SEC), "180");
        assert_eq!(duration_seconds(90 * NANOS_PER_SEC + 500_000_000), "90.5");
    }

    #[test]
    fn test_is_empty() {
        assert!(FieldValue::Str(String::new()).is_empty());
        assert!(!FieldValue::Int(0).is_empty());
        assert!(FieldValue::Seq(vec![]).is_empty());
    }
}
