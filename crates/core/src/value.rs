//! Attribute value types
//!
//! This module defines:
//! - FieldKind: the column kind codes stored in the schema and in every record cell
//! - DateValue: the seven-integer date/time payload
//! - AttributeValue: the tagged union for one attribute cell
//!
//! ## Kind Codes
//!
//! Kind codes are non-contiguous and are written to disk as a single byte:
//! Integer=0, Real=2, String=4, Binary=8, Date=9. Any other code is carried
//! through as [`FieldKind::Unsupported`] so a schema round-trips bit-exactly,
//! but cells of such columns carry no payload.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Column kind of an attribute field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// 32-bit signed integer
    Integer,
    /// 64-bit floating point
    Real,
    /// Text
    String,
    /// Opaque byte blob
    Binary,
    /// Date and time of day
    Date,
    /// Any other kind code; cells of this kind are skipped by the record codec
    Unsupported(u8),
}

impl FieldKind {
    /// Wire code for Integer
    pub const INTEGER_CODE: u8 = 0;
    /// Wire code for Real
    pub const REAL_CODE: u8 = 2;
    /// Wire code for String
    pub const STRING_CODE: u8 = 4;
    /// Wire code for Binary
    pub const BINARY_CODE: u8 = 8;
    /// Wire code for Date
    pub const DATE_CODE: u8 = 9;

    /// Map a wire code to a kind. Never fails: unknown codes become `Unsupported`.
    pub fn from_code(code: u8) -> Self {
        match code {
            Self::INTEGER_CODE => FieldKind::Integer,
            Self::REAL_CODE => FieldKind::Real,
            Self::STRING_CODE => FieldKind::String,
            Self::BINARY_CODE => FieldKind::Binary,
            Self::DATE_CODE => FieldKind::Date,
            other => FieldKind::Unsupported(other),
        }
    }

    /// Wire code of this kind
    pub fn code(&self) -> u8 {
        match self {
            FieldKind::Integer => Self::INTEGER_CODE,
            FieldKind::Real => Self::REAL_CODE,
            FieldKind::String => Self::STRING_CODE,
            FieldKind::Binary => Self::BINARY_CODE,
            FieldKind::Date => Self::DATE_CODE,
            FieldKind::Unsupported(code) => *code,
        }
    }

    /// Whether cells of this kind carry a payload in the record block
    pub fn is_supported(&self) -> bool {
        !matches!(self, FieldKind::Unsupported(_))
    }

    /// Get the kind name as a string
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Integer => "Integer",
            FieldKind::Real => "Real",
            FieldKind::String => "String",
            FieldKind::Binary => "Binary",
            FieldKind::Date => "Date",
            FieldKind::Unsupported(_) => "Unsupported",
        }
    }
}

/// Date/time cell payload
///
/// Stored as seven consecutive i32 values. Components are kept verbatim, so
/// partially-filled dates (e.g. time left at zero) round-trip unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateValue {
    /// Calendar year
    pub year: i32,
    /// Month, 1-12
    pub month: i32,
    /// Day of month, 1-31
    pub day: i32,
    /// Hour, 0-23
    pub hour: i32,
    /// Minute, 0-59
    pub minute: i32,
    /// Second, 0-59
    pub second: i32,
    /// Time zone flag (0 unknown, 1 local time, 100 GMT, offsets in 15 minute steps from 100)
    pub tz_flag: i32,
}

impl DateValue {
    /// Time zone flag for an unknown zone
    pub const TZ_UNKNOWN: i32 = 0;
    /// Time zone flag for local time
    pub const TZ_LOCAL: i32 = 1;
    /// Time zone flag for GMT
    pub const TZ_GMT: i32 = 100;

    /// Components in wire order
    pub fn to_array(&self) -> [i32; 7] {
        [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.tz_flag,
        ]
    }

    /// Build from components in wire order
    pub fn from_array(parts: [i32; 7]) -> Self {
        let [year, month, day, hour, minute, second, tz_flag] = parts;
        DateValue {
            year,
            month,
            day,
            hour,
            minute,
            second,
            tz_flag,
        }
    }

    /// Convert to a chrono datetime, if the components form a valid date and time
    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        let month = u32::try_from(self.month).ok()?;
        let day = u32::try_from(self.day).ok()?;
        let hour = u32::try_from(self.hour).ok()?;
        let minute = u32::try_from(self.minute).ok()?;
        let second = u32::try_from(self.second).ok()?;
        NaiveDate::from_ymd_opt(self.year, month, day)?.and_hms_opt(hour, minute, second)
    }

    /// Build from a chrono datetime with the given time zone flag
    pub fn from_naive_datetime(dt: NaiveDateTime, tz_flag: i32) -> Self {
        DateValue {
            year: dt.year(),
            month: dt.month() as i32,
            day: dt.day() as i32,
            hour: dt.hour() as i32,
            minute: dt.minute() as i32,
            second: dt.second() as i32,
            tz_flag,
        }
    }
}

/// One attribute cell
///
/// The active variant must match the `FieldKind` of the cell's column.
///
/// ## Equality
///
/// `Real` compares by bit pattern, so a decoded value equals its source even
/// for NaN payloads; `-0.0 != 0.0` under this rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttributeValue {
    /// 32-bit signed integer
    Integer(i32),
    /// 64-bit floating point
    Real(f64),
    /// Text
    String(String),
    /// Opaque bytes with explicit length
    Binary(Vec<u8>),
    /// Date/time
    Date(DateValue),
    /// Placeholder for a column whose kind code is not supported
    Unsupported(u8),
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => a == b,
            (AttributeValue::Real(a), AttributeValue::Real(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::String(a), AttributeValue::String(b)) => a == b,
            (AttributeValue::Binary(a), AttributeValue::Binary(b)) => a == b,
            (AttributeValue::Date(a), AttributeValue::Date(b)) => a == b,
            (AttributeValue::Unsupported(a), AttributeValue::Unsupported(b)) => a == b,
            _ => false,
        }
    }
}

impl AttributeValue {
    /// Kind of the active variant
    pub fn kind(&self) -> FieldKind {
        match self {
            AttributeValue::Integer(_) => FieldKind::Integer,
            AttributeValue::Real(_) => FieldKind::Real,
            AttributeValue::String(_) => FieldKind::String,
            AttributeValue::Binary(_) => FieldKind::Binary,
            AttributeValue::Date(_) => FieldKind::Date,
            AttributeValue::Unsupported(code) => FieldKind::Unsupported(*code),
        }
    }

    /// Placeholder value for a column of `kind` (zero, empty, or unsupported)
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Integer => AttributeValue::Integer(0),
            FieldKind::Real => AttributeValue::Real(0.0),
            FieldKind::String => AttributeValue::String(String::new()),
            FieldKind::Binary => AttributeValue::Binary(Vec::new()),
            FieldKind::Date => AttributeValue::Date(DateValue::default()),
            FieldKind::Unsupported(code) => AttributeValue::Unsupported(code),
        }
    }

    /// Get as i32 if this is an integer
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as f64 if this is a real
    pub fn as_real(&self) -> Option<f64> {
        match self {
            AttributeValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as &str if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &[u8] if this is a binary blob
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Get the date payload if this is a date
    pub fn as_date(&self) -> Option<&DateValue> {
        match self {
            AttributeValue::Date(d) => Some(d),
            _ => None,
        }
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Real(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(v: Vec<u8>) -> Self {
        AttributeValue::Binary(v)
    }
}

impl From<DateValue> for AttributeValue {
    fn from(v: DateValue) -> Self {
        AttributeValue::Date(v)
    }
}
