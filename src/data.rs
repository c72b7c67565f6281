use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// Vendor-neutral classification of a SQL column.
///
/// The type selects the text-to-value conversion applied to a declared
/// fixture value and, for [`ColumnType::Default`], the plain-text bind path
/// that defers interpretation to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Binary,
    Varbinary,
    Longvarbinary,
    Blob,
    Boolean,
    Bit,
    Date,
    Time,
    Timestamp,
    TimestampWithTimezone,
    Tinyint,
    Smallint,
    Integer,
    Bigint,
    Real,
    Float,
    Double,
    Decimal,
    Char,
    Varchar,
    Longvarchar,
    Clob,
    /// No conversion; the raw text is bound as-is.
    Default,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Binary => "binary",
            ColumnType::Varbinary => "varbinary",
            ColumnType::Longvarbinary => "longvarbinary",
            ColumnType::Blob => "blob",
            ColumnType::Boolean => "boolean",
            ColumnType::Bit => "bit",
            ColumnType::Date => "date",
            ColumnType::Time => "time",
            ColumnType::Timestamp => "timestamp",
            ColumnType::TimestampWithTimezone => "timestamp with timezone",
            ColumnType::Tinyint => "tinyint",
            ColumnType::Smallint => "smallint",
            ColumnType::Integer => "integer",
            ColumnType::Bigint => "bigint",
            ColumnType::Real => "real",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Decimal => "decimal",
            ColumnType::Char => "char",
            ColumnType::Varchar => "varchar",
            ColumnType::Longvarchar => "longvarchar",
            ColumnType::Clob => "clob",
            ColumnType::Default => "default",
        }
    }

    /// Parses `text` into the typed value this column expects.
    ///
    /// `Varbinary`/`Longvarbinary` take the raw UTF-8 bytes of the text;
    /// `Binary` and `Blob` expect Base64. `Default` passes the text through
    /// unconverted.
    pub fn convert(&self, text: &str) -> Result<Value> {
        let value = match self {
            ColumnType::Varbinary | ColumnType::Longvarbinary => {
                Value::Bytes(text.as_bytes().to_vec())
            }
            ColumnType::Binary => Value::Bytes(decode_base64(text)?),
            ColumnType::Blob => Value::Blob(decode_base64(text)?),
            ColumnType::Boolean | ColumnType::Bit => Value::Bool(parse_bool(text)?),
            ColumnType::Date => Value::Date(
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .with_context(|| format!("Failed to parse '{text}' as date"))?,
            ),
            ColumnType::Time => Value::Time(parse_time_of_day(text)?),
            ColumnType::Timestamp => Value::Timestamp(
                NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                    .with_context(|| format!("Failed to parse '{text}' as timestamp"))?,
            ),
            ColumnType::TimestampWithTimezone => Value::TimestampTz(
                DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%#z").with_context(|| {
                    format!("Failed to parse '{text}' as timestamp with timezone")
                })?,
            ),
            ColumnType::Tinyint => Value::SmallInt(
                text.parse()
                    .with_context(|| format!("Failed to parse '{text}' as tinyint"))?,
            ),
            ColumnType::Smallint | ColumnType::Integer => Value::Int(
                text.parse()
                    .with_context(|| format!("Failed to parse '{text}' as integer"))?,
            ),
            ColumnType::Bigint => Value::BigInt(
                text.parse()
                    .with_context(|| format!("Failed to parse '{text}' as bigint"))?,
            ),
            ColumnType::Real => Value::Real(
                text.parse()
                    .with_context(|| format!("Failed to parse '{text}' as real"))?,
            ),
            ColumnType::Float | ColumnType::Double => Value::Double(
                text.parse()
                    .with_context(|| format!("Failed to parse '{text}' as double"))?,
            ),
            ColumnType::Decimal => Value::Decimal(
                Decimal::from_str_exact(text)
                    .with_context(|| format!("Failed to parse '{text}' as decimal"))?,
            ),
            ColumnType::Char | ColumnType::Varchar | ColumnType::Longvarchar => {
                Value::Text(text.to_string())
            }
            ColumnType::Clob => Value::Clob(text.to_string()),
            ColumnType::Default => Value::Text(text.to_string()),
        };
        Ok(value)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed parameter value ready for driver binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    Blob(Vec<u8>),
    Clob(String),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Decimal(Decimal),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical textual rendering, the inverse of [`ColumnType::convert`]
    /// for every convertible type. Byte values render as Base64.
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Text(s) | Value::Clob(s) => s.clone(),
            Value::Bytes(b) | Value::Blob(b) => BASE64.encode(b),
            Value::Bool(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::TimestampTz(ts) => ts.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
            Value::SmallInt(i) => i.to_string(),
            Value::Int(i) => i.to_string(),
            Value::BigInt(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Double(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

fn decode_base64(value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .with_context(|| format!("Failed to decode '{value}' as Base64"))
}

fn parse_bool(value: &str) -> Result<bool> {
    let lowered = value.to_ascii_lowercase();
    let parsed = match lowered.as_str() {
        "true" => true,
        "false" => false,
        _ => bail!("Failed to parse '{value}' as boolean"),
    };
    Ok(parsed)
}

pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];
    for fmt in TIME_FORMATS {
        if let Ok(parsed) = NaiveTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as time"))
}
