//! PostgreSQL wire values to JSON
//!
//! [`JsonCell`] accepts every column type and dispatches on the actual type
//! at decode time. Domains decode as their base type and arrays decode
//! element by element, so nested cases need no extra handling.
//!
//! Numbers stay JSON numbers only while that is lossless. Otherwise they are
//! rendered as their exact decimal text.

use std::error::Error;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use postgres_protocol::types as wire;
use rust_decimal::Decimal;
use serde_json::{json, Number, Value};
use tokio_postgres::types::{FromSql, Kind, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// A single non-null column value rendered as JSON
#[derive(Debug, Clone, PartialEq)]
pub struct JsonCell(pub Value);

impl<'a> FromSql<'a> for JsonCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode(ty, raw).map(JsonCell)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode(ty: &Type, raw: &[u8]) -> Result<Value, BoxError> {
    match ty.kind() {
        Kind::Domain(base) => return decode(base, raw),
        Kind::Array(_) => {
            let items = Vec::<Option<JsonCell>>::from_sql(ty, raw)?;
            return Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| item.map_or(Value::Null, |cell| cell.0))
                    .collect(),
            ));
        }
        Kind::Enum(_) => return Ok(Value::String(String::from_utf8_lossy(raw).into_owned())),
        _ => {}
    }

    let value = match *ty {
        Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
        Type::INT2 => Value::from(i16::from_sql(ty, raw)?),
        Type::INT4 => Value::from(i32::from_sql(ty, raw)?),
        Type::INT8 => Value::from(i64::from_sql(ty, raw)?),
        Type::OID => Value::from(u32::from_sql(ty, raw)?),
        Type::FLOAT4 => float(f64::from(f32::from_sql(ty, raw)?)),
        Type::FLOAT8 => float(f64::from_sql(ty, raw)?),
        Type::NUMERIC => numeric(numeric_text(raw)?),
        // Fixed two fractional digits, as with the default lc_monetary
        Type::MONEY => numeric(Decimal::new(wire::int8_from_sql(raw)?, 2).to_string()),
        Type::JSON | Type::JSONB => Value::from_sql(ty, raw)?,
        Type::DATE => Value::String(NaiveDate::from_sql(ty, raw)?.to_string()),
        Type::TIME => Value::String(NaiveTime::from_sql(ty, raw)?.to_string()),
        Type::TIMETZ => Value::String(time_with_zone(raw)?),
        Type::INTERVAL => Value::String(interval(raw)?),
        Type::TIMESTAMP => Value::String(
            NaiveDateTime::from_sql(ty, raw)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        Type::TIMESTAMPTZ => Value::String(
            DateTime::<Utc>::from_sql(ty, raw)?.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        Type::UUID => Value::String(uuid::Uuid::from_sql(ty, raw)?.to_string()),
        Type::INET | Type::CIDR => Value::String(network(ty, raw)?),
        Type::MACADDR => Value::String(
            wire::macaddr_from_sql(raw)?
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":"),
        ),
        Type::POINT => {
            let point = wire::point_from_sql(raw)?;
            json!({"x": float(point.x()), "y": float(point.y())})
        }
        Type::BYTEA => Value::String(base64::engine::general_purpose::STANDARD.encode(raw)),
        _ if <String as FromSql>::accepts(ty) => Value::String(String::from_sql(ty, raw)?),
        _ => opaque(raw),
    };

    Ok(value)
}

fn float(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

/// Integers within i64 and decimals that survive an f64 round trip become
/// numbers; everything else keeps its exact text
fn numeric(text: String) -> Value {
    let canonical = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };

    if let Ok(i) = canonical.parse::<i64>() {
        return Value::from(i);
    }

    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.to_string() == canonical => float(f),
        _ => Value::String(text),
    }
}

/// Decimal text of a binary NUMERIC: base-10000 digit groups, a group
/// weight, a sign word and a display scale
fn numeric_text(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid numeric: header too short".into());
    }
    let word = |i: usize| u16::from_be_bytes([raw[i], raw[i + 1]]);

    let ndigits = usize::from(word(0));
    let weight = i64::from(word(2) as i16);
    let sign = word(4);
    let dscale = usize::from(word(6));

    match sign {
        0x0000 | 0x4000 => {}
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        other => return Err(format!("invalid numeric sign: {:#06x}", other).into()),
    }

    if raw.len() != 8 + ndigits * 2 {
        return Err("invalid numeric: digit count does not match length".into());
    }
    let digits: Vec<u16> = (0..ndigits).map(|i| word(8 + i * 2)).collect();
    let group = |i: i64| -> u16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == 0x4000 {
        text.push('-');
    }

    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&group(0).to_string());
        for i in 1..=weight {
            text.push_str(&format!("{:04}", group(i)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut i = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", group(i)));
            i += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    Ok(text)
}

/// `[-]HH:MM:SS[.ffffff]`
fn clock(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let mut text = format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        abs / 3_600_000_000,
        abs / 60_000_000 % 60,
        abs / 1_000_000 % 60
    );
    let fraction = abs % 1_000_000;
    if fraction != 0 {
        text.push_str(format!(".{:06}", fraction).trim_end_matches('0'));
    }
    text
}

/// PostgreSQL's own output style: `1 year 2 mons 3 days 04:05:06`
fn interval(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() != 16 {
        return Err("invalid interval length".into());
    }
    let micros = i64::from_be_bytes(raw[0..8].try_into()?);
    let days = i32::from_be_bytes(raw[8..12].try_into()?);
    let months = i32::from_be_bytes(raw[12..16].try_into()?);

    let mut parts = Vec::new();
    for (n, one, many) in [
        (months / 12, "year", "years"),
        (months % 12, "mon", "mons"),
        (days, "day", "days"),
    ] {
        if n != 0 {
            parts.push(format!("{} {}", n, if n == 1 { one } else { many }));
        }
    }
    if micros != 0 || parts.is_empty() {
        parts.push(clock(micros));
    }

    Ok(parts.join(" "))
}

/// Time of day plus its UTC offset, e.g. `04:05:06+02:00`
fn time_with_zone(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() != 12 {
        return Err("invalid timetz length".into());
    }
    let micros = i64::from_be_bytes(raw[0..8].try_into()?);
    // The wire carries seconds west of UTC
    let east = -i64::from(i32::from_be_bytes(raw[8..12].try_into()?));

    let secs = u32::try_from(micros / 1_000_000)?;
    let nanos = u32::try_from(micros % 1_000_000 * 1_000)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).ok_or("timetz out of range")?;

    let abs = east.unsigned_abs();
    let mut text = format!(
        "{}{}{:02}:{:02}",
        time,
        if east < 0 { '-' } else { '+' },
        abs / 3600,
        abs / 60 % 60
    );
    if abs % 60 != 0 {
        text.push_str(&format!(":{:02}", abs % 60));
    }
    Ok(text)
}

/// `cidr` always carries its prefix length; `inet` only when it is not a
/// single host
fn network(ty: &Type, raw: &[u8]) -> Result<String, BoxError> {
    let inet = wire::inet_from_sql(raw)?;
    let host_bits = if inet.addr().is_ipv4() { 32 } else { 128 };

    Ok(if *ty == Type::CIDR || inet.netmask() != host_bits {
        format!("{}/{}", inet.addr(), inet.netmask())
    } else {
        inet.addr().to_string()
    })
}

/// Best effort for types without a dedicated mapping: printable UTF-8 is
/// passed through, anything else is summarized.
fn opaque(raw: &[u8]) -> Value {
    match std::str::from_utf8(raw) {
        Ok(text) if !text.chars().any(|c| c.is_control() && !c.is_whitespace()) => {
            Value::String(text.to_string())
        }
        _ => Value::String(format!("<binary {} bytes>", raw.len())),
    }
}
