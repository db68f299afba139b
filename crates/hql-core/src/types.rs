//! Hive primitive types and runtime values.
//!
//! `TypeInfo` carries Hive type names (`bigint`, `decimal(7,3)`, ...) and
//! `Value` is the boxed runtime representation used by UDFs, the aggregation
//! runtime and the fetch formatters. `HiveDecimal` is an exact decimal backed
//! by an `i128` unscaled value, which covers Hive's 38-digit precision.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Hive primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    Void,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Varchar(u32),
    Char(u32),
    Decimal { precision: u8, scale: u8 },
    Date,
    Timestamp,
    Binary,
}

impl TypeInfo {
    /// Any numeric type, including decimal.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeInfo::Byte
                | TypeInfo::Short
                | TypeInfo::Int
                | TypeInfo::Long
                | TypeInfo::Float
                | TypeInfo::Double
                | TypeInfo::Decimal { .. }
        )
    }

    /// tinyint, smallint, int or bigint.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            TypeInfo::Byte | TypeInfo::Short | TypeInfo::Int | TypeInfo::Long
        )
    }

    /// string, varchar or char.
    pub fn is_string_family(&self) -> bool {
        matches!(
            self,
            TypeInfo::String | TypeInfo::Varchar(_) | TypeInfo::Char(_)
        )
    }

    /// `decimal(p,s)` with both bounds clamped to the Hive maximum.
    pub fn decimal(precision: u32, scale: u32) -> Self {
        let scale = scale.min(HiveDecimal::MAX_SCALE);
        let precision = precision.clamp(1, HiveDecimal::MAX_PRECISION).max(scale);
        TypeInfo::Decimal {
            precision: precision as u8,
            scale: scale as u8,
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeInfo::Void => write!(f, "void"),
            TypeInfo::Boolean => write!(f, "boolean"),
            TypeInfo::Byte => write!(f, "tinyint"),
            TypeInfo::Short => write!(f, "smallint"),
            TypeInfo::Int => write!(f, "int"),
            TypeInfo::Long => write!(f, "bigint"),
            TypeInfo::Float => write!(f, "float"),
            TypeInfo::Double => write!(f, "double"),
            TypeInfo::String => write!(f, "string"),
            TypeInfo::Varchar(len) => write!(f, "varchar({})", len),
            TypeInfo::Char(len) => write!(f, "char({})", len),
            TypeInfo::Decimal { precision, scale } => {
                write!(f, "decimal({},{})", precision, scale)
            }
            TypeInfo::Date => write!(f, "date"),
            TypeInfo::Timestamp => write!(f, "timestamp"),
            TypeInfo::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for TypeInfo {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(' ', "");
        let invalid = || crate::Error::Serialization(format!("Unsupported type name: {}", s));

        let (base, params) = match normalized.find('(') {
            Some(open) => {
                let close = normalized.strip_suffix(')').ok_or_else(invalid)?;
                (&normalized[..open], Some(&close[open + 1..]))
            }
            None => (normalized.as_str(), None),
        };

        let single = |params: Option<&str>| -> Result<u32, crate::Error> {
            params
                .ok_or_else(invalid)?
                .parse::<u32>()
                .map_err(|_| invalid())
        };

        let type_info = match base {
            "void" => TypeInfo::Void,
            "boolean" => TypeInfo::Boolean,
            "tinyint" => TypeInfo::Byte,
            "smallint" => TypeInfo::Short,
            "int" | "integer" => TypeInfo::Int,
            "bigint" => TypeInfo::Long,
            "float" => TypeInfo::Float,
            "double" => TypeInfo::Double,
            "string" => TypeInfo::String,
            "varchar" => TypeInfo::Varchar(single(params)?),
            "char" => TypeInfo::Char(single(params)?),
            "date" => TypeInfo::Date,
            "timestamp" => TypeInfo::Timestamp,
            "binary" => TypeInfo::Binary,
            "decimal" => match params {
                None => TypeInfo::decimal(10, 0),
                Some(p) => {
                    let mut parts = p.split(',');
                    let precision = parts
                        .next()
                        .and_then(|v| v.parse::<u32>().ok())
                        .ok_or_else(invalid)?;
                    let scale = match parts.next() {
                        Some(v) => v.parse::<u32>().map_err(|_| invalid())?,
                        None => 0,
                    };
                    if parts.next().is_some()
                        || precision == 0
                        || precision > HiveDecimal::MAX_PRECISION
                        || scale > precision
                    {
                        return Err(invalid());
                    }
                    TypeInfo::decimal(precision, scale)
                }
            },
            _ => return Err(invalid()),
        };
        Ok(type_info)
    }
}

impl Serialize for TypeInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TypeInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Exact decimal with up to 38 digits of precision.
///
/// Values are always normalized: trailing fractional zeros are stripped, so
/// equal numbers have equal representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HiveDecimal {
    unscaled: i128,
    scale: u8,
}

const POW10: [i128; 39] = {
    let mut table = [1i128; 39];
    let mut i = 1;
    while i < 39 {
        table[i] = table[i - 1] * 10;
        i += 1;
    }
    table
};

fn digit_count(v: i128) -> u32 {
    let v = v.unsigned_abs();
    if v == 0 {
        return 1;
    }
    let mut digits = 0;
    let mut rest = v;
    while rest > 0 {
        rest /= 10;
        digits += 1;
    }
    digits
}

/// Divide and round half away from zero.
fn div_half_up(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    let remainder = (value % divisor).abs();
    if remainder >= divisor - remainder {
        quotient + value.signum()
    } else {
        quotient
    }
}

impl HiveDecimal {
    pub const MAX_PRECISION: u32 = 38;
    pub const MAX_SCALE: u32 = 38;

    pub const ZERO: HiveDecimal = HiveDecimal {
        unscaled: 0,
        scale: 0,
    };

    /// Build from an unscaled value and a scale.
    ///
    /// Returns `None` when the integer part needs more than 38 digits. Excess
    /// fractional digits are rounded away HALF_UP.
    pub fn create(unscaled: i128, scale: u32) -> Option<Self> {
        let mut unscaled = unscaled;
        let mut scale = scale;
        if scale > Self::MAX_SCALE {
            let drop = scale - Self::MAX_SCALE;
            unscaled = if drop as usize >= POW10.len() {
                0
            } else {
                div_half_up(unscaled, POW10[drop as usize])
            };
            scale = Self::MAX_SCALE;
        }

        let digits = digit_count(unscaled);
        let int_digits = digits.saturating_sub(scale);
        if int_digits > Self::MAX_PRECISION {
            return None;
        }
        if digits.max(scale) > Self::MAX_PRECISION {
            let keep = Self::MAX_PRECISION - int_digits;
            unscaled = div_half_up(unscaled, POW10[(scale - keep) as usize]);
            scale = keep;
            if digit_count(unscaled).saturating_sub(scale) > Self::MAX_PRECISION {
                return None;
            }
        }

        Some(Self::normalize(unscaled, scale as u8))
    }

    fn normalize(mut unscaled: i128, mut scale: u8) -> Self {
        if unscaled == 0 {
            return Self::ZERO;
        }
        while scale > 0 && unscaled % 10 == 0 {
            unscaled /= 10;
            scale -= 1;
        }
        Self { unscaled, scale }
    }

    pub fn from_i64(v: i64) -> Self {
        Self::normalize(v as i128, 0)
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn scale(&self) -> u32 {
        self.scale as u32
    }

    /// Digits in the value, never less than the scale (`0.05` has precision 2).
    pub fn precision(&self) -> u32 {
        digit_count(self.unscaled).max(self.scale as u32)
    }

    pub fn signum(&self) -> i32 {
        self.unscaled.signum() as i32
    }

    pub fn to_f64(&self) -> f64 {
        // Parsing the decimal string gives the correctly rounded double.
        self.to_string().parse().unwrap_or(f64::NAN)
    }

    /// Round HALF_UP to `new_scale` digits after the point.
    ///
    /// Negative scales round integer digits (`1234.5` at -2 is `1200`).
    /// Returns `None` if the result no longer fits in 38 digits.
    pub fn set_scale_half_up(&self, new_scale: i32) -> Option<Self> {
        let scale = self.scale as i32;
        if new_scale >= scale {
            return Some(*self);
        }
        // i64: `scale - i32::MIN` does not fit in i32
        let drop = i64::from(scale) - i64::from(new_scale);
        let rounded = match usize::try_from(drop) {
            Ok(drop) if drop < POW10.len() => div_half_up(self.unscaled, POW10[drop]),
            _ => 0,
        };
        if new_scale >= 0 {
            Self::create(rounded, new_scale as u32)
        } else {
            if rounded == 0 {
                return Some(Self::ZERO);
            }
            let shift = usize::try_from(-i64::from(new_scale)).ok()?;
            if shift >= POW10.len() {
                return None;
            }
            rounded
                .checked_mul(POW10[shift])
                .and_then(|v| Self::create(v, 0))
        }
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        let scale = self.scale.max(other.scale);
        let a = self.rescaled(scale)?;
        let b = other.rescaled(scale)?;
        Self::create(a.checked_add(b)?, scale as u32)
    }

    /// Divide by an integer count, keeping at least `scale` fractional digits.
    pub fn checked_div_count(&self, count: i64, scale: u32) -> Option<Self> {
        if count == 0 {
            return None;
        }
        let scale = scale.clamp(self.scale as u32, Self::MAX_SCALE);
        let shift = (scale - self.scale as u32) as usize;
        let target = self.unscaled.checked_mul(*POW10.get(shift)?)?;
        Self::create(div_half_up(target, count as i128), scale)
    }

    fn rescaled(&self, scale: u8) -> Option<i128> {
        let shift = (scale - self.scale) as usize;
        self.unscaled.checked_mul(*POW10.get(shift)?)
    }
}

impl Ord for HiveDecimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        match (self.rescaled(scale), other.rescaled(scale)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

impl PartialOrd for HiveDecimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HiveDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.unsigned_abs().to_string();
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        } else {
            write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
        }
    }
}

impl FromStr for HiveDecimal {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::Serialization(format!("Invalid decimal: {}", s));
        let trimmed = s.trim();
        let (mantissa, exponent) = match trimmed.find(|c| c == 'e' || c == 'E') {
            Some(pos) => (
                &trimmed[..pos],
                trimmed[pos + 1..].parse::<i32>().map_err(|_| invalid())?,
            ),
            None => (trimmed, 0),
        };
        let (negative, body) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let all_digits = format!("{}{}", int_part, frac_part);
        let significant = all_digits.trim_start_matches('0');
        let mut scale = frac_part.len() as i32 - exponent;
        let mut digits = significant.to_string();
        if digits.is_empty() {
            return Ok(Self::ZERO);
        }
        if scale < 0 {
            digits.push_str(&"0".repeat((-scale) as usize));
            scale = 0;
        }
        // Drop digits beyond what an i128 can carry; `create` rounds the rest.
        let max_digits = Self::MAX_PRECISION as usize;
        let mut unscaled_str = digits.as_str();
        let mut extra = 0;
        if unscaled_str.len() > max_digits {
            extra = unscaled_str.len() - max_digits;
            unscaled_str = &unscaled_str[..max_digits];
        }
        if extra as i32 > scale {
            return Err(invalid());
        }
        let mut unscaled: i128 = unscaled_str.parse().map_err(|_| invalid())?;
        if extra > 0 && digits.as_bytes()[max_digits] >= b'5' {
            unscaled += 1;
        }
        if negative {
            unscaled = -unscaled;
        }
        Self::create(unscaled, (scale - extra as i32) as u32).ok_or_else(invalid)
    }
}

impl Serialize for HiveDecimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HiveDecimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Runtime value of a Hive primitive column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Decimal(HiveDecimal),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type of a value; NULL is `void` and decimals report their own precision.
    pub fn type_info(&self) -> TypeInfo {
        match self {
            Value::Null => TypeInfo::Void,
            Value::Boolean(_) => TypeInfo::Boolean,
            Value::Byte(_) => TypeInfo::Byte,
            Value::Short(_) => TypeInfo::Short,
            Value::Int(_) => TypeInfo::Int,
            Value::Long(_) => TypeInfo::Long,
            Value::Float(_) => TypeInfo::Float,
            Value::Double(_) => TypeInfo::Double,
            Value::String(_) => TypeInfo::String,
            Value::Decimal(d) => TypeInfo::decimal(d.precision(), d.scale()),
            Value::Date(_) => TypeInfo::Date,
            Value::Timestamp(_) => TypeInfo::Timestamp,
            Value::Binary(_) => TypeInfo::Binary,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(*v as i64),
            Value::Short(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Decimal(d) => Some(d.to_f64()),
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Ordering between two non-null values of comparable types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Binary(a), Value::Binary(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => match (a, b) {
                    (Value::String(_), _) | (_, Value::String(_)) => None,
                    _ => Some(a.as_f64()?.total_cmp(&b.as_f64()?)),
                },
            },
        }
    }

    fn float_bits(v: f64) -> u64 {
        if v == 0.0 {
            0.0f64.to_bits()
        } else if v.is_nan() {
            f64::NAN.to_bits()
        } else {
            v.to_bits()
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                Value::float_bits(*a as f64) == Value::float_bits(*b as f64)
            }
            (Value::Double(a), Value::Double(b)) => Value::float_bits(*a) == Value::float_bits(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Byte(v) => v.hash(state),
            Value::Short(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Float(v) => Value::float_bits(*v as f64).hash(state),
            Value::Double(v) => Value::float_bits(*v).hash(state),
            Value::String(v) => v.hash(state),
            Value::Decimal(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Binary(v) => v.hash(state),
        }
    }
}

/// Render a double the way `Double.toString` does (`1.0`, `1.0E10`).
pub fn format_double(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let abs = v.abs();
    if abs == 0.0 || (1e-3..1e7).contains(&abs) {
        let s = v.to_string();
        if s.contains('.') {
            s
        } else {
            format!("{}.0", s)
        }
    } else {
        let s = format!("{:e}", v);
        let (mantissa, exponent) = s.split_once('e').unwrap_or((s.as_str(), "0"));
        if mantissa.contains('.') {
            format!("{}E{}", mantissa, exponent)
        } else {
            format!("{}.0E{}", mantissa, exponent)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_double(*v as f64)),
            Value::Double(v) => write!(f, "{}", format_double(*v)),
            Value::String(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => {
                write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S"))?;
                let nanos = v.nanosecond();
                if nanos > 0 {
                    let frac = format!("{:09}", nanos);
                    write!(f, ".{}", frac.trim_end_matches('0'))?;
                }
                Ok(())
            }
            Value::Binary(v) => write!(f, "{}", String::from_utf8_lossy(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> HiveDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_type_info_display_and_parse() {
        for name in [
            "void",
            "boolean",
            "tinyint",
            "smallint",
            "int",
            "bigint",
            "float",
            "double",
            "string",
            "varchar(10)",
            "char(3)",
            "decimal(7,3)",
            "date",
            "timestamp",
            "binary",
        ] {
            let parsed: TypeInfo = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert_eq!("DECIMAL".parse::<TypeInfo>().unwrap(), TypeInfo::decimal(10, 0));
        assert_eq!(
            "decimal(5, 2)".parse::<TypeInfo>().unwrap(),
            TypeInfo::decimal(5, 2)
        );
        assert!("decimal(2,5)".parse::<TypeInfo>().is_err());
        assert!("decimal(39,0)".parse::<TypeInfo>().is_err());
        assert!("map<string,int>".parse::<TypeInfo>().is_err());
    }

    #[test]
    fn test_type_predicates() {
        assert!(TypeInfo::Long.is_integral());
        assert!(!TypeInfo::Double.is_integral());
        assert!(TypeInfo::decimal(5, 2).is_numeric());
        assert!(TypeInfo::Varchar(3).is_string_family());
        assert!(!TypeInfo::Binary.is_numeric());
    }

    #[test]
    fn test_decimal_parse_and_display() {
        assert_eq!(dec("1234.567").to_string(), "1234.567");
        assert_eq!(dec("-0.05").to_string(), "-0.05");
        assert_eq!(dec("1.500").to_string(), "1.5");
        assert_eq!(dec("1.2e2").to_string(), "120");
        assert_eq!(dec("000").to_string(), "0");
        assert_eq!(dec(".5").to_string(), "0.5");
        assert!("abc".parse::<HiveDecimal>().is_err());
        assert!("1.2.3".parse::<HiveDecimal>().is_err());
        assert!("".parse::<HiveDecimal>().is_err());
    }

    #[test]
    fn test_decimal_precision() {
        assert_eq!(dec("1234.567").precision(), 7);
        assert_eq!(dec("1234.567").scale(), 3);
        assert_eq!(dec("0.05").precision(), 2);
        assert_eq!(dec("0").precision(), 1);
    }

    #[test]
    fn test_decimal_overflow() {
        let max = "9".repeat(38);
        assert!(max.parse::<HiveDecimal>().is_ok());
        let too_big = "9".repeat(39);
        assert!(too_big.parse::<HiveDecimal>().is_err());
        // Fractional digits beyond 38 total are rounded off.
        let long_frac = format!("1.{}", "1".repeat(40));
        let d: HiveDecimal = long_frac.parse().unwrap();
        assert_eq!(d.precision(), 38);
    }

    #[test]
    fn test_decimal_set_scale_half_up() {
        assert_eq!(dec("1234.567").set_scale_half_up(2).unwrap(), dec("1234.57"));
        assert_eq!(dec("1234.565").set_scale_half_up(2).unwrap(), dec("1234.57"));
        assert_eq!(dec("-1234.565").set_scale_half_up(2).unwrap(), dec("-1234.57"));
        assert_eq!(dec("1234.567").set_scale_half_up(0).unwrap(), dec("1235"));
        assert_eq!(dec("1234.567").set_scale_half_up(-2).unwrap(), dec("1200"));
        assert_eq!(dec("1250").set_scale_half_up(-2).unwrap(), dec("1300"));
        assert_eq!(dec("1234.567").set_scale_half_up(5).unwrap(), dec("1234.567"));
        assert_eq!(dec("4.5").set_scale_half_up(-5).unwrap(), HiveDecimal::ZERO);

        let nines: HiveDecimal = "9".repeat(38).parse().unwrap();
        assert!(nines.set_scale_half_up(-1).is_none());
    }

    #[test]
    fn test_decimal_ordering_and_arithmetic() {
        assert!(dec("1.5") > dec("1.25"));
        assert!(dec("-2") < dec("-1.999"));
        assert_eq!(dec("1.25").checked_add(&dec("0.75")).unwrap(), dec("2"));
        assert_eq!(dec("10").checked_div_count(4, 4).unwrap(), dec("2.5"));
        assert_eq!(dec("1").checked_div_count(3, 4).unwrap(), dec("0.3333"));
        assert!(dec("1").checked_div_count(0, 4).is_none());
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(1.0), "1.0");
        assert_eq!(format_double(12.3456), "12.3456");
        assert_eq!(format_double(1e10), "1.0E10");
        assert_eq!(format_double(1.5e-5), "1.5E-5");
        assert_eq!(format_double(0.0), "0.0");
        assert_eq!(format_double(f64::NAN), "NaN");
        assert_eq!(format_double(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Double(3.0).to_string(), "3.0");
        assert_eq!(Value::Decimal(dec("1.50")).to_string(), "1.5");
        let ts = NaiveDate::from_ymd_opt(2012, 1, 1)
            .unwrap()
            .and_hms_milli_opt(10, 0, 0, 500)
            .unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2012-01-01 10:00:00.5");
        let ts = NaiveDate::from_ymd_opt(2012, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2012-01-01 10:00:00");
    }

    #[test]
    fn test_value_equality_and_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Value::Double(0.0));
        set.insert(Value::Double(-0.0));
        set.insert(Value::Double(f64::NAN));
        set.insert(Value::Double(f64::NAN));
        assert_eq!(set.len(), 2);
        assert_ne!(Value::Int(1), Value::Long(1));
    }

    #[test]
    fn test_value_compare() {
        assert_eq!(Value::Int(1).compare(&Value::Long(2)), Some(Ordering::Less));
        assert_eq!(
            Value::Double(2.5).compare(&Value::Int(2)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::String("b".into()).compare(&Value::String("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert_eq!(Value::Int(1).compare(&Value::String("1".into())), None);
    }

    #[test]
    fn test_value_serde() {
        let v = Value::Decimal(dec("12.5"));
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"Decimal":"12.5"}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        let t: TypeInfo = serde_json::from_str(r#""decimal(7,3)""#).unwrap();
        assert_eq!(t, TypeInfo::decimal(7, 3));
    }
}
