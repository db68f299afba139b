//! `round(x[, d])`: round x to d decimal places, HALF_UP.
//!
//! Decimal inputs may be rounded to a negative scale, which rounds off integer
//! digits (`round(1234.567, -2)` is `1200` with type `decimal(5,0)`). The
//! result type never carries a negative scale.

use super::{GenericUdf, ObjectInspector};
use crate::types::{HiveDecimal, TypeInfo, Value};
use crate::{Result, UdfError};

/// The ROUND function.
#[derive(Debug, Default, Clone)]
pub struct Round {
    input_type: Option<TypeInfo>,
    scale: i32,
}

impl Round {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale fixed by the second argument (0 when absent).
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Output decimal type for rounding `decimal(p,s)` to `dec` places.
    pub fn output_decimal_type(precision: u32, scale: u32, dec: i32) -> TypeInfo {
        let int_parts = precision as i32 - scale as i32;
        // Rounding may carry into one more integer digit.
        let new_int_parts = if dec < scale as i32 {
            int_parts + 1
        } else {
            int_parts
        };
        let new_scale = if dec < 0 {
            0
        } else {
            dec.min(HiveDecimal::MAX_SCALE as i32)
        };
        let new_precision = (new_int_parts + new_scale).min(HiveDecimal::MAX_PRECISION as i32);
        TypeInfo::decimal(new_precision.max(1) as u32, new_scale as u32)
    }

    fn scale_from(argument: &ObjectInspector) -> Result<i32> {
        if argument.type_info == TypeInfo::Void {
            return Ok(0);
        }
        if !argument.type_info.is_integral() {
            return Err(
                UdfError::Argument("ROUND second argument only takes integer constant".into())
                    .into(),
            );
        }
        let value = match &argument.constant {
            Some(constant) => constant.as_i64().unwrap_or(0),
            None => {
                return Err(
                    UdfError::Argument("ROUND second argument only takes constant".into()).into(),
                )
            }
        };
        i32::try_from(value).map_err(|_| {
            UdfError::Argument("ROUND scale argument out of allowed range".into()).into()
        })
    }

    /// Round a single input value with the initialized scale.
    pub fn evaluate_one(&self, input: &Value) -> Result<Value> {
        let input_type = self
            .input_type
            .ok_or_else(|| UdfError::NotInitialized("round".into()))?;
        if input.is_null() {
            return Ok(Value::Null);
        }
        let scale = self.scale;

        let integral = |v: &Value| -> Result<i64> {
            v.as_i64().ok_or_else(|| {
                UdfError::Argument(format!("ROUND expected {}, got {}", input_type, v.type_info()))
                    .into()
            })
        };

        let result = match input_type {
            TypeInfo::Void => Value::Null,
            TypeInfo::Decimal { .. } => match input {
                Value::Decimal(d) => d
                    .set_scale_half_up(scale)
                    .map(Value::Decimal)
                    .unwrap_or(Value::Null),
                other => {
                    return Err(UdfError::Argument(format!(
                        "ROUND expected decimal, got {}",
                        other.type_info()
                    ))
                    .into())
                }
            },
            TypeInfo::Byte => Value::Byte(round_long(integral(input)?, scale) as i8),
            TypeInfo::Short => Value::Short(round_long(integral(input)?, scale) as i16),
            TypeInfo::Int => Value::Int(round_long(integral(input)?, scale) as i32),
            TypeInfo::Long => Value::Long(round_long(integral(input)?, scale)),
            TypeInfo::Float => {
                let v = input.as_f64().ok_or_else(|| {
                    UdfError::Argument(format!("ROUND expected float, got {}", input.type_info()))
                })?;
                Value::Float(round_double(v, scale) as f32)
            }
            TypeInfo::Double => {
                let v = input.as_f64().ok_or_else(|| {
                    UdfError::Argument(format!("ROUND expected double, got {}", input.type_info()))
                })?;
                Value::Double(round_double(v, scale))
            }
            TypeInfo::String | TypeInfo::Varchar(_) | TypeInfo::Char(_) => match input {
                Value::String(s) => match s.trim().parse::<f64>() {
                    Ok(v) => Value::Double(round_double(v, scale)),
                    Err(_) => Value::Null,
                },
                other => match other.as_f64() {
                    Some(v) => Value::Double(round_double(v, scale)),
                    None => Value::Null,
                },
            },
            other => {
                return Err(UdfError::Argument(format!(
                    "Only numeric data types are allowed for ROUND function. Got {}",
                    type_category_name(&other)
                ))
                .into())
            }
        };
        Ok(result)
    }

    /// Round a whole column with the initialized scale.
    pub fn evaluate_batch(&self, column: &[Value]) -> Result<Vec<Value>> {
        column.iter().map(|v| self.evaluate_one(v)).collect()
    }
}

fn type_category_name(type_info: &TypeInfo) -> &'static str {
    match type_info {
        TypeInfo::Void => "VOID",
        TypeInfo::Boolean => "BOOLEAN",
        TypeInfo::Byte => "BYTE",
        TypeInfo::Short => "SHORT",
        TypeInfo::Int => "INT",
        TypeInfo::Long => "LONG",
        TypeInfo::Float => "FLOAT",
        TypeInfo::Double => "DOUBLE",
        TypeInfo::String => "STRING",
        TypeInfo::Varchar(_) => "VARCHAR",
        TypeInfo::Char(_) => "CHAR",
        TypeInfo::Decimal { .. } => "DECIMAL",
        TypeInfo::Date => "DATE",
        TypeInfo::Timestamp => "TIMESTAMP",
        TypeInfo::Binary => "BINARY",
    }
}

impl GenericUdf for Round {
    fn name(&self) -> &str {
        "round"
    }

    fn initialize(&mut self, arguments: &[ObjectInspector]) -> Result<TypeInfo> {
        if arguments.is_empty() || arguments.len() > 2 {
            return Err(UdfError::ArgumentLength(format!(
                "ROUND requires one or two argument, got {}",
                arguments.len()
            ))
            .into());
        }

        self.scale = match arguments.get(1) {
            Some(scale_arg) => Self::scale_from(scale_arg)?,
            None => 0,
        };

        let input_type = arguments[0].type_info;
        let output = match input_type {
            TypeInfo::Decimal { precision, scale } => {
                Self::output_decimal_type(precision as u32, scale as u32, self.scale)
            }
            TypeInfo::Void
            | TypeInfo::Byte
            | TypeInfo::Short
            | TypeInfo::Int
            | TypeInfo::Long
            | TypeInfo::Float
            | TypeInfo::Double => input_type,
            TypeInfo::String | TypeInfo::Varchar(_) | TypeInfo::Char(_) => TypeInfo::Double,
            other => {
                return Err(UdfError::Argument(format!(
                    "Only numeric data types are allowed for ROUND function. Got {}",
                    type_category_name(&other)
                ))
                .into())
            }
        };

        self.input_type = Some(input_type);
        Ok(output)
    }

    fn evaluate(&self, arguments: &[Value]) -> Result<Value> {
        if arguments.len() == 2 && arguments[1].is_null() {
            return Ok(Value::Null);
        }
        match arguments.first() {
            Some(input) => self.evaluate_one(input),
            None => Ok(Value::Null),
        }
    }
}

/// Round a long HALF_UP at `10^-scale`; non-negative scales leave it as is.
///
/// The result wraps like a Java `long` narrowing when the rounded value
/// leaves the i64 range.
pub fn round_long(input: i64, scale: i32) -> i64 {
    if scale >= 0 {
        return input;
    }
    let shift = scale.unsigned_abs();
    if shift >= 20 {
        return 0;
    }
    let factor = 10i128.pow(shift);
    let value = input as i128;
    let quotient = value / factor;
    let remainder = (value % factor).abs();
    let rounded = if remainder >= factor - remainder {
        quotient + value.signum()
    } else {
        quotient
    };
    (rounded * factor) as i64
}

/// Round a double HALF_UP on its shortest decimal representation.
///
/// `2.675` rounds to `2.68` at two places even though its binary value is
/// slightly below 2.675. NaN and infinities pass through.
pub fn round_double(input: f64, scale: i32) -> f64 {
    if !input.is_finite() {
        return input;
    }
    let repr = format!("{:e}", input);
    let (mantissa, exponent) = match repr.split_once('e') {
        Some(parts) => parts,
        None => return input,
    };
    let exponent: i64 = match exponent.parse() {
        Ok(e) => e,
        Err(_) => return input,
    };
    let negative = mantissa.starts_with('-');
    let digits: Vec<u8> = mantissa
        .bytes()
        .filter(|b| b.is_ascii_digit())
        .map(|b| b - b'0')
        .collect();

    // Digit i has place value 10^(exponent - i); keep those at or above 10^-scale.
    let keep = exponent + scale as i64 + 1;
    if keep >= digits.len() as i64 {
        return input;
    }
    if keep < 0 {
        return 0.0;
    }

    let keep = keep as usize;
    let mut kept: u64 = digits[..keep]
        .iter()
        .fold(0u64, |acc, d| acc * 10 + *d as u64);
    if digits[keep] >= 5 {
        kept += 1;
    }
    if kept == 0 {
        return 0.0;
    }
    let sign = if negative { "-" } else { "" };
    format!("{}{}e{}", sign, kept, -(scale as i64))
        .parse()
        .unwrap_or(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> HiveDecimal {
        s.parse().unwrap()
    }

    fn init(args: &[ObjectInspector]) -> (Round, TypeInfo) {
        let mut round = Round::new();
        let output = round.initialize(args).unwrap();
        (round, output)
    }

    #[test]
    fn test_argument_count() {
        let mut round = Round::new();
        let err = round.initialize(&[]).unwrap_err();
        assert!(err
            .to_string()
            .contains("ROUND requires one or two argument, got 0"));

        let args = vec![ObjectInspector::new(TypeInfo::Double); 3];
        assert!(round.initialize(&args).is_err());
    }

    #[test]
    fn test_scale_must_be_integer_constant() {
        let mut round = Round::new();
        let err = round
            .initialize(&[
                ObjectInspector::new(TypeInfo::Double),
                ObjectInspector::new(TypeInfo::Int),
            ])
            .unwrap_err();
        assert!(err.to_string().contains("only takes constant"));

        let err = round
            .initialize(&[
                ObjectInspector::new(TypeInfo::Double),
                ObjectInspector::constant(Value::Double(1.0)),
            ])
            .unwrap_err();
        assert!(err.to_string().contains("only takes integer constant"));

        let err = round
            .initialize(&[
                ObjectInspector::new(TypeInfo::Double),
                ObjectInspector::constant(Value::Long(i64::from(i32::MAX) + 1)),
            ])
            .unwrap_err();
        assert!(err.to_string().contains("out of allowed range"));

        // A void scale leaves the scale at zero.
        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::Double),
            ObjectInspector::new(TypeInfo::Void),
        ]);
        assert_eq!(round.scale(), 0);
    }

    #[test]
    fn test_non_numeric_input_rejected() {
        let mut round = Round::new();
        let err = round
            .initialize(&[ObjectInspector::new(TypeInfo::Boolean)])
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Only numeric data types are allowed for ROUND function. Got BOOLEAN"));
    }

    #[test]
    fn test_output_types() {
        let (_, out) = init(&[ObjectInspector::new(TypeInfo::Int)]);
        assert_eq!(out, TypeInfo::Int);
        let (_, out) = init(&[ObjectInspector::new(TypeInfo::Varchar(10))]);
        assert_eq!(out, TypeInfo::Double);
        let (_, out) = init(&[ObjectInspector::new(TypeInfo::Void)]);
        assert_eq!(out, TypeInfo::Void);
    }

    #[test]
    fn test_decimal_output_type() {
        // decimal(7,3) rounded to -2 produces decimal(5,0).
        assert_eq!(Round::output_decimal_type(7, 3, -2), TypeInfo::decimal(5, 0));
        assert_eq!(Round::output_decimal_type(7, 3, 1), TypeInfo::decimal(6, 1));
        assert_eq!(Round::output_decimal_type(7, 3, 3), TypeInfo::decimal(7, 3));
        assert_eq!(Round::output_decimal_type(7, 3, 5), TypeInfo::decimal(9, 5));
        assert_eq!(Round::output_decimal_type(38, 10, 2), TypeInfo::decimal(31, 2));
        assert_eq!(Round::output_decimal_type(38, 0, 50), TypeInfo::decimal(38, 38));
    }

    #[test]
    fn test_round_decimal() {
        let (round, out) = init(&[
            ObjectInspector::new(TypeInfo::decimal(7, 3)),
            ObjectInspector::constant(Value::Int(-2)),
        ]);
        assert_eq!(out, TypeInfo::decimal(5, 0));
        assert_eq!(
            round
                .evaluate(&[Value::Decimal(dec("1234.567")), Value::Int(-2)])
                .unwrap(),
            Value::Decimal(dec("1200"))
        );

        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::decimal(7, 3)),
            ObjectInspector::constant(Value::Int(2)),
        ]);
        assert_eq!(
            round.evaluate_one(&Value::Decimal(dec("-1.005"))).unwrap(),
            Value::Decimal(dec("-1.01"))
        );
    }

    #[test]
    fn test_round_decimal_overflow_is_null() {
        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::decimal(38, 0)),
            ObjectInspector::constant(Value::Int(-1)),
        ]);
        let nines = Value::Decimal("9".repeat(38).parse().unwrap());
        assert_eq!(round.evaluate_one(&nines).unwrap(), Value::Null);
    }

    #[test]
    fn test_round_extreme_scales() {
        let (round, out) = init(&[
            ObjectInspector::new(TypeInfo::decimal(10, 2)),
            ObjectInspector::constant(Value::Int(i32::MIN)),
        ]);
        assert_eq!(out, TypeInfo::decimal(9, 0));
        assert_eq!(
            round
                .evaluate(&[Value::Decimal(dec("12.34")), Value::Int(i32::MIN)])
                .unwrap(),
            Value::Decimal(HiveDecimal::ZERO)
        );

        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::decimal(10, 2)),
            ObjectInspector::constant(Value::Int(i32::MAX)),
        ]);
        assert_eq!(
            round.evaluate_one(&Value::Decimal(dec("12.34"))).unwrap(),
            Value::Decimal(dec("12.34"))
        );

        assert_eq!(dec("12.34").set_scale_half_up(-40), Some(HiveDecimal::ZERO));
        assert_eq!(dec("12.34").set_scale_half_up(i32::MIN), Some(HiveDecimal::ZERO));
        assert_eq!(round_double(12.34, i32::MIN), 0.0);
        assert_eq!(round_long(1234, i32::MIN), 0);
    }

    #[test]
    fn test_round_integral() {
        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::Int),
            ObjectInspector::constant(Value::Int(2)),
        ]);
        assert_eq!(round.evaluate_one(&Value::Int(1234)).unwrap(), Value::Int(1234));

        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::Int),
            ObjectInspector::constant(Value::Int(-2)),
        ]);
        assert_eq!(round.evaluate_one(&Value::Int(1234)).unwrap(), Value::Int(1200));
        assert_eq!(round.evaluate_one(&Value::Int(1250)).unwrap(), Value::Int(1300));
        assert_eq!(round.evaluate_one(&Value::Int(-1250)).unwrap(), Value::Int(-1300));

        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::Byte),
            ObjectInspector::constant(Value::Byte(-2)),
        ]);
        // 127 rounds to 100; 99 rounds to 100 as well.
        assert_eq!(round.evaluate_one(&Value::Byte(127)).unwrap(), Value::Byte(100));
        assert_eq!(round.evaluate_one(&Value::Byte(99)).unwrap(), Value::Byte(100));
    }

    #[test]
    fn test_round_long_helpers() {
        assert_eq!(round_long(1234, 0), 1234);
        assert_eq!(round_long(1234, -1), 1230);
        assert_eq!(round_long(1235, -1), 1240);
        assert_eq!(round_long(-1235, -1), -1240);
        assert_eq!(round_long(i64::MAX, -25), 0);
        assert_eq!(round_long(4_999_999_999_999_999_999, -19), 0);
    }

    #[test]
    fn test_round_double_helpers() {
        assert_eq!(round_double(12.3456, 1), 12.3);
        assert_eq!(round_double(2.675, 2), 2.68);
        assert_eq!(round_double(-2.5, 0), -3.0);
        assert_eq!(round_double(2.5, 0), 3.0);
        assert_eq!(round_double(1234.567, -2), 1200.0);
        assert_eq!(round_double(0.0004, 2), 0.0);
        assert_eq!(round_double(0.005, 2), 0.01);
        assert_eq!(round_double(55.0, -2), 100.0);
        assert_eq!(round_double(1.0e300, 2), 1.0e300);
        assert!(round_double(f64::NAN, 2).is_nan());
        assert_eq!(round_double(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_round_float_and_double() {
        let (round, out) = init(&[ObjectInspector::new(TypeInfo::Float)]);
        assert_eq!(out, TypeInfo::Float);
        assert_eq!(round.evaluate_one(&Value::Float(2.5)).unwrap(), Value::Float(3.0));

        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::Double),
            ObjectInspector::constant(Value::Int(1)),
        ]);
        assert_eq!(
            round.evaluate_one(&Value::Double(f64::NAN)).unwrap(),
            Value::Double(f64::NAN)
        );
    }

    #[test]
    fn test_round_string_input() {
        let (round, out) = init(&[
            ObjectInspector::new(TypeInfo::String),
            ObjectInspector::constant(Value::Int(1)),
        ]);
        assert_eq!(out, TypeInfo::Double);
        assert_eq!(
            round.evaluate_one(&Value::String(" 12.3456 ".into())).unwrap(),
            Value::Double(12.3)
        );
        assert_eq!(
            round.evaluate_one(&Value::String("abc".into())).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_null_handling() {
        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::Double),
            ObjectInspector::constant(Value::Int(1)),
        ]);
        assert_eq!(
            round.evaluate(&[Value::Double(1.25), Value::Null]).unwrap(),
            Value::Null
        );
        assert_eq!(
            round.evaluate(&[Value::Null, Value::Int(1)]).unwrap(),
            Value::Null
        );

        let (round, _) = init(&[ObjectInspector::new(TypeInfo::Void)]);
        assert_eq!(round.evaluate(&[Value::Int(3)]).unwrap(), Value::Null);
    }

    #[test]
    fn test_evaluate_before_initialize() {
        let round = Round::new();
        assert!(round.evaluate(&[Value::Double(1.0)]).is_err());
    }

    #[test]
    fn test_evaluate_batch() {
        let (round, _) = init(&[
            ObjectInspector::new(TypeInfo::Double),
            ObjectInspector::constant(Value::Int(0)),
        ]);
        let out = round
            .evaluate_batch(&[Value::Double(1.4), Value::Null, Value::Double(-1.5)])
            .unwrap();
        assert_eq!(
            out,
            vec![Value::Double(1.0), Value::Null, Value::Double(-2.0)]
        );
    }

    #[test]
    fn test_display_string() {
        let round = Round::new();
        assert_eq!(
            round.display_string(&["_col0".into(), "2".into()]),
            "round(_col0, 2)"
        );
        assert_eq!(round.display_string(&[]), "round()");
    }
}
