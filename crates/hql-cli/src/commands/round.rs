//! Round command implementation.

use anyhow::Result;
use hql_core::types::{HiveDecimal, TypeInfo, Value};
use hql_core::udf::{FunctionRegistry, ObjectInspector};
use hql_core::{Error, UdfError};

/// Evaluate `round(value[, scale])` and print the result with its type.
pub fn run(value: &str, scale: Option<i32>, type_name: &str) -> Result<()> {
    let (result, output_type) = evaluate(value, scale, type_name)?;
    println!("{}\t{}", result, output_type);
    Ok(())
}

fn evaluate(value: &str, scale: Option<i32>, type_name: &str) -> Result<(Value, TypeInfo)> {
    let type_info: TypeInfo = type_name.parse()?;
    let input = parse_value(value, type_info)?;

    let mut inspectors = vec![ObjectInspector::new(type_info)];
    let mut arguments = vec![input];
    if let Some(scale) = scale {
        inspectors.push(ObjectInspector::constant(Value::Int(scale)));
        arguments.push(Value::Int(scale));
    }

    let (udf, output_type) = FunctionRegistry::builtin().resolve("round", &inspectors)?;
    Ok((udf.evaluate(&arguments)?, output_type))
}

/// Parse a command-line literal as a value of `type_info`.
fn parse_value(text: &str, type_info: TypeInfo) -> Result<Value> {
    let invalid = || -> anyhow::Error {
        Error::from(UdfError::Argument(format!(
            "Cannot read '{}' as {}",
            text, type_info
        )))
        .into()
    };
    let text = text.trim();
    if text.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    let value = match type_info {
        TypeInfo::Void => Value::Null,
        TypeInfo::Byte => Value::Byte(text.parse().map_err(|_| invalid())?),
        TypeInfo::Short => Value::Short(text.parse().map_err(|_| invalid())?),
        TypeInfo::Int => Value::Int(text.parse().map_err(|_| invalid())?),
        TypeInfo::Long => Value::Long(text.parse().map_err(|_| invalid())?),
        TypeInfo::Float => Value::Float(text.parse().map_err(|_| invalid())?),
        TypeInfo::Double => Value::Double(text.parse().map_err(|_| invalid())?),
        TypeInfo::Decimal { .. } => {
            Value::Decimal(text.parse::<HiveDecimal>().map_err(|_| invalid())?)
        }
        TypeInfo::String | TypeInfo::Varchar(_) | TypeInfo::Char(_) => {
            Value::String(text.to_string())
        }
        _ => return Err(invalid()),
    };
    Ok(value)
}
