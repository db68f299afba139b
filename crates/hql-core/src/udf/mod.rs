//! Generic user-defined function framework.
//!
//! A UDF is initialized once with an [`ObjectInspector`] per argument, which
//! fixes its output type, and is then evaluated row by row.

pub mod round;

pub use round::Round;

use crate::types::{TypeInfo, Value};
use crate::{Result, UdfError};
use std::collections::HashMap;
use std::fmt;

/// Describes one UDF argument: its type and, for constant arguments, the value.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInspector {
    pub type_info: TypeInfo,
    pub constant: Option<Value>,
}

impl ObjectInspector {
    /// A non-constant argument of the given type.
    pub fn new(type_info: TypeInfo) -> Self {
        Self {
            type_info,
            constant: None,
        }
    }

    /// A constant argument; the type is taken from the value.
    pub fn constant(value: Value) -> Self {
        Self {
            type_info: value.type_info(),
            constant: Some(value),
        }
    }

    /// A constant argument with an explicit type (e.g. a typed NULL).
    pub fn typed_constant(type_info: TypeInfo, value: Value) -> Self {
        Self {
            type_info,
            constant: Some(value),
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }
}

/// A Hive generic UDF.
pub trait GenericUdf: Send + Sync + fmt::Debug {
    /// Function name as used in queries.
    fn name(&self) -> &str;

    /// Check the arguments and return the output type.
    fn initialize(&mut self, arguments: &[ObjectInspector]) -> Result<TypeInfo>;

    /// Evaluate one row.
    fn evaluate(&self, arguments: &[Value]) -> Result<Value>;

    /// Text shown in plans, e.g. `round(_col0, 2)`.
    fn display_string(&self, children: &[String]) -> String {
        format!("{}({})", self.name(), children.join(", "))
    }
}

type UdfFactory = fn() -> Box<dyn GenericUdf>;

/// Registry of scalar functions by (case-insensitive) name.
#[derive(Clone)]
pub struct FunctionRegistry {
    factories: HashMap<String, UdfFactory>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in functions.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("round", || Box::new(Round::new()));
        registry
    }

    pub fn register(&mut self, name: &str, factory: UdfFactory) {
        self.factories.insert(name.to_ascii_lowercase(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Instantiate and initialize a function for the given arguments.
    pub fn resolve(
        &self,
        name: &str,
        arguments: &[ObjectInspector],
    ) -> Result<(Box<dyn GenericUdf>, TypeInfo)> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| UdfError::UnknownFunction(name.to_string()))?;
        let mut udf = factory();
        let output = udf.initialize(arguments)?;
        Ok((udf, output))
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_resolves_round() {
        let registry = FunctionRegistry::builtin();
        assert!(registry.contains("ROUND"));

        let (udf, output) = registry
            .resolve(
                "Round",
                &[
                    ObjectInspector::new(TypeInfo::Double),
                    ObjectInspector::constant(Value::Int(1)),
                ],
            )
            .unwrap();
        assert_eq!(output, TypeInfo::Double);
        assert_eq!(
            udf.evaluate(&[Value::Double(12.3456), Value::Int(1)]).unwrap(),
            Value::Double(12.3)
        );
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::builtin();
        let err = registry.resolve("nope", &[]).unwrap_err();
        assert!(err.to_string().contains("Invalid function nope"));
    }

    #[test]
    fn test_object_inspector_constant() {
        let oi = ObjectInspector::constant(Value::Long(3));
        assert!(oi.is_constant());
        assert_eq!(oi.type_info, TypeInfo::Long);
        assert!(!ObjectInspector::new(TypeInfo::Int).is_constant());
    }
}
