//! Converters between the simple types: `string`, `integer`, `float` and `boolean`.

use std::sync::Arc;

use indexmap::IndexMap;

use proteus_api::converter::{ConverterId, Outcome, SoftError, TypeConverter};
use proteus_api::error::ConverterError;
use proteus_api::mapping::MappingConfiguration;
use proteus_api::types;
use proteus_api::value::Value;

/// Soft error code for a string that is not a number.
pub const NOT_AN_INTEGER: u32 = 1332933658;
pub const NOT_A_FLOAT: u32 = 1332934124;

/// `StringConverter` option: how lists are rendered, `csv` (default) or `json`.
pub const ARRAY_FORMAT: &str = "array_format";
/// `StringConverter` option: separator of the `csv` array format.
pub const CSV_DELIMITER: &str = "csv_delimiter";

/// Every converter of this crate.
pub fn converters() -> Vec<Arc<dyn TypeConverter>> {
    vec![
        Arc::new(StringConverter),
        Arc::new(IntegerConverter),
        Arc::new(FloatConverter),
        Arc::new(BooleanConverter),
    ]
}

// ═══════════════════════════════════════════════════════════════
//  StringConverter
// ═══════════════════════════════════════════════════════════════

pub struct StringConverter;

impl StringConverter {
    pub const ID: ConverterId = ConverterId::new("string");
}

impl TypeConverter for StringConverter {
    fn id(&self) -> ConverterId {
        Self::ID
    }

    fn supported_source_types(&self) -> &[&'static str] {
        &[types::STRING, types::INTEGER, types::FLOAT, types::BOOLEAN, types::ARRAY]
    }

    fn supported_target_type(&self) -> &str {
        types::STRING
    }

    fn priority(&self) -> i32 {
        1
    }

    fn convert_from(
        &self,
        source: &Value,
        _target_type: &str,
        _children: IndexMap<String, Value>,
        config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        let options = config.converter_options(Self::ID.name);
        let rendered = match source {
            Value::List(_) | Value::Map(_) => {
                match options.and_then(|o| o.get_str(ARRAY_FORMAT)).unwrap_or("csv") {
                    "csv" => {
                        let delimiter = options.and_then(|o| o.get_str(CSV_DELIMITER)).unwrap_or(",");
                        let mut parts = Vec::new();
                        for (key, item) in source.entries() {
                            parts.push(scalar_text(&item).ok_or_else(|| {
                                ConverterError::source(format!("element '{key}' has no csv representation"))
                            })?);
                        }
                        parts.join(delimiter)
                    }
                    "json" => serde_json::to_string(&source.to_json())?,
                    other => {
                        return Err(ConverterError::configuration(format!("unknown array format '{other}'")));
                    }
                }
            }
            other => scalar_text(other)
                .ok_or_else(|| ConverterError::source(format!("cannot render {} as string", other.type_name())))?,
        };
        Ok(Outcome::Value(Value::String(rendered)))
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Bool(true) => Some("1".into()),
        Value::Bool(false) => Some(String::new()),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════
//  IntegerConverter
// ═══════════════════════════════════════════════════════════════

/// Numeric strings are truncated towards zero; `""` converts to nothing.
pub struct IntegerConverter;

impl IntegerConverter {
    pub const ID: ConverterId = ConverterId::new("integer");
}

impl TypeConverter for IntegerConverter {
    fn id(&self) -> ConverterId {
        Self::ID
    }

    fn supported_source_types(&self) -> &[&'static str] {
        &[types::INTEGER, types::STRING]
    }

    fn supported_target_type(&self) -> &str {
        types::INTEGER
    }

    fn priority(&self) -> i32 {
        1
    }

    fn convert_from(
        &self,
        source: &Value,
        _target_type: &str,
        _children: IndexMap<String, Value>,
        _config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        match source {
            Value::Integer(i) => Ok(Value::Integer(*i).into()),
            Value::String(s) if s.is_empty() => Ok(Value::Null.into()),
            Value::String(s) => Ok(match parse_integer(s.trim()) {
                Some(i) => Value::Integer(i).into(),
                None => {
                    tracing::trace!(input = %s, "not a valid integer");
                    SoftError::new(NOT_AN_INTEGER, format!("\"{s}\" is not numeric")).with_argument(s.as_str()).into()
                }
            }),
            other => Err(ConverterError::source(format!("cannot convert {} to integer", other.type_name()))),
        }
    }
}

fn parse_integer(s: &str) -> Option<i64> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    let f = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
    let truncated = f.trunc();
    (truncated >= i64::MIN as f64 && truncated < i64::MAX as f64).then_some(truncated as i64)
}

// ═══════════════════════════════════════════════════════════════
//  FloatConverter
// ═══════════════════════════════════════════════════════════════

pub struct FloatConverter;

impl FloatConverter {
    pub const ID: ConverterId = ConverterId::new("float");
}

impl TypeConverter for FloatConverter {
    fn id(&self) -> ConverterId {
        Self::ID
    }

    fn supported_source_types(&self) -> &[&'static str] {
        &[types::FLOAT, types::INTEGER, types::STRING]
    }

    fn supported_target_type(&self) -> &str {
        types::FLOAT
    }

    fn priority(&self) -> i32 {
        1
    }

    fn convert_from(
        &self,
        source: &Value,
        _target_type: &str,
        _children: IndexMap<String, Value>,
        _config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        match source {
            Value::Float(f) => Ok(Value::Float(*f).into()),
            Value::Integer(i) => Ok(Value::Float(*i as f64).into()),
            Value::String(s) if s.is_empty() => Ok(Value::Null.into()),
            Value::String(s) => Ok(match s.trim().parse::<f64>().ok().filter(|f| f.is_finite()) {
                Some(f) => Value::Float(f).into(),
                None => SoftError::new(NOT_A_FLOAT, format!("\"{s}\" is not a float"))
                    .with_argument(s.as_str())
                    .into(),
            }),
            other => Err(ConverterError::source(format!("cannot convert {} to float", other.type_name()))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  BooleanConverter
// ═══════════════════════════════════════════════════════════════

/// `false`, `off`, `n`, `no`, `0` and `""` (any case) are false; every
/// other string is true. Numbers are true when non-zero.
pub struct BooleanConverter;

impl BooleanConverter {
    pub const ID: ConverterId = ConverterId::new("boolean");
}

const FALSE_WORDS: &[&str] = &["", "0", "false", "off", "n", "no"];

impl TypeConverter for BooleanConverter {
    fn id(&self) -> ConverterId {
        Self::ID
    }

    fn supported_source_types(&self) -> &[&'static str] {
        &[types::BOOLEAN, types::STRING, types::INTEGER, types::FLOAT]
    }

    fn supported_target_type(&self) -> &str {
        types::BOOLEAN
    }

    fn priority(&self) -> i32 {
        1
    }

    fn convert_from(
        &self,
        source: &Value,
        _target_type: &str,
        _children: IndexMap<String, Value>,
        _config: &MappingConfiguration,
    ) -> Result<Outcome, ConverterError> {
        let b = match source {
            Value::Bool(b) => *b,
            Value::String(s) => !FALSE_WORDS.contains(&s.trim().to_ascii_lowercase().as_str()),
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            other => return Err(ConverterError::source(format!("cannot convert {} to boolean", other.type_name()))),
        };
        Ok(Value::Bool(b).into())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use proteus_api::options::ConverterOptions;

    use super::*;

    fn run(converter: &dyn TypeConverter, source: Value) -> Outcome {
        let config = MappingConfiguration::new();
        converter
            .convert_from(&source, converter.supported_target_type(), IndexMap::new(), &config)
            .unwrap()
    }

    #[test]
    fn integer_from_numeric_strings() {
        assert_eq!(run(&IntegerConverter, "42".into()), Outcome::Value(Value::Integer(42)));
        assert_eq!(run(&IntegerConverter, " -7 ".into()), Outcome::Value(Value::Integer(-7)));
        assert_eq!(run(&IntegerConverter, "3.9".into()), Outcome::Value(Value::Integer(3)));
        assert_eq!(run(&IntegerConverter, "".into()), Outcome::Value(Value::Null));
    }

    #[test]
    fn integer_rejects_words_softly() {
        match run(&IntegerConverter, "forty".into()) {
            Outcome::Error(e) => {
                assert_eq!(e.code, NOT_AN_INTEGER);
                assert_eq!(e.arguments, vec!["forty".to_string()]);
            }
            other => panic!("expected soft error, got {other:?}"),
        }
        assert!(run(&IntegerConverter, "1e400".into()).is_error());
    }

    #[test]
    fn integer_rejects_values_past_i64_max() {
        assert_eq!(
            run(&IntegerConverter, "9223372036854775807".into()),
            Outcome::Value(Value::Integer(i64::MAX))
        );
        match run(&IntegerConverter, "9223372036854775808".into()) {
            Outcome::Error(e) => assert_eq!(e.code, NOT_AN_INTEGER),
            other => panic!("expected soft error, got {other:?}"),
        }
    }

    #[test]
    fn float_from_integer_and_string() {
        assert_eq!(run(&FloatConverter, Value::Integer(2)), Outcome::Value(Value::Float(2.0)));
        assert_eq!(run(&FloatConverter, "2.5".into()), Outcome::Value(Value::Float(2.5)));
        assert_eq!(run(&FloatConverter, "".into()), Outcome::Value(Value::Null));
        assert!(run(&FloatConverter, "NaN".into()).is_error());
        assert!(run(&FloatConverter, "abc".into()).is_error());
    }

    #[test]
    fn boolean_false_words() {
        for word in ["false", "OFF", "n", "No", "0", ""] {
            assert_eq!(run(&BooleanConverter, word.into()), Outcome::Value(Value::Bool(false)), "{word}");
        }
        for word in ["true", "yes", "on", "1", "anything"] {
            assert_eq!(run(&BooleanConverter, word.into()), Outcome::Value(Value::Bool(true)), "{word}");
        }
        assert_eq!(run(&BooleanConverter, Value::Float(0.0)), Outcome::Value(Value::Bool(false)));
        assert_eq!(run(&BooleanConverter, Value::Integer(5)), Outcome::Value(Value::Bool(true)));
    }

    #[test]
    fn string_from_scalars() {
        assert_eq!(run(&StringConverter, Value::Integer(42)), Outcome::Value("42".into()));
        assert_eq!(run(&StringConverter, Value::Float(1.5)), Outcome::Value("1.5".into()));
        assert_eq!(run(&StringConverter, Value::Bool(true)), Outcome::Value("1".into()));
    }

    #[test]
    fn string_from_list_as_csv_or_json() {
        let list = Value::List(vec![Value::Integer(1), "a".into()]);
        assert_eq!(run(&StringConverter, list.clone()), Outcome::Value("1,a".into()));

        let mut config = MappingConfiguration::new();
        config.set_converter_options(
            StringConverter::ID,
            ConverterOptions::from_iter([(CSV_DELIMITER, ";")]),
        );
        let out = StringConverter.convert_from(&list, "string", IndexMap::new(), &config).unwrap();
        assert_eq!(out, Outcome::Value("1;a".into()));

        config.set_converter_option(StringConverter::ID, ARRAY_FORMAT, "json");
        let out = StringConverter.convert_from(&list, "string", IndexMap::new(), &config).unwrap();
        assert_eq!(out, Outcome::Value("[1,\"a\"]".into()));
    }

    #[test]
    fn string_rejects_nested_csv() {
        let nested = Value::List(vec![Value::List(vec![])]);
        let config = MappingConfiguration::new();
        let err = StringConverter.convert_from(&nested, "string", IndexMap::new(), &config).unwrap_err();
        assert_eq!(err.kind, proteus_api::error::ErrorKind::Source);
    }

    proptest! {
        #[test]
        fn integer_strings_convert_exactly(i in any::<i64>()) {
            prop_assert_eq!(run(&IntegerConverter, i.to_string().into()), Outcome::Value(Value::Integer(i)));
        }

        #[test]
        fn string_then_integer_is_identity(i in any::<i64>()) {
            let Outcome::Value(text) = run(&StringConverter, Value::Integer(i)) else {
                return Err(TestCaseError::fail("string conversion failed"));
            };
            prop_assert_eq!(run(&IntegerConverter, text), Outcome::Value(Value::Integer(i)));
        }
    }
}
