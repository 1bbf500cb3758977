//! Decoded JSON value tree and the parser front-end.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Number;

use crate::error::SpreadError;
use crate::spec::EnumCellValue;
use crate::workbook::Spread;

////////////////////////////////////////////////////////////////////////////////
// #region ValueTree

/// Ordered map node; iteration follows decode order.
pub type TypeValueMap = IndexMap<String, EnumValue>;

/// Generic decoded JSON value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumValue {
    /// JSON `null`.
    #[default]
    Null,
    /// JSON boolean.
    Boolean(bool),
    /// JSON number, kept exact until a cell is produced.
    Number(Number),
    /// JSON string.
    String(String),
    /// JSON object.
    Map(TypeValueMap),
    /// JSON array.
    Sequence(Vec<EnumValue>),
}

impl EnumValue {
    /// Decode JSON text into a value tree.
    pub fn from_json_str(text: &str) -> Result<Self, SpreadError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::from(value))
    }

    /// Encode back to compact JSON text.
    pub fn to_json(&self) -> String {
        serde_json::Value::from(self).to_string()
    }

    /// Whether the node is a map or a sequence.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Sequence(_))
    }

    /// Borrow as a map.
    pub fn as_map(&self) -> Option<&TypeValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as a sequence.
    pub fn as_sequence(&self) -> Option<&[EnumValue]> {
        match self {
            Self::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Fetch a field by key name (map) or positional index string (sequence).
    pub fn lookup(&self, key: &str) -> Option<&EnumValue> {
        match self {
            Self::Map(map) => map.get(key),
            Self::Sequence(seq) => key.parse::<usize>().ok().and_then(|idx| seq.get(idx)),
            _ => None,
        }
    }

    /// Short kind name used in warnings.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Map(_) => "map",
            Self::Sequence(_) => "sequence",
        }
    }

    /// Convert to a cell scalar. Containers become compact JSON text.
    pub fn to_cell_value(&self) -> EnumCellValue {
        match self {
            Self::Null => EnumCellValue::None,
            Self::Boolean(b) => EnumCellValue::Boolean(*b),
            Self::Number(n) => {
                if let Some(val) = n.as_i64() {
                    EnumCellValue::from(val)
                } else if let Some(val) = n.as_u64() {
                    EnumCellValue::from(val)
                } else {
                    match n.as_f64() {
                        Some(val) => EnumCellValue::Number(val),
                        None => EnumCellValue::String(n.to_string()),
                    }
                }
            }
            Self::String(s) => EnumCellValue::String(s.clone()),
            Self::Map(_) | Self::Sequence(_) => EnumCellValue::String(self.to_json()),
        }
    }

    /// Text form of a scalar, used when a value names a column.
    pub fn to_label(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Map(_) | Self::Sequence(_) => self.to_json(),
        }
    }
}

impl From<serde_json::Value> for EnumValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(seq) => {
                Self::Sequence(seq.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&EnumValue> for serde_json::Value {
    fn from(value: &EnumValue) -> Self {
        match value {
            EnumValue::Null => Self::Null,
            EnumValue::Boolean(b) => Self::Bool(*b),
            EnumValue::Number(n) => Self::Number(n.clone()),
            EnumValue::String(s) => Self::String(s.clone()),
            EnumValue::Sequence(seq) => Self::Array(seq.iter().map(Self::from).collect()),
            EnumValue::Map(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for EnumValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<EnumValue>> for EnumValue {
    fn from(value: Vec<EnumValue>) -> Self {
        Self::Sequence(value)
    }
}

impl From<TypeValueMap> for EnumValue {
    fn from(value: TypeValueMap) -> Self {
        Self::Map(value)
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

/// Report whether `text` decodes as JSON.
pub fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parser

/// Holder for one decoded document, handed to a [`Spread`].
#[derive(Debug, Clone, Default)]
pub struct JsonParser {
    data: EnumValue,
}

impl JsonParser {
    /// Wrap an already decoded value.
    pub fn new(data: EnumValue) -> Self {
        Self { data }
    }

    /// Decode JSON text.
    pub fn parse(text: &str) -> Result<Self, SpreadError> {
        Ok(Self::new(EnumValue::from_json_str(text)?))
    }

    /// See [`is_json`].
    pub fn is_json(text: &str) -> bool {
        is_json(text)
    }

    /// Replace the held value.
    pub fn set(&mut self, data: EnumValue) {
        self.data = data;
    }

    /// Borrow the held value.
    pub fn get(&self) -> &EnumValue {
        &self.data
    }

    /// Encode the held value as compact JSON.
    pub fn to_json(&self) -> String {
        self.data.to_json()
    }

    /// Hand the value to a new workbook.
    pub fn to_spread(self) -> Spread {
        Spread::new(self.data)
    }
}

impl fmt::Display for JsonParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_json() {
        assert!(is_json(r#"{"name":"x"}"#));
        assert!(!is_json(r#""name":"x"}"#));
        assert!(is_json("[]"));
        assert!(!is_json(""));
    }

    #[test]
    fn test_map_keeps_decode_order() {
        let value = EnumValue::from_json_str(r#"{"z":1,"a":2,"m":3}"#).expect("decode");
        let l_keys: Vec<&str> = value
            .as_map()
            .expect("map")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(l_keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_lookup_by_name_and_position() {
        let map = EnumValue::from_json_str(r#"{"id":7}"#).expect("decode");
        assert_eq!(map.lookup("id").map(EnumValue::to_label), Some("7".to_string()));
        assert!(map.lookup("missing").is_none());

        let seq = EnumValue::from_json_str(r#"["a","b"]"#).expect("decode");
        assert_eq!(seq.lookup("1"), Some(&EnumValue::from("b")));
        assert!(seq.lookup("2").is_none());
        assert!(seq.lookup("x").is_none());

        assert!(EnumValue::from("s").lookup("0").is_none());
    }

    #[test]
    fn test_cell_value_conversion() {
        let value = EnumValue::from_json_str(r#"[null,true,1,1.5,"t",{"k":[1]}]"#)
            .expect("decode");
        let l_cells: Vec<EnumCellValue> = value
            .as_sequence()
            .expect("seq")
            .iter()
            .map(EnumValue::to_cell_value)
            .collect();
        assert_eq!(
            l_cells,
            vec![
                EnumCellValue::None,
                EnumCellValue::Boolean(true),
                EnumCellValue::Number(1.0),
                EnumCellValue::Number(1.5),
                EnumCellValue::String("t".to_string()),
                EnumCellValue::String(r#"{"k":[1]}"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_integer_cells_stay_exact() {
        let value = EnumValue::from_json_str(
            "[9007199254740993,18446744073709551615,-9007199254740993,42]",
        )
        .expect("decode");
        let l_cells: Vec<EnumCellValue> = value
            .as_sequence()
            .expect("seq")
            .iter()
            .map(EnumValue::to_cell_value)
            .collect();
        assert_eq!(
            l_cells,
            vec![
                EnumCellValue::Integer(9_007_199_254_740_993),
                EnumCellValue::Integer(18_446_744_073_709_551_615),
                EnumCellValue::Integer(-9_007_199_254_740_993),
                EnumCellValue::Number(42.0),
            ]
        );
    }

    #[test]
    fn test_parser_round_trips_json_text() {
        let parser = JsonParser::parse(r#"{"dani":"doble"}"#).expect("parse");
        assert_eq!(parser.to_json(), r#"{"dani":"doble"}"#);
        assert_eq!(parser.to_string(), r#"{"dani":"doble"}"#);
        assert_eq!(JsonParser::default().to_json(), "null");

        let mut parser = JsonParser::default();
        parser.set(EnumValue::Sequence(vec![EnumValue::from("assigned")]));
        assert_eq!(parser.to_json(), r#"["assigned"]"#);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(
            JsonParser::parse(r#"[{"name":"John""#),
            Err(SpreadError::Decode(_))
        ));
    }
}
