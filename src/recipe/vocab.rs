//! IOTDB vocabulary: namespaces, IRI compaction and typed-value metadata.

use serde::Serialize;
use serde_json::{Map, Value};

/// Known namespace prefixes and the IRIs they abbreviate
pub const NAMESPACES: &[(&str, &str)] = &[
    ("iot", "https://iotdb.org/pub/iot#"),
    ("iot-unit", "https://iotdb.org/pub/iot-unit#"),
    ("iot-purpose", "https://iotdb.org/pub/iot-purpose#"),
    ("schema", "http://schema.org/"),
];

const IOT_TYPE: &str = "iot:type";
const IOT_FORMAT: &str = "iot:format";
const IOT_UNIT: &str = "iot:unit";
const IOT_PURPOSE: &str = "iot:purpose";

/// JSON-LD `@context` describing `NAMESPACES`
pub fn namespace_context() -> Value {
    let mut context = Map::new();
    for (prefix, iri) in NAMESPACES {
        context.insert(prefix.to_string(), Value::String(iri.to_string()));
    }
    Value::Object(context)
}

/// Compact a full IRI to `prefix:local` when it falls under a known namespace
pub fn compact_iri(raw: &str) -> String {
    for (prefix, iri) in NAMESPACES {
        if let Some(local) = raw.strip_prefix(iri) {
            return format!("{}:{}", prefix, local);
        }
    }
    raw.to_string()
}

/// Compact every IRI in a JSON value, dropping null object members
pub fn compact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(compact_iri(s)),
        Value::Array(items) => Value::Array(items.iter().map(compact_value).collect()),
        Value::Object(members) => Value::Object(
            members
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (compact_iri(k), compact_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Typed-value metadata of a recipe, in `iot:*` form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueMetadata {
    #[serde(rename = "iot:type")]
    pub iot_type: Value,
    #[serde(rename = "iot:format", skip_serializing_if = "Option::is_none")]
    pub iot_format: Option<Value>,
    #[serde(rename = "iot:unit", skip_serializing_if = "Option::is_none")]
    pub iot_unit: Option<Value>,
    #[serde(rename = "iot:purpose", skip_serializing_if = "Option::is_none")]
    pub iot_purpose: Option<Value>,
}

/// Raw metadata as authored on a definition
#[derive(Debug, Default)]
pub struct RawMetadata<'a> {
    pub value: Option<&'a Value>,
    pub value_type: Option<&'a Value>,
    pub format: Option<&'a Value>,
    pub unit: Option<&'a Value>,
    pub purpose: Option<&'a Value>,
    pub has_values: bool,
}

impl ValueMetadata {
    /// Lift raw metadata into `iot:*` keys
    ///
    /// Attribute-like objects (under `value`, `type`, `format` or `unit`)
    /// contribute their scalar or array `iot:*` members, later sources
    /// overriding earlier ones. Scalar `type`/`format`/`unit`/`purpose`
    /// override anything lifted from objects. Without a type the recipe is
    /// `iot:type.string` when it enumerates values, `iot:type.null` otherwise.
    pub fn lift(raw: RawMetadata<'_>) -> Self {
        let mut lifted = Map::new();
        let mut direct: [Option<Value>; 3] = [None, None, None];

        let sources = [
            (None, raw.value),
            (Some(0), raw.value_type),
            (Some(1), raw.format),
            (Some(2), raw.unit),
        ];
        for (slot, source) in sources {
            let Some(source) = source else { continue };
            match compact_value(source) {
                Value::Object(members) => {
                    for key in [IOT_TYPE, IOT_FORMAT, IOT_UNIT, IOT_PURPOSE] {
                        if let Some(v) = members.get(key) {
                            if v.is_array() || !(v.is_object() || v.is_null()) {
                                lifted.insert(key.to_string(), v.clone());
                            }
                        }
                    }
                }
                Value::Null => {}
                scalar => {
                    if let Some(slot) = slot {
                        direct[slot] = Some(scalar);
                    }
                }
            }
        }

        let [direct_type, direct_format, direct_unit] = direct;
        let purpose = raw
            .purpose
            .filter(|v| !v.is_null())
            .map(compact_value)
            .or_else(|| lifted.remove(IOT_PURPOSE));

        let iot_type = direct_type
            .or_else(|| lifted.remove(IOT_TYPE))
            .unwrap_or_else(|| {
                if raw.has_values {
                    Value::String("iot:type.string".to_string())
                } else {
                    Value::String("iot:type.null".to_string())
                }
            });

        Self {
            iot_type,
            iot_format: direct_format.or_else(|| lifted.remove(IOT_FORMAT)),
            iot_unit: direct_unit.or_else(|| lifted.remove(IOT_UNIT)),
            iot_purpose: purpose,
        }
    }
}
