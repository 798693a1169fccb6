//! Band projections of a recipe
//!
//! Each projection is the JSON view a transport band exposes. Projections
//! include `@id`; the transport strips internal fields before answering.

use crate::recipe::vocab::namespace_context;
use crate::recipe::Recipe;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn band_url(recipe: &Recipe, band: &str) -> String {
    format!("/api/recipes/{}/{}", recipe.id(), band)
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Input state: recipe state merged over defaults, timestamped at the last
/// modification. `value` is always null.
pub fn istate(recipe: &Arc<Recipe>) -> Map<String, Value> {
    let snapshot = recipe.context().snapshot();

    let mut d = Map::new();
    d.insert("value".to_string(), Value::Null);
    d.insert("@id".to_string(), Value::String(band_url(recipe, "istate")));
    for (key, value) in recipe.state() {
        d.insert(key.clone(), value.clone());
    }
    d.insert(
        "@timestamp".to_string(),
        Value::String(snapshot.modified_timestamp.to_string()),
    );
    d.insert("value".to_string(), Value::Null);

    if let Some(text) = snapshot.status.text.filter(|t| !t.is_empty()) {
        d.insert("text".to_string(), Value::String(text));
    }
    if let Some(message) = snapshot.status.message.filter(|m| !m.is_empty()) {
        d.insert("message".to_string(), Value::String(message));
    }

    d
}

/// Output state: timestamped at the last execution, `running` only while running
pub fn ostate(recipe: &Arc<Recipe>) -> Map<String, Value> {
    let snapshot = recipe.context().snapshot();

    let mut d = into_map(json!({
        "value": null,
        "@timestamp": snapshot.execute_timestamp,
        "@id": band_url(recipe, "ostate"),
    }));
    if snapshot.status.running {
        d.insert("running".to_string(), Value::Bool(true));
    }
    d
}

/// Full status
pub fn status(recipe: &Arc<Recipe>) -> Map<String, Value> {
    let status = recipe.context().status();

    let mut d = serde_json::to_value(&status)
        .map(into_map)
        .unwrap_or_default();
    d.insert("@id".to_string(), Value::String(band_url(recipe, "status")));
    d
}

/// Static model: one controllable value plus read-only message, text and running
pub fn model(recipe: &Arc<Recipe>) -> Map<String, Value> {
    let context = recipe.context();
    let metadata = recipe.metadata();

    let mut value_attribute = into_map(json!({
        "@type": "iot:Attribute",
        "@id": "#value",
        "iot:purpose": metadata.iot_purpose.clone().unwrap_or_else(|| json!("iot-purpose:value")),
        "schema:name": "value",
        "iot:type": metadata.iot_type.clone(),
        "iot:write": true,
        "iot:read": true,
        "iot:role": ["iot-purpose:role-control", "iot-purpose:role-reading"],
    }));
    if let Some(format) = &metadata.iot_format {
        value_attribute.insert("iot:format".to_string(), format.clone());
    }
    if let Some(unit) = &metadata.iot_unit {
        value_attribute.insert("iot:unit".to_string(), unit.clone());
    }
    if let Some(values) = recipe.values() {
        value_attribute.insert("iot:format.enumeration".to_string(), json!(values));
    }

    into_map(json!({
        "@context": namespace_context(),
        "@id": band_url(recipe, "model"),
        "@type": ["iot:Model", "iot:Recipe"],
        "@timestamp": context.created_timestamp(),
        "schema:name": recipe.name(),
        "iot:attribute": [
            Value::Object(value_attribute),
            {
                "@type": "iot:Attribute",
                "@id": "#message",
                "iot:purpose": "iot-purpose:message.html",
                "schema:name": "message",
                "iot:type": "iot:type.string",
                "iot:read": true,
                "iot:role": ["iot-purpose:role-reading"],
            },
            {
                "@type": "iot:Attribute",
                "@id": "#text",
                "iot:purpose": "iot-purpose:message.text",
                "schema:name": "text",
                "iot:type": "iot:type.string",
                "iot:read": true,
                "iot:role": ["iot-purpose:role-reading"],
            },
            {
                "@type": "iot:Attribute",
                "@id": "#running",
                "iot:purpose": "iot-purpose:sensor.running",
                "schema:name": "running",
                "iot:type": "iot:type.boolean",
                "iot:read": true,
                "iot:role": ["iot-purpose:role-reading"],
            },
        ],
    }))
}

/// Descriptive metadata
pub fn meta(recipe: &Arc<Recipe>) -> Map<String, Value> {
    let context = recipe.context();

    let mut d = into_map(json!({
        "@timestamp": context.created_timestamp(),
        "iot:thing-id": context.id(),
        "iot:cookbook": recipe.group(),
        "schema:name": recipe.name(),
    }));
    if let Some(cookbook_id) = recipe.cookbook_id() {
        d.insert(
            "iot:device-id".to_string(),
            Value::String(format!("urn:iotdb:cookbook:{}", cookbook_id)),
        );
    }
    d
}
