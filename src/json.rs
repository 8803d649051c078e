//! Conversion between `serde_json` values and binary documents.
//!
//! JSON is the fixture and report format of the benchmark harness; documents
//! only ever reach or leave the process as JSON text. Integer JSON numbers
//! land in the narrowest integer element that fits, all other numbers become
//! doubles. Datetime and binary elements have no JSON source form and are
//! emitted in an extended notation (`{"$date": ...}`, `{"$binary": ...}`) on
//! the way out.

use std::fmt::Write as _;

use serde_json::{Map, Number, json};

use crate::builder::basic::{self, ArrayWriter, DocumentWriter};
use crate::document::{ArrayView, Document, DocumentView};
use crate::err::{Error, Result};
use crate::value::Value;

/// Encodes a JSON object into an owned document.
pub fn document_from_json(value: &serde_json::Value) -> Result<Document> {
    let map = value.as_object().ok_or_else(|| Error::InvalidFixture {
        value: value.to_string(),
        reason: "top-level JSON value must be an object".to_owned(),
    })?;
    basic::document(|d| write_object(d, map))
}

fn write_object(writer: &mut DocumentWriter<'_>, map: &Map<String, serde_json::Value>) -> Result<()> {
    for (key, value) in map {
        write_member(writer, key, value)?;
    }
    Ok(())
}

fn write_member(
    writer: &mut DocumentWriter<'_>,
    key: &str,
    value: &serde_json::Value,
) -> Result<()> {
    match value {
        serde_json::Value::Null => writer.append_null(key),
        serde_json::Value::Bool(b) => writer.append(key, *b),
        serde_json::Value::Number(n) => match narrow_number(n) {
            Narrowed::Int32(i) => writer.append(key, i),
            Narrowed::Int64(i) => writer.append(key, i),
            Narrowed::Double(d) => writer.append(key, d),
        },
        serde_json::Value::String(s) => writer.append(key, s.as_str()),
        serde_json::Value::Array(items) => {
            writer.append_array(key, |a| write_items(a, items))
        }
        serde_json::Value::Object(map) => {
            writer.append_document(key, |d| write_object(d, map))
        }
    }
}

fn write_items(writer: &mut ArrayWriter<'_>, items: &[serde_json::Value]) -> Result<()> {
    for item in items {
        match item {
            serde_json::Value::Null => writer.push_null()?,
            serde_json::Value::Bool(b) => writer.push(*b)?,
            serde_json::Value::Number(n) => match narrow_number(n) {
                Narrowed::Int32(i) => writer.push(i)?,
                Narrowed::Int64(i) => writer.push(i)?,
                Narrowed::Double(d) => writer.push(d)?,
            },
            serde_json::Value::String(s) => writer.push(s.as_str())?,
            serde_json::Value::Array(inner) => writer.push_array(|a| write_items(a, inner))?,
            serde_json::Value::Object(map) => writer.push_document(|d| write_object(d, map))?,
        }
    }
    Ok(())
}

enum Narrowed {
    Int32(i32),
    Int64(i64),
    Double(f64),
}

fn narrow_number(n: &Number) -> Narrowed {
    if let Some(i) = n.as_i64() {
        if let Ok(small) = i32::try_from(i) {
            Narrowed::Int32(small)
        } else {
            Narrowed::Int64(i)
        }
    } else {
        Narrowed::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Decodes a document view back into a JSON object, preserving element order.
pub fn document_to_json(view: DocumentView<'_>) -> Result<serde_json::Value> {
    let mut map = Map::new();
    for element in view.iter() {
        let (key, value) = element?;
        map.insert(key.to_owned(), value_to_json(value)?);
    }
    Ok(serde_json::Value::Object(map))
}

fn array_to_json(view: ArrayView<'_>) -> Result<serde_json::Value> {
    let mut items = Vec::new();
    for value in view.values() {
        items.push(value_to_json(value?)?);
    }
    Ok(serde_json::Value::Array(items))
}

fn value_to_json(value: Value<'_>) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Double(d) => json!(d),
        Value::String(s) => json!(s),
        Value::Document(d) => document_to_json(d)?,
        Value::Array(a) => array_to_json(a)?,
        Value::Binary { subtype, bytes } => {
            let mut hex = String::with_capacity(bytes.len() * 2);
            for b in bytes {
                // Writing to a String cannot fail.
                let _ = write!(hex, "{b:02x}");
            }
            json!({ "$binary": { "hex": hex, "subtype": subtype } })
        }
        Value::Bool(b) => json!(b),
        Value::DateTime(millis) => json!({ "$date": millis }),
        Value::Null => serde_json::Value::Null,
        Value::Int32(i) => json!(i),
        Value::Int64(i) => json!(i),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_round_trip() {
        let source = json!({
            "name": "tweet",
            "retweets": 12,
            "big": 9_000_000_000i64,
            "score": 0.5,
            "active": true,
            "missing": null,
            "nested": { "deep": ["a", 1, { "b": [] }] },
        });

        let doc = document_from_json(&source).unwrap();
        crate::document::validate_document(doc.as_bytes()).unwrap();

        let back = document_to_json(doc.as_view()).unwrap();
        assert_eq!(back, source);
    }

    #[test]
    fn test_integers_narrow_by_range() {
        let doc = document_from_json(&json!({ "small": 1, "large": i64::MAX })).unwrap();
        assert_eq!(doc.as_view().get("small"), Some(Value::Int32(1)));
        assert_eq!(doc.as_view().get("large"), Some(Value::Int64(i64::MAX)));
    }

    #[test]
    fn test_top_level_must_be_object() {
        assert!(matches!(
            document_from_json(&json!([1, 2, 3])),
            Err(Error::InvalidFixture { .. })
        ));
    }

    #[test]
    fn test_empty_nested_containers_round_trip() {
        let source = json!({ "doc": {}, "arr": [] });
        let doc = document_from_json(&source).unwrap();
        let back = document_to_json(doc.as_view()).unwrap();
        assert_eq!(back, source);
    }
}
