use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use crate::domain::GridError;

/// The shapes a record field may take. Strings and lists of strings are
/// the documented shapes; everything else the document contains is kept
/// as `Other` so the filter boundary can detect and report it instead of
/// this module guessing a coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Other(Value),
}

impl FieldValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => {
                let mut texts = Vec::with_capacity(items.len());
                for item in &items {
                    match item {
                        Value::String(s) => texts.push(s.clone()),
                        _ => return FieldValue::Other(Value::Array(items)),
                    }
                }
                FieldValue::List(texts)
            }
            other => FieldValue::Other(other),
        }
    }

    /// Coerce to a plain display string: lists join with a comma (the way
    /// the browser host stringified arrays), null becomes empty.
    pub fn raw_display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items.join(","),
            FieldValue::Other(Value::Null) => String::new(),
            FieldValue::Other(value) => value.to_string(),
        }
    }
}

/// One row of source data: an open field name to value mapping. Records
/// are immutable once loaded; nothing in this crate edits them in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Display string for a field, empty if the field is absent.
    pub fn raw(&self, field: &str) -> String {
        self.get(field).map(FieldValue::raw_display).unwrap_or_default()
    }

    fn from_object(object: serde_json::Map<String, Value>) -> Self {
        let fields = object
            .into_iter()
            .map(|(name, value)| (name, FieldValue::from_json(value)))
            .collect();
        Record { fields }
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, FieldValue)]) -> Self {
        let fields = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Record { fields }
    }
}

/// Load the full record set from a json document holding an array of flat
/// objects. This is the one-shot load boundary: it either returns the
/// complete set or an error, never a partial result.
pub fn load_records(path: &Path) -> Result<Vec<Record>, GridError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GridError::FileNotFound,
        ErrorKind::PermissionDenied => GridError::PermissionDenied,
        _ => GridError::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(GridError::InvalidData("not a file".into()));
    }

    let start_time = Instant::now();
    let text = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&text)?;

    let Value::Array(entries) = document else {
        return Err(GridError::InvalidData(
            "document root is not an array".into(),
        ));
    };

    let mut records = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        match entry {
            Value::Object(object) => records.push(Record::from_object(object)),
            _ => {
                return Err(GridError::InvalidData(format!(
                    "record {idx} is not an object"
                )));
            }
        }
    }

    let load_duration = start_time.elapsed().as_millis();
    info!("Loaded {} records in {load_duration}ms", records.len());
    debug!("Source file: {}, {} bytes", path.display(), metadata.len());

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from("tests/fixtures").join(name)
    }

    #[test]
    fn test_field_value_shapes() {
        assert_eq!(
            FieldValue::from_json(json!("Incident")),
            FieldValue::Text("Incident".to_string())
        );
        assert_eq!(
            FieldValue::from_json(json!(["North", "South"])),
            FieldValue::List(vec!["North".to_string(), "South".to_string()])
        );
        assert_eq!(FieldValue::from_json(json!(7)), FieldValue::Other(json!(7)));
        assert_eq!(
            FieldValue::from_json(json!(null)),
            FieldValue::Other(Value::Null)
        );
        // A single non-string element makes the whole array an undocumented shape.
        assert_eq!(
            FieldValue::from_json(json!(["North", 2])),
            FieldValue::Other(json!(["North", 2]))
        );
    }

    #[test]
    fn test_raw_display_coercion() {
        assert_eq!(FieldValue::Text("abc".into()).raw_display(), "abc");
        assert_eq!(
            FieldValue::List(vec!["North".into(), "South".into()]).raw_display(),
            "North,South"
        );
        assert_eq!(FieldValue::Other(Value::Null).raw_display(), "");
        assert_eq!(FieldValue::Other(json!(42)).raw_display(), "42");
        assert_eq!(FieldValue::Other(json!(true)).raw_display(), "true");
    }

    #[test]
    fn test_record_raw_absent_field() {
        let record = Record::from_pairs(&[("a", FieldValue::Text("x".into()))]);
        assert_eq!(record.raw("a"), "x");
        assert_eq!(record.raw("missing"), "");
    }

    #[test]
    fn test_load_fixture() {
        let records = load_records(&fixture("events.json")).unwrap();
        assert_eq!(records.len(), 8);
        assert_eq!(
            records[0].get("eventType"),
            Some(&FieldValue::Text("Incident".to_string()))
        );
        assert_eq!(
            records[0].get("district"),
            Some(&FieldValue::List(vec!["Lower Mainland".to_string()]))
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_records(&fixture("no_such_file.json")).unwrap_err();
        assert!(matches!(err, GridError::FileNotFound));
    }

    #[test]
    fn test_load_rejects_non_array_root() {
        let err = load_records(&fixture("not_an_array.json")).unwrap_err();
        assert!(matches!(err, GridError::InvalidData(_)));
    }

    #[test]
    fn test_load_rejects_non_object_entry() {
        let err = load_records(&fixture("bad_entry.json")).unwrap_err();
        match err {
            GridError::InvalidData(msg) => assert!(msg.contains("record 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_broken_json() {
        let err = load_records(&fixture("broken.json")).unwrap_err();
        assert!(matches!(err, GridError::Json(_)));
    }
}
