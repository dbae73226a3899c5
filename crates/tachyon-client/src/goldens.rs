//! Golden import parsing/validation and export.

use serde::Serialize;
use serde_json::Value as JsonValue;

use tachyon_core::{Error, Golden, NewGolden, Result};

/// Parse the contents of a golden import file.
///
/// The document must be a JSON array of objects carrying non-empty string
/// `input` and `expectedOutput`. Optional fields fall back to their
/// defaults. The first offending item is reported by index and field.
pub fn parse_golden_import(text: &str) -> Result<Vec<NewGolden>> {
    let document: JsonValue = serde_json::from_str(text)
        .map_err(|e| Error::InvalidInput(format!("import file is not valid JSON: {}", e)))?;

    let items = document.as_array().ok_or_else(|| {
        Error::InvalidInput("File must contain an array of goldens".to_string())
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_item(index, item))
        .collect()
}

fn parse_item(index: usize, item: &JsonValue) -> Result<NewGolden> {
    let object = item.as_object().ok_or_else(|| {
        Error::InvalidInput(format!("golden #{} is not an object", index))
    })?;

    let required = |field: &str| -> Result<String> {
        match object.get(field).and_then(JsonValue::as_str) {
            Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
            _ => Err(missing(index, field)),
        }
    };
    let text = |field: &str| -> String {
        object
            .get(field)
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let input = required("input")?;
    let expected_output = required("expectedOutput")?;

    let tags = object
        .get("tags")
        .and_then(JsonValue::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(NewGolden {
        input,
        expected_output,
        actual_output: object
            .get("actualOutput")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        context: text("context"),
        retrieval_context: text("retrievalContext"),
        count: object
            .get("count")
            .and_then(JsonValue::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0),
        tags,
    })
}

fn missing(index: usize, field: &str) -> Error {
    Error::InvalidInput(format!(
        "golden #{} is missing required field '{}'",
        index, field
    ))
}

/// Check already-typed goldens, reporting the first one lacking a required
/// field.
pub fn validate_new_goldens(goldens: &[NewGolden]) -> Result<()> {
    for (index, golden) in goldens.iter().enumerate() {
        if let Some(field) = golden.missing_field() {
            return Err(missing(index, field));
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedGolden<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_output: Option<&'a str>,
    expected_output: &'a str,
    context: &'a str,
    retrieval_context: &'a str,
}

/// Render goldens as a pretty JSON array suitable for re-import.
pub fn export_goldens(goldens: &[Golden]) -> Result<String> {
    let rows: Vec<ExportedGolden<'_>> = goldens
        .iter()
        .map(|g| ExportedGolden {
            input: &g.input,
            actual_output: g.actual_output.as_deref(),
            expected_output: &g.expected_output,
            context: &g.context,
            retrieval_context: &g.retrieval_context,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}
