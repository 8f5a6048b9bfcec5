//! Turning table rows into passages.

use serde_json::Value;

use crate::document::{Metadata, Passage};
use crate::error::{RagError, Result};
use crate::tabular::Table;

/// Build one [`Passage`] per row: `text_field` becomes the document and each
/// of `metadata_fields` is copied into the metadata.
///
/// A `null` text cell yields an empty document; non-string text cells are
/// rendered as JSON.
///
/// # Errors
///
/// Returns [`RagError::InvalidInput`] if `text_field` or any metadata field
/// is not a column of `table`.
pub fn passages_from_table(
    table: &Table,
    text_field: &str,
    metadata_fields: &[String],
) -> Result<Vec<Passage>> {
    let text_idx = table.column_index(text_field).ok_or_else(|| {
        RagError::InvalidInput(format!(
            "text field '{text_field}' is not a column (columns: {:?})",
            table.columns
        ))
    })?;
    let meta_idx = metadata_fields
        .iter()
        .map(|field| {
            table.column_index(field).map(|idx| (field.clone(), idx)).ok_or_else(|| {
                RagError::InvalidInput(format!(
                    "metadata field '{field}' is not a column (columns: {:?})",
                    table.columns
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let passages = table
        .rows
        .iter()
        .map(|row| {
            let document = match row.get(text_idx) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let metadata: Metadata = meta_idx
                .iter()
                .map(|(field, idx)| (field.clone(), row.get(*idx).cloned().unwrap_or(Value::Null)))
                .collect();
            Passage::new(document, metadata)
        })
        .collect();
    Ok(passages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Table {
        Table {
            columns: vec!["body".into(), "title".into(), "year".into()],
            rows: vec![
                vec![json!("Paris is the capital of France."), json!("France"), json!(2020)],
                vec![Value::Null, json!("Empty"), Value::Null],
            ],
        }
    }

    #[test]
    fn builds_one_passage_per_row() {
        let passages = passages_from_table(&table(), "body", &["title".to_string()]).unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].document, "Paris is the capital of France.");
        assert_eq!(passages[0].metadata.len(), 1);
        assert_eq!(passages[0].metadata["title"], json!("France"));
        assert_eq!(passages[1].document, "");
    }

    #[test]
    fn metadata_follows_requested_field_order() {
        let fields = ["year".to_string(), "title".to_string()];
        let passages = passages_from_table(&table(), "body", &fields).unwrap();
        let keys: Vec<&str> = passages[0].metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, ["year", "title"]);
        assert!(passages[0].render().ends_with("'year': '2020', 'title': 'France'"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = passages_from_table(&table(), "text", &[]).unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        let err = passages_from_table(&table(), "body", &["author".to_string()]).unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }
}
