//! Multi-format table readers used by ingestion.
//!
//! Every reader produces a [`Table`]: ordered column names plus rows of JSON
//! scalars. Text cells are typed on a best-effort basis (integers, floats and
//! booleans are recognised, empty cells become `null`).

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, AsArray};
use arrow::datatypes::DataType;
use calamine::{Data, Reader, open_workbook_auto};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::error::{RagError, Result};

/// An in-memory table with a fixed column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` in [`columns`](Table::columns).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append the rows of `other`, which must have the same columns.
    fn extend(&mut self, other: Table) {
        self.rows.extend(other.rows);
    }

    fn from_string_rows(columns: Vec<String>, rows: impl IntoIterator<Item = Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut cells: Vec<Value> = row.iter().map(|cell| infer_cell(cell)).collect();
                cells.resize(width, Value::Null);
                cells
            })
            .collect();
        Self { columns, rows }
    }
}

/// Supported input formats, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Spreadsheet,
    Html,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "ods" => Ok(Self::Spreadsheet),
            "html" | "htm" => Ok(Self::Html),
            "parquet" => Ok(Self::Parquet),
            _ => Err(RagError::InvalidInput(format!(
                "unsupported file extension for file: {}",
                path.display()
            ))),
        }
    }
}

/// Read a single file into a [`Table`].
pub fn read_table(path: &Path) -> Result<Table> {
    let table = match TableFormat::from_path(path)? {
        TableFormat::Csv => read_csv(path)?,
        TableFormat::Spreadsheet => read_spreadsheet(path)?,
        TableFormat::Html => read_html(path)?,
        TableFormat::Parquet => read_parquet(path)?,
    };
    debug!(path = %path.display(), rows = table.len(), columns = table.columns.len(), "read table");
    Ok(table)
}

/// Read every file and concatenate the rows in the order given.
///
/// # Errors
///
/// - [`RagError::InvalidInput`] for an empty list or an unsupported extension
/// - [`RagError::SchemaMismatch`] when column names differ from the first file
/// - [`RagError::TableError`] / [`RagError::Io`] when a file cannot be parsed
pub fn read_and_concatenate<P: AsRef<Path>>(paths: &[P]) -> Result<Table> {
    let Some((first, rest)) = paths.split_first() else {
        return Err(RagError::InvalidInput("at least one input file is required".into()));
    };

    // Reject unknown extensions before parsing anything.
    for path in paths {
        TableFormat::from_path(path.as_ref())?;
    }

    let mut combined = read_table(first.as_ref())?;
    for path in rest {
        let path = path.as_ref();
        let table = read_table(path)?;
        if table.columns != combined.columns {
            return Err(RagError::SchemaMismatch(format!(
                "'{}' has columns {:?}, expected {:?}",
                path.display(),
                table.columns,
                combined.columns
            )));
        }
        combined.extend(table);
    }
    Ok(combined)
}

/// Type a raw text cell.
pub fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| RagError::table(path, e.to_string()))?;
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| RagError::table(path, e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RagError::table(path, e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table::from_string_rows(columns, rows))
}

fn read_spreadsheet(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| RagError::table(path, e.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| RagError::table(path, "workbook has no worksheets"))?;
    let range = workbook.worksheet_range(&sheet).map_err(|e| RagError::table(path, e.to_string()))?;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => return Ok(Table::default()),
    };
    let width = columns.len();
    let rows = rows
        .map(|row| {
            let mut cells: Vec<Value> = row.iter().map(spreadsheet_cell).collect();
            cells.resize(width, Value::Null);
            cells
        })
        .collect();
    Ok(Table { columns, rows })
}

fn spreadsheet_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::from(*f as i64),
        Data::Float(f) => Value::from(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn read_html(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
    let document = Html::parse_document(&text);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| RagError::table(path, "no <table> element found"))?;

    let mut rows = table.select(&row_sel).map(|tr| {
        tr.select(&cell_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect::<Vec<_>>()
    });
    let columns = rows.next().ok_or_else(|| RagError::table(path, "table has no rows"))?;
    let body: Vec<Vec<String>> = rows.filter(|row| !row.is_empty()).collect();
    Ok(Table::from_string_rows(columns, body))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| RagError::InvalidInput(format!("bad selector '{css}': {e:?}")))
}

fn read_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|e| RagError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| RagError::table(path, e.to_string()))?;
    let columns: Vec<String> =
        builder.schema().fields().iter().map(|field| field.name().clone()).collect();
    let reader = builder.build().map_err(|e| RagError::table(path, e.to_string()))?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| RagError::table(path, e.to_string()))?;
        let start = rows.len();
        rows.extend((0..batch.num_rows()).map(|_| Vec::with_capacity(columns.len())));

        for column in batch.columns() {
            let as_text = arrow::compute::cast(column, &DataType::Utf8)
                .map_err(|e| RagError::table(path, e.to_string()))?;
            let strings = as_text.as_string::<i32>();
            for i in 0..strings.len() {
                let cell = if strings.is_null(i) { Value::Null } else { infer_cell(strings.value(i)) };
                rows[start + i].push(cell);
            }
        }
    }
    Ok(Table { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn write_parquet(dir: &TempDir, name: &str, columns: Vec<(&str, ArrayRef)>) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let batch = RecordBatch::try_from_iter(columns).unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        path
    }

    #[test]
    fn concatenates_same_column_files_in_order() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.csv", "body,title\nParis is in France,France\nBerlin,Germany\n");
        let b = write(&dir, "b.csv", "body,title\nMadrid,Spain\n");

        let table = read_and_concatenate(&[a, b]).unwrap();
        assert_eq!(table.columns, vec!["body", "title"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[2][1], json!("Spain"));
    }

    #[test]
    fn differing_columns_are_a_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.csv", "body,title\nx,y\n");
        let b = write(&dir, "b.csv", "title,body\ny,x\n");
        let err = read_and_concatenate(&[a, b]).unwrap_err();
        assert!(matches!(err, RagError::SchemaMismatch(_)));
    }

    #[test]
    fn unknown_extension_is_rejected_before_reading() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.csv", "body\nx\n");
        let err = read_and_concatenate(&[a, dir.path().join("missing.txt")]).unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[test]
    fn empty_path_list_is_invalid() {
        let paths: [&Path; 0] = [];
        assert!(matches!(read_and_concatenate(&paths), Err(RagError::InvalidInput(_))));
    }

    #[test]
    fn html_reads_first_table_with_header_row() {
        let dir = TempDir::new().unwrap();
        let page = write(
            &dir,
            "page.html",
            "<html><body><table><tr><th>body</th><th>rank</th></tr>\
             <tr><td>Rome</td><td>3</td></tr></table>\
             <table><tr><th>other</th></tr></table></body></html>",
        );
        let table = read_table(&page).unwrap();
        assert_eq!(table.columns, vec!["body", "rank"]);
        assert_eq!(table.rows, vec![vec![json!("Rome"), json!(3)]]);
    }

    #[test]
    fn short_csv_rows_are_padded_with_null() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.csv", "body,title,year\nx,y\n");
        let table = read_table(&a).unwrap();
        assert_eq!(table.rows[0], vec![json!("x"), json!("y"), Value::Null]);
    }

    #[test]
    fn parquet_columns_and_cells_are_read_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_parquet(
            &dir,
            "capitals.parquet",
            vec![
                ("body", Arc::new(StringArray::from(vec![Some("Paris is in France"), None])) as ArrayRef),
                ("year", Arc::new(Int64Array::from(vec![Some(2020), None])) as ArrayRef),
                ("title", Arc::new(StringArray::from(vec!["France", "Germany"])) as ArrayRef),
            ],
        );

        let table = read_table(&path).unwrap();
        assert_eq!(table.columns, vec!["body", "year", "title"]);
        assert_eq!(table.rows[0], vec![json!("Paris is in France"), json!(2020), json!("France")]);
        assert_eq!(table.rows[1], vec![Value::Null, Value::Null, json!("Germany")]);
    }

    #[test]
    fn csv_and_parquet_with_different_columns_are_a_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        let csv = write(&dir, "a.csv", "body,title
Paris,France
");
        let parquet = write_parquet(
            &dir,
            "b.parquet",
            vec![
                ("body", Arc::new(StringArray::from(vec!["Berlin"])) as ArrayRef),
                ("year", Arc::new(Int64Array::from(vec![2021])) as ArrayRef),
            ],
        );
        let err = read_and_concatenate(&[csv, parquet]).unwrap_err();
        assert!(matches!(err, RagError::SchemaMismatch(_)));
    }

    #[test]
    fn csv_and_parquet_with_same_columns_concatenate() {
        let dir = TempDir::new().unwrap();
        let csv = write(&dir, "a.csv", "body,title
Paris,France
");
        let parquet = write_parquet(
            &dir,
            "b.parquet",
            vec![
                ("body", Arc::new(StringArray::from(vec!["Berlin"])) as ArrayRef),
                ("title", Arc::new(StringArray::from(vec!["Germany"])) as ArrayRef),
            ],
        );
        let table = read_and_concatenate(&[csv, parquet]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], vec![json!("Berlin"), json!("Germany")]);
    }

    #[test]
    fn corrupt_workbook_is_a_table_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.xlsx", "this is not a zip archive");
        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, RagError::TableError { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn cells_are_typed() {
        assert_eq!(infer_cell(""), Value::Null);
        assert_eq!(infer_cell("42"), json!(42));
        assert_eq!(infer_cell("2.5"), json!(2.5));
        assert_eq!(infer_cell("True"), json!(true));
        assert_eq!(infer_cell("NaN"), json!("NaN"));
        assert_eq!(infer_cell("Paris"), json!("Paris"));
    }
}
