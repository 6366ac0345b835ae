//! CSV table transform: uppercase text columns, split off rows with a non-null filter column.

use csv::{ReaderBuilder, WriterBuilder};
use serde_json::{Map, Value};

use sheetflow_core::config::TransformConfig;
use sheetflow_core::SheetflowError;

/// Cell values read as missing, in addition to the empty string.
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const BOOL_LITERALS: &[&str] = &["True", "False", "true", "false", "TRUE", "FALSE"];

fn is_na(raw: &str) -> bool {
    raw.is_empty() || NA_TOKENS.contains(&raw)
}

/// A parsed CSV: header row plus rows of nullable cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Parse CSV bytes with a mandatory header row.
    ///
    /// Every record must have as many fields as the header.
    pub fn parse(bytes: &[u8]) -> Result<Self, SheetflowError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| SheetflowError::Transform(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(SheetflowError::Transform("no columns to parse".into()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| SheetflowError::Transform(e.to_string()))?;
            rows.push(
                record
                    .iter()
                    .map(|cell| if is_na(cell) { None } else { Some(cell.to_string()) })
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// A column is textual when some non-null cell is neither numeric nor boolean.
    pub fn is_text_column(&self, idx: usize) -> bool {
        self.rows.iter().filter_map(|row| row[idx].as_deref()).any(|cell| {
            cell.trim().parse::<f64>().is_err() && !BOOL_LITERALS.contains(&cell.trim())
        })
    }

    /// Copy of the table with every non-null cell of textual columns uppercased.
    pub fn uppercase_text_columns(&self) -> Table {
        let text_cols: Vec<bool> = (0..self.headers.len())
            .map(|idx| self.is_text_column(idx))
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&text_cols)
                    .map(|(cell, &is_text)| match cell {
                        Some(v) if is_text => Some(v.to_uppercase()),
                        other => other.clone(),
                    })
                    .collect()
            })
            .collect();

        Table {
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Rows whose `column` (first column when `None`) is non-null.
    pub fn select_non_null(&self, column: Option<&str>) -> Result<Table, SheetflowError> {
        let idx = match column {
            Some(name) => self.column_index(name).ok_or_else(|| {
                SheetflowError::Transform(format!("filter column '{}' not found", name))
            })?,
            None => 0,
        };

        Ok(Table {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| row[idx].is_some())
                .cloned()
                .collect(),
        })
    }

    /// Serialize back to CSV; nulls become empty fields.
    pub fn to_csv(&self) -> Result<Vec<u8>, SheetflowError> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer
            .write_record(&self.headers)
            .map_err(|e| SheetflowError::Transform(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
                .map_err(|e| SheetflowError::Transform(e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| SheetflowError::Transform(e.to_string()))
    }
}

/// Both derived tables, serialized and ready to publish.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub processed: Vec<u8>,
    pub selected: Vec<u8>,
    pub row_count: usize,
    pub selected_count: usize,
}

/// Run the full transform over raw CSV bytes.
pub fn transform(bytes: &[u8], config: &TransformConfig) -> Result<TransformOutput, SheetflowError> {
    let table = Table::parse(bytes)?;
    let processed = table.uppercase_text_columns();
    let selected = processed.select_non_null(config.filter_column.as_deref())?;

    Ok(TransformOutput {
        processed: processed.to_csv()?,
        selected: selected.to_csv()?,
        row_count: processed.rows.len(),
        selected_count: selected.rows.len(),
    })
}

/// Uppercase the string values of a flat JSON object; other values pass through.
pub fn uppercase_record(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn csv(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn name_age_example() {
        let out = transform(&csv("name,age\nana,30\nbob,\n"), &TransformConfig::default()).unwrap();
        assert_eq!(String::from_utf8(out.processed).unwrap(), "name,age\nANA,30\nBOB,\n");
        // `name` is never null, so both rows are selected.
        assert_eq!(String::from_utf8(out.selected).unwrap(), "name,age\nANA,30\nBOB,\n");
        assert_eq!(out.row_count, 2);
        assert_eq!(out.selected_count, 2);
    }

    #[test]
    fn first_column_nulls_are_filtered_out() {
        let out = transform(&csv("id,city\n1,paris\n,berlin\nNaN,rome\n3,\n"), &TransformConfig::default())
            .unwrap();
        assert_eq!(String::from_utf8(out.processed).unwrap(), "id,city\n1,PARIS\n,BERLIN\n,ROME\n3,\n");
        assert_eq!(String::from_utf8(out.selected).unwrap(), "id,city\n1,PARIS\n3,\n");
    }

    #[test]
    fn configured_filter_column() {
        let config = TransformConfig {
            filter_column: Some("age".into()),
        };
        let out = transform(&csv("name,age\nana,30\nbob,\n"), &config).unwrap();
        assert_eq!(String::from_utf8(out.selected).unwrap(), "name,age\nANA,30\n");
    }

    #[test]
    fn unknown_filter_column_is_a_transform_error() {
        let config = TransformConfig {
            filter_column: Some("missing".into()),
        };
        let err = transform(&csv("name,age\nana,30\n"), &config).unwrap_err();
        assert!(matches!(err, SheetflowError::Transform(_)));
    }

    #[test]
    fn numeric_and_boolean_columns_are_untouched() {
        let table = Table::parse(&csv("score,flag,code\n1e3,true,ab1\n2.5,False,7\n")).unwrap();
        assert!(!table.is_text_column(0));
        assert!(!table.is_text_column(1));
        assert!(table.is_text_column(2));

        let upper = table.uppercase_text_columns();
        assert_eq!(upper.rows[0], vec![Some("1e3".into()), Some("true".into()), Some("AB1".into())]);
        assert_eq!(upper.rows[1], vec![Some("2.5".into()), Some("False".into()), Some("7".into())]);
    }

    #[test]
    fn quoted_fields_survive_roundtrip() {
        let out = transform(&csv("name,note\n\"smith, j\",\"said \"\"hi\"\"\"\n"), &TransformConfig::default())
            .unwrap();
        assert_eq!(
            String::from_utf8(out.processed).unwrap(),
            "name,note\n\"SMITH, J\",\"SAID \"\"HI\"\"\"\n"
        );
    }

    #[test]
    fn bom_is_ignored() {
        let table = Table::parse(b"\xEF\xBB\xBFname\nana\n").unwrap();
        assert_eq!(table.headers, vec!["name".to_string()]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Table::parse(&csv("a,b\n1,2\n3\n")).unwrap_err();
        assert!(matches!(err, SheetflowError::Transform(_)));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(Table::parse(b""), Err(SheetflowError::Transform(_))));
    }

    #[test]
    fn header_only_table_is_valid() {
        let out = transform(&csv("name,age\n"), &TransformConfig::default()).unwrap();
        assert_eq!(out.row_count, 0);
        assert_eq!(String::from_utf8(out.processed).unwrap(), "name,age\n");
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = Table::parse(b"name\n\xff\xfe\n").unwrap_err();
        assert!(matches!(err, SheetflowError::Transform(_)));
    }

    #[test]
    fn uppercase_record_only_touches_strings() {
        let data = json!({ "name": "ana", "age": 30, "tags": ["x"], "nick": null });
        let out = uppercase_record(data.as_object().unwrap());
        assert_eq!(
            Value::Object(out),
            json!({ "name": "ANA", "age": 30, "tags": ["x"], "nick": null })
        );
    }
}
