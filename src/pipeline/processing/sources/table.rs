use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{PipelineError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A delimited export with its header resolved to column positions
#[derive(Debug)]
pub struct DelimitedTable {
    source_name: &'static str,
    columns: HashMap<String, usize>,
    rows: Vec<StringRecord>,
    /// Rows the CSV reader could not decode at all
    pub unreadable_rows: usize,
}

impl DelimitedTable {
    /// Parse a delimited export, tolerating a UTF-8 byte-order mark.
    ///
    /// Only an unreadable header is fatal; undecodable rows are skipped and counted.
    pub fn parse(source_name: &'static str, bytes: &[u8], delimiter: u8) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(bytes);

        let headers = reader.headers().map_err(|e| PipelineError::MalformedSource {
            source_name,
            message: format!("unreadable header: {}", e),
        })?;

        let mut columns = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            // first occurrence wins on duplicated header names
            columns.entry(name.to_string()).or_insert(idx);
        }

        let mut rows = Vec::new();
        let mut unreadable_rows = 0;
        for (line, record) in reader.records().enumerate() {
            match record {
                Ok(record) => rows.push(record),
                Err(e) => {
                    warn!(source = source_name, row = line + 1, "Skipping unreadable row: {}", e);
                    unreadable_rows += 1;
                }
            }
        }

        Ok(Self {
            source_name,
            columns,
            rows,
            unreadable_rows,
        })
    }

    /// Fail when any of the named columns is absent from the header
    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        for column in required {
            if !self.columns.contains_key(*column) {
                return Err(PipelineError::MissingColumn {
                    source_name: self.source_name,
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |record| Row {
            record,
            columns: &self.columns,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One data row, addressed by column name
pub struct Row<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl<'a> Row<'a> {
    /// Trimmed cell text; blank cells and short rows read as `None`
    pub fn text(&self, column: &str) -> Option<&'a str> {
        let idx = *self.columns.get(column)?;
        let value = self.record.get(idx)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn owned(&self, column: &str) -> Option<String> {
        self.text(column).map(str::to_string)
    }

    pub fn is_blank(&self) -> bool {
        self.record.iter().all(|cell| cell.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_is_stripped_from_first_header() {
        let bytes = b"\xEF\xBB\xBFid;document\n1;123\n";
        let table = DelimitedTable::parse("crm", bytes, b';').unwrap();
        table.require_columns(&["id", "document"]).unwrap();
        let row = table.rows().next().unwrap();
        assert_eq!(row.text("id"), Some("1"));
    }

    #[test]
    fn test_missing_column_is_structural() {
        let table = DelimitedTable::parse("erp", b"id;seller_name\n1;Ana\n", b';').unwrap();
        let err = table.require_columns(&["id", "order_value"]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn { source_name: "erp", ref column } if column == "order_value"
        ));
    }

    #[test]
    fn test_short_rows_and_blank_cells_read_as_none() {
        let table = DelimitedTable::parse("erp", b"id;a;b\n1;  ;\n2\n", b';').unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("a"), None);
        assert_eq!(rows[1].text("b"), None);
        assert_eq!(rows[1].text("id"), Some("2"));
        assert_eq!(rows[0].text("missing"), None);
    }

    #[test]
    fn test_quoted_delimiters_stay_in_cell() {
        let table = DelimitedTable::parse("crm", b"id;name\n1;\"Silva; Ana\"\n", b';').unwrap();
        assert_eq!(table.rows().next().unwrap().text("name"), Some("Silva; Ana"));
    }

    #[test]
    fn test_blank_row_detection() {
        let table = DelimitedTable::parse("crm", b"id;name\n ; \n1;Ana\n", b';').unwrap();
        let blanks: Vec<bool> = table.rows().map(|r| r.is_blank()).collect();
        assert_eq!(blanks, vec![true, false]);
    }
}
