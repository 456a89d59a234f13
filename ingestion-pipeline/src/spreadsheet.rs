use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use common::error::AppError;

/// Column whose values tag documents with a project, when present.
pub const PROJECT_NAME_COLUMN: &str = "project_name";

/// The first worksheet of a workbook: header row split off as column names,
/// remaining rows kept as raw cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

impl SheetData {
    /// Index of the project-name column, if the sheet has one.
    pub fn project_column(&self) -> Option<usize> {
        self.columns.iter().position(|c| c == PROJECT_NAME_COLUMN)
    }

    /// The text handed to the embedder: cell values joined by single spaces.
    pub fn content_string(row: &[Data]) -> String {
        row.iter()
            .map(|cell| cell.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The representation hashed into the cache key.
    ///
    /// This is the debug form of the raw cells, not the joined content
    /// string, so cache keys survive changes to content formatting.
    pub fn raw_repr(row: &[Data]) -> String {
        format!("{row:?}")
    }
}

/// Read the first worksheet of an .xlsx or .xls file.
///
/// The first row is taken as the header; a workbook without any worksheet
/// or an unreadable file is a `Spreadsheet` error.
pub fn read_spreadsheet(path: &Path) -> Result<SheetData, AppError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| AppError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Spreadsheet("workbook contains no worksheets".to_string()))?
        .map_err(|e| AppError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let columns = rows
        .next()
        .map(|header| header.iter().map(|cell| cell.to_string()).collect())
        .unwrap_or_default();
    let rows = rows.map(<[Data]>::to_vec).collect();

    Ok(SheetData { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn reads_header_and_rows_from_fixture() {
        let sheet = read_spreadsheet(&fixture("projects.xlsx")).expect("read fixture");
        assert_eq!(sheet.columns, vec!["project_name", "value"]);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(SheetData::content_string(&sheet.rows[0]), "ProjectX 42");
    }

    #[test]
    fn header_only_sheet_yields_no_rows() {
        let sheet = read_spreadsheet(&fixture("empty.xlsx")).expect("read fixture");
        assert_eq!(sheet.columns, vec!["project_name", "value"]);
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn project_column_lookup_matches_by_name() {
        let sheet = SheetData {
            columns: vec!["region".to_string(), "project_name".to_string()],
            rows: vec![],
        };
        assert_eq!(sheet.project_column(), Some(1));

        let without = SheetData {
            columns: vec!["region".to_string()],
            rows: vec![],
        };
        assert_eq!(without.project_column(), None);
    }

    #[test]
    fn content_string_joins_mixed_cell_types() {
        let row = vec![
            Data::String("ProjectX".to_string()),
            Data::Float(42.0),
            Data::Bool(true),
        ];
        assert_eq!(SheetData::content_string(&row), "ProjectX 42 true");
    }

    #[test]
    fn raw_repr_distinguishes_type_not_just_text() {
        // "42" as text and 42 as a number render the same content string
        // but must not share a cache key.
        let typed = vec![Data::Float(42.0)];
        let text = vec![Data::String("42".to_string())];
        assert_eq!(
            SheetData::content_string(&typed),
            SheetData::content_string(&text)
        );
        assert_ne!(SheetData::raw_repr(&typed), SheetData::raw_repr(&text));
    }

    #[test]
    fn unreadable_file_is_a_spreadsheet_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("garbage.xlsx");
        std::fs::write(&path, b"this is not a zip archive").expect("write garbage");

        let err = read_spreadsheet(&path);
        assert!(matches!(err, Err(AppError::Spreadsheet(_))));
    }
}
