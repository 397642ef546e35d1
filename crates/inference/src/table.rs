//! CSV tables: the merged base table and the consolidated output.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::InferenceError;

/// File looked up when the merged table path is a directory.
pub const MERGED_TABLE_FILE: &str = "merged_df.csv";

/// Read a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<DataFrame, InferenceError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| InferenceError::Table {
            path: path.to_path_buf(),
            source,
        })
}

/// A directory resolves to the `merged_df.csv` inside it.
pub fn resolve_merged_table(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(MERGED_TABLE_FILE)
    } else {
        path.to_path_buf()
    }
}

/// Load the base table predictions are joined onto.
pub fn load_base_table(path: &Path, drop_index_column: bool) -> Result<DataFrame, InferenceError> {
    let path = resolve_merged_table(path);
    if !path.is_file() {
        return Err(InferenceError::input_format(&path, "merged table not found"));
    }

    let df = read_csv(&path)?;
    if drop_index_column {
        drop_leading_column(df).map_err(|source| InferenceError::Table { path, source })
    } else {
        Ok(df)
    }
}

/// Drop the first column (the index written alongside the merged table).
pub fn drop_leading_column(df: DataFrame) -> PolarsResult<DataFrame> {
    let first = df.get_column_names().first().map(|name| name.to_string());
    match first {
        Some(name) => df.drop(&name),
        None => Ok(df),
    }
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Add (or replace) a float column. Returns `true` if it replaced one.
pub fn set_score_column(
    df: &mut DataFrame,
    name: &str,
    values: Vec<Option<f64>>,
) -> PolarsResult<bool> {
    let replaced = has_column(df, name);
    df.with_column(Series::new(name.into(), values))?;
    Ok(replaced)
}

/// Write `df` as CSV with a header, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), InferenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| InferenceError::io(parent, e))?;
    }
    let mut file = File::create(path).map_err(|e| InferenceError::io(path, e))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|source| InferenceError::Table {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn directory_resolves_to_merged_df() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), MERGED_TABLE_FILE, "index,filepath\n0,a.wav\n1,b.wav\n");

        let df = load_base_table(dir.path(), true).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names().len(), 1);
        assert!(has_column(&df, "filepath"));
    }

    #[test]
    fn index_column_can_be_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "merged.csv", "index,filepath\n0,a.wav\n");

        let df = load_base_table(&path, false).unwrap();

        assert!(has_column(&df, "index"));
        assert!(has_column(&df, "filepath"));
    }

    #[test]
    fn missing_merged_table_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_base_table(dir.path(), true),
            Err(InferenceError::InputFormat { .. })
        ));
    }

    #[test]
    fn score_columns_replace_by_name() {
        let mut df = DataFrame::new(vec![
            Series::new("filepath".into(), vec!["a.wav", "b.wav"]).into(),
        ])
        .unwrap();

        assert!(!set_score_column(&mut df, "Abies_PRESENT", vec![Some(0.1), None]).unwrap());
        assert!(set_score_column(&mut df, "Abies_PRESENT", vec![Some(0.3), Some(0.4)]).unwrap());

        assert_eq!(df.get_column_names().len(), 2);
        let scores = df.column("Abies_PRESENT").unwrap().f64().unwrap();
        assert_eq!(scores.get(0), Some(0.3));
    }

    #[test]
    fn writes_header_and_null_cells() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out.csv");
        let mut df = DataFrame::new(vec![
            Series::new("filepath".into(), vec!["a.wav", "b.wav"]).into(),
            Series::new("Abies_PRESENT".into(), vec![Some(0.5), None]).into(),
        ])
        .unwrap();

        write_csv(&mut df, &out).unwrap();

        let written = fs::read_to_string(&out).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("filepath,Abies_PRESENT"));
        assert_eq!(lines.next(), Some("a.wav,0.5"));
        assert_eq!(lines.next(), Some("b.wav,"));
    }
}
