//! Entity lister: reads the species list.

use std::path::Path;

use polars::prelude::DataType;
use tracing::info;

use batchscore_core::Entity;

use crate::error::InferenceError;
use crate::table;

/// Column holding one species name per row.
pub const SPECIES_COLUMN: &str = "species";

/// Read the species to score, in file order, duplicates kept.
///
/// Non-text species columns are cast to text. A blank or null cell is an
/// input error naming its (1-based, header excluded) row.
pub fn list_entities(path: &Path) -> Result<Vec<Entity>, InferenceError> {
    if !path.is_file() {
        return Err(InferenceError::input_format(path, "species list not found"));
    }

    let df = table::read_csv(path)
        .map_err(|e| InferenceError::input_format(path, e.to_string()))?;
    if !table::has_column(&df, SPECIES_COLUMN) {
        return Err(InferenceError::input_format(
            path,
            format!("missing required column '{SPECIES_COLUMN}'"),
        ));
    }

    let column = df
        .column(SPECIES_COLUMN)
        .and_then(|c| c.cast(&DataType::String))
        .map_err(|e| InferenceError::input_format(path, e.to_string()))?;
    let values = column
        .str()
        .map_err(|e| InferenceError::input_format(path, e.to_string()))?;

    let mut entities = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        match value.map(str::trim) {
            Some(name) if !name.is_empty() => entities.push(Entity::new(name)),
            _ => {
                return Err(InferenceError::input_format(
                    path,
                    format!("row {}: empty species name", idx + 1),
                ));
            }
        }
    }

    info!(
        path = %path.display(),
        count = entities.len(),
        "listed species"
    );
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn species_csv(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("species.csv");
        fs::write(&path, contents).unwrap();
        path
    }

    fn names(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(Entity::name).collect()
    }

    #[test]
    fn lists_species_in_order_with_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = species_csv(
            dir.path(),
            "species,count\nAbies-lasiocarpa,3\nPinus-contorta,1\nAbies-lasiocarpa,2\n",
        );

        let entities = list_entities(&path).unwrap();

        assert_eq!(
            names(&entities),
            vec!["Abies-lasiocarpa", "Pinus-contorta", "Abies-lasiocarpa"]
        );
    }

    #[test]
    fn numeric_species_are_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = species_csv(dir.path(), "species\n101\n202\n");

        let entities = list_entities(&path).unwrap();

        assert_eq!(names(&entities), vec!["101", "202"]);
    }

    #[test]
    fn missing_column_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = species_csv(dir.path(), "name\nAbies-lasiocarpa\n");

        let err = list_entities(&path).unwrap_err();

        assert!(
            matches!(&err, InferenceError::InputFormat { reason, .. } if reason.contains("species"))
        );
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            list_entities(&dir.path().join("nope.csv")),
            Err(InferenceError::InputFormat { .. })
        ));
    }

    #[test]
    fn blank_species_cell_names_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = species_csv(dir.path(), "species,count\nAbies-lasiocarpa,1\n,2\n");

        let err = list_entities(&path).unwrap_err();

        assert!(
            matches!(&err, InferenceError::InputFormat { reason, .. } if reason.starts_with("row 2"))
        );
    }
}
