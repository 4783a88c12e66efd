use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;

use crate::dataset::{DatasetError, Table};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("no column containing '{0}' in the district table")]
    MissingColumn(&'static str),
}

/// State name to the sorted districts recorded for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistrictIndex {
    map: BTreeMap<String, BTreeSet<String>>,
}

impl DistrictIndex {
    /// Uses the first header containing `state` and the first containing
    /// `district`, ignoring case. Rows with an empty cell in either are skipped.
    pub fn from_table(table: &Table) -> Result<Self, LookupError> {
        let state_col = table
            .find_column(|h| h.to_lowercase().contains("state"))
            .ok_or(LookupError::MissingColumn("state"))?;
        let district_col = table
            .find_column(|h| h.to_lowercase().contains("district"))
            .ok_or(LookupError::MissingColumn("district"))?;

        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in table.rows() {
            let state = row[state_col].trim();
            let district = row[district_col].trim();
            if state.is_empty() || district.is_empty() {
                continue;
            }
            map.entry(state.to_string())
                .or_default()
                .insert(district.to_string());
        }
        Ok(Self { map })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        Self::from_table(&Table::from_path(path)?)
    }

    /// Like [`DistrictIndex::from_path`], but a missing file gives an empty
    /// index instead of an error.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("district table {} not found; lookups will be empty", path.display());
            return Ok(Self::default());
        }
        let index = Self::from_path(path)?;
        log::info!("loaded {} states from {}", index.map.len(), path.display());
        Ok(index)
    }

    pub fn states(&self) -> Vec<&str> {
        self.map.keys().map(String::as_str).collect()
    }

    /// Districts of `state`, sorted; empty for an unknown state.
    pub fn districts(&self, state: &str) -> Vec<&str> {
        self.map
            .get(state.trim())
            .map(|d| d.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn mapping(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
State_Name,District_Name,Crop_Year,Rainfall
Kerala,Wayanad,2001,3000
Kerala, Alappuzha ,2001,2800
Kerala,Wayanad,2002,3100
Punjab,Ludhiana,2001,700
Punjab,,2001,650
";

    fn index() -> DistrictIndex {
        DistrictIndex::from_table(&Table::from_reader(CSV.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn test_states_and_districts_sorted() {
        let index = index();
        assert_eq!(index.states(), vec!["Kerala", "Punjab"]);
        assert_eq!(index.districts("Kerala"), vec!["Alappuzha", "Wayanad"]);
        assert_eq!(index.districts("Punjab"), vec!["Ludhiana"]);
    }

    #[test]
    fn test_unknown_state_is_empty() {
        assert!(index().districts("Karnataka").is_empty());
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let table = Table::from_reader("State,Year\nKerala,2001\n".as_bytes()).unwrap();
        assert!(matches!(
            DistrictIndex::from_table(&table),
            Err(LookupError::MissingColumn("district"))
        ));
    }

    #[test]
    fn test_missing_file_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let index = DistrictIndex::load_or_empty(dir.path().join("data2.csv")).unwrap();
        assert!(index.states().is_empty());
    }
}
