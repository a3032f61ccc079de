// src/biom.rs

use serde::Deserialize;
use serde_json::Value;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::abundance::AbundanceMatrix;
use crate::error::{ExportError, Result};
use crate::io_util::open_text_reader;
use crate::types::RANK_SEPARATOR_STR;

/// The subset of a Biom 1.0 (JSON) table needed to flatten it.
#[derive(Debug, Deserialize)]
pub struct BiomTable {
    #[serde(default)]
    pub id: Option<String>,
    pub rows: Vec<BiomEntry>,
    pub columns: Vec<BiomEntry>,
    pub matrix_type: String,
    pub data: Vec<Vec<f64>>,
    #[serde(default)]
    pub shape: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
pub struct BiomEntry {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<BiomMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct BiomMetadata {
    #[serde(default)]
    pub taxonomy: Option<Value>,
}

impl BiomTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = open_text_reader(&path)?;
        serde_json::from_reader(reader).map_err(|e| {
            ExportError::InvalidBiomFormat(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Dense `features x samples` counts, whatever the stored layout.
    pub fn dense_counts(&self) -> Result<Vec<Vec<f64>>> {
        let (n_rows, n_cols) = (self.rows.len(), self.columns.len());
        if let Some(shape) = &self.shape {
            if shape.len() != 2 || shape[0] != n_rows || shape[1] != n_cols {
                return Err(ExportError::InvalidBiomFormat(format!(
                    "shape {:?} does not match {} rows x {} columns",
                    shape, n_rows, n_cols
                )));
            }
        }

        match self.matrix_type.as_str() {
            "dense" => {
                if self.data.len() != n_rows || self.data.iter().any(|r| r.len() != n_cols) {
                    return Err(ExportError::InvalidBiomFormat(
                        "dense data does not match the declared rows/columns".to_string(),
                    ));
                }
                Ok(self.data.clone())
            }
            "sparse" => {
                let mut dense = vec![vec![0.0; n_cols]; n_rows];
                for entry in &self.data {
                    if entry.len() != 3 {
                        return Err(ExportError::InvalidBiomFormat(format!(
                            "sparse entry {:?} is not a (row, column, value) triple",
                            entry
                        )));
                    }
                    let (r, c) = (sparse_index(entry[0])?, sparse_index(entry[1])?);
                    if r >= n_rows || c >= n_cols {
                        return Err(ExportError::InvalidBiomFormat(format!(
                            "sparse entry ({}, {}) outside a {}x{} table",
                            r, c, n_rows, n_cols
                        )));
                    }
                    dense[r][c] += entry[2];
                }
                Ok(dense)
            }
            other => Err(ExportError::InvalidBiomFormat(format!(
                "unsupported matrix_type '{}'",
                other
            ))),
        }
    }
}

fn sparse_index(value: f64) -> Result<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(ExportError::InvalidBiomFormat(format!(
            "sparse index {} is not a non-negative integer",
            value
        )));
    }
    Ok(value as usize)
}

/// Strips list/quote decoration from a taxonomy annotation and joins its ranks with dots.
pub fn clean_biom_taxonomy(value: &Value) -> Option<String> {
    fn strip(s: &str) -> String {
        s.chars()
            .filter(|c| !matches!(c, '[' | ']' | '"' | '\''))
            .collect::<String>()
    }

    let ranks: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| strip(s).trim().to_string())
            .collect(),
        Value::String(s) => strip(s)
            .split(|c| c == ';' || c == ',')
            .map(|s| s.trim().to_string())
            .collect(),
        _ => return None,
    };

    let ranks: Vec<String> = ranks.into_iter().filter(|r| !r.is_empty()).collect();
    if ranks.is_empty() {
        None
    } else {
        Some(ranks.join(RANK_SEPARATOR_STR))
    }
}

/// Writes the row-per-lineage form of `table` into a fresh temporary file:
/// ```text
/// taxonomy\t<sample_1>\t<sample_2>...
/// <rank.rank.rank>\t<count>\t<count>...
/// ```
pub fn flatten_biom(table: &BiomTable) -> Result<NamedTempFile> {
    let counts = table.dense_counts()?;
    let mut tmp = NamedTempFile::new()?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());

        write!(writer, "taxonomy")?;
        for column in &table.columns {
            write!(writer, "\t{}", column.id)?;
        }
        writeln!(writer)?;

        for (row, values) in table.rows.iter().zip(counts.iter()) {
            let lineage = row
                .metadata
                .as_ref()
                .and_then(|m| m.taxonomy.as_ref())
                .and_then(clean_biom_taxonomy)
                .unwrap_or_else(|| row.id.clone());
            write!(writer, "{}", lineage)?;
            for v in values {
                write!(writer, "\t{}", v)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
    }
    Ok(tmp)
}

/// Loads a biom table through its flattened form. The temporary file is removed before returning.
pub fn load_biom<P: AsRef<Path>>(path: P) -> Result<AbundanceMatrix> {
    let table = BiomTable::from_path(&path)?;
    log::info!(
        "biom table {} has {} features x {} samples",
        table.id.as_deref().unwrap_or("<unnamed>"),
        table.rows.len(),
        table.columns.len()
    );

    load_flattened(flatten_biom(&table)?)
}

/// Reads a flattened table and deletes it, whether or not the read succeeded.
fn load_flattened(flat: NamedTempFile) -> Result<AbundanceMatrix> {
    let loaded = AbundanceMatrix::from_path(flat.path());
    flat.close()?;
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abundance::AbundanceSource;
    use serde_json::json;

    fn sparse_table() -> String {
        json!({
            "id": "test",
            "format": "Biological Observation Matrix 1.0.0",
            "rows": [
                {"id": "OTU1", "metadata": {"taxonomy": ["k__Bacteria", "p__Firmicutes"]}},
                {"id": "OTU2", "metadata": {"taxonomy": "k__Bacteria; p__Proteobacteria"}},
                {"id": "OTU3", "metadata": null}
            ],
            "columns": [{"id": "S1", "metadata": null}, {"id": "S2", "metadata": null}],
            "matrix_type": "sparse",
            "data": [[0, 0, 4.0], [0, 1, 6.0], [1, 1, 2.0], [2, 0, 1.0]],
            "shape": [3, 2]
        })
        .to_string()
    }

    #[test]
    fn test_clean_biom_taxonomy() {
        assert_eq!(
            clean_biom_taxonomy(&json!(["k__A", " p__B", ""])),
            Some("k__A.p__B".to_string())
        );
        assert_eq!(
            clean_biom_taxonomy(&json!("['k__A', 'p__B']")),
            Some("k__A.p__B".to_string())
        );
        assert_eq!(clean_biom_taxonomy(&json!(3)), None);
    }

    #[test]
    fn test_flatten_biom_layout() {
        let table: BiomTable = serde_json::from_str(&sparse_table()).unwrap();
        let flat = flatten_biom(&table).unwrap();
        let text = std::fs::read_to_string(flat.path()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "taxonomy\tS1\tS2");
        assert_eq!(lines[1], "k__Bacteria.p__Firmicutes\t4\t6");
        assert_eq!(lines[2], "k__Bacteria.p__Proteobacteria\t0\t2");
        assert_eq!(lines[3], "OTU3\t1\t0");
    }

    #[test]
    fn test_load_biom_averages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.biom");
        std::fs::write(&path, sparse_table()).unwrap();

        let m = load_biom(&path).unwrap();
        assert_eq!(m.get_average_abundance("k__Bacteria.p__Firmicutes"), Some(5.0));
        assert_eq!(m.get_average_abundance("k__Bacteria.p__Proteobacteria"), Some(1.0));
    }

    #[test]
    fn test_flattened_file_removed_after_load() {
        let table: BiomTable = serde_json::from_str(&sparse_table()).unwrap();
        let flat = flatten_biom(&table).unwrap();
        let flat_path = flat.path().to_path_buf();
        assert!(flat_path.exists());

        let m = load_flattened(flat).unwrap();
        assert_eq!(m.get_average_abundance("k__Bacteria.p__Firmicutes"), Some(5.0));
        assert!(!flat_path.exists());
    }

    #[test]
    fn test_sparse_index_must_be_whole() {
        for bad in [json!([[-1, 0, 1.0]]), json!([[0, 0.5, 1.0]])] {
            let table: BiomTable = serde_json::from_value(json!({
                "rows": [{"id": "a"}],
                "columns": [{"id": "s"}],
                "matrix_type": "sparse",
                "data": bad
            }))
            .unwrap();
            assert!(matches!(table.dense_counts(), Err(ExportError::InvalidBiomFormat(_))));
        }
    }

    #[test]
    fn test_invalid_biom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.biom");
        std::fs::write(&path, "{\"rows\": 3}").unwrap();
        assert!(matches!(load_biom(&path), Err(ExportError::InvalidBiomFormat(_))));

        let table: BiomTable = serde_json::from_value(json!({
            "rows": [{"id": "a"}],
            "columns": [{"id": "s"}],
            "matrix_type": "sparse",
            "data": [[5, 0, 1.0]]
        }))
        .unwrap();
        assert!(matches!(flatten_biom(&table), Err(ExportError::InvalidBiomFormat(_))));
    }
}
