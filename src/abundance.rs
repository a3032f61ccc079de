//src/abundance.rs

use ahash::AHashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::Result;
use crate::io_util::open_text_reader;
use crate::types::normalize_taxonomy;

/// Read access to per-lineage mean abundances.
///
/// Lineages are returned in canonical (dot-separated) form and looked up the same way.
pub trait AbundanceSource {
    fn get_taxonomies(&self) -> Vec<String>;
    fn get_average_abundance(&self, taxonomy: &str) -> Option<f64>;
}

/// An abundance matrix reduced to its per-feature means.
#[derive(Debug, Clone, Default)]
pub struct AbundanceMatrix {
    taxonomies: Vec<String>,
    averages: AHashMap<String, f64>,
}

impl AbundanceMatrix {
    /// Builds a matrix directly from `(lineage, per-sample values)` rows.
    /// Repeated lineages are summed sample-wise.
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: AsRef<str>,
    {
        let mut order: Vec<String> = Vec::new();
        let mut sums: AHashMap<String, Vec<f64>> = AHashMap::new();

        for (raw, values) in rows {
            let taxonomy = normalize_taxonomy(raw.as_ref());
            match sums.get_mut(&taxonomy) {
                Some(acc) => {
                    if acc.len() < values.len() {
                        acc.resize(values.len(), 0.0);
                    }
                    for (a, v) in acc.iter_mut().zip(values.iter()) {
                        *a += v;
                    }
                }
                None => {
                    order.push(taxonomy.clone());
                    sums.insert(taxonomy, values);
                }
            }
        }

        let averages = sums
            .into_iter()
            .map(|(t, values)| {
                let mean = if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                };
                (t, mean)
            })
            .collect();

        Self {
            taxonomies: order,
            averages,
        }
    }

    /// Parses an abundance table:
    /// ```text
    /// <header>\t<sample_1>\t<sample_2>...
    /// <lineage>\t<value>\t<value>...
    /// ```
    /// Rows carrying non-numeric values (class / subject rows) are skipped.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = open_text_reader(&path)?;
        let mut rows: Vec<(String, Vec<f64>)> = Vec::new();

        for (idx, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if idx == 0 || line.trim().is_empty() {
                continue;
            }

            let mut fields = line.split('\t');
            let lineage = match fields.next() {
                Some(l) if !l.trim().is_empty() => l.trim().to_string(),
                _ => continue,
            };

            let values: std::result::Result<Vec<f64>, _> =
                fields.map(|v| v.trim().parse::<f64>()).collect();
            match values {
                Ok(values) if !values.is_empty() => rows.push((lineage, values)),
                _ => log::debug!("skipping non-numeric row '{}' in {}", lineage, path.as_ref().display()),
            }
        }

        let matrix = Self::from_rows(rows);
        log::info!(
            "loaded {} lineages from {}",
            matrix.taxonomies.len(),
            path.as_ref().display()
        );
        Ok(matrix)
    }

    pub fn len(&self) -> usize {
        self.taxonomies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxonomies.is_empty()
    }
}

impl AbundanceSource for AbundanceMatrix {
    fn get_taxonomies(&self) -> Vec<String> {
        self.taxonomies.clone()
    }

    fn get_average_abundance(&self, taxonomy: &str) -> Option<f64> {
        self.averages.get(taxonomy).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_path_skips_metadata_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id\ts1\ts2").unwrap();
        writeln!(file, "class\tcase\tcontrol").unwrap();
        writeln!(file, "A|B|C\t5\t15").unwrap();
        writeln!(file, "A|B|D\t90\t90").unwrap();
        file.flush().unwrap();

        let m = AbundanceMatrix::from_path(file.path()).unwrap();
        assert_eq!(m.get_taxonomies(), vec!["A.B.C", "A.B.D"]);
        assert_eq!(m.get_average_abundance("A.B.C"), Some(10.0));
        assert_eq!(m.get_average_abundance("A.B.D"), Some(90.0));
        assert_eq!(m.get_average_abundance("A|B|C"), None);
    }

    #[test]
    fn test_duplicate_lineages_are_summed() {
        let m = AbundanceMatrix::from_rows(vec![
            ("A.B", vec![1.0, 3.0]),
            ("A|B", vec![1.0, 1.0]),
            ("A.C", vec![0.0, 0.0]),
        ]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.get_average_abundance("A.B"), Some(3.0));
    }
}
