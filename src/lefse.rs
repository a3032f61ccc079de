// src/lefse.rs

use ahash::AHashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{ExportError, Result};
use crate::io_util::open_text_reader;
use crate::types::{normalize_taxonomy, BiomarkerRecord};

/// Number of tab-separated fields in a biomarker-result row.
pub const LEFSE_FIELDS: usize = 5;

/// Parsed biomarker-result table.
#[derive(Debug, Clone, Default)]
pub struct LefseOutput {
    /// Lineages in file order, each once.
    pub taxonomies: Vec<String>,
    pub records: AHashMap<String, BiomarkerRecord>,
    /// Distinct biomarker labels in first-seen order.
    pub biomarkers: Vec<String>,
    /// Every effect size present in the file.
    pub effect_sizes: Vec<f64>,
}

impl LefseOutput {
    pub fn insert(&mut self, taxonomy: String, record: BiomarkerRecord) {
        if let Some(label) = &record.biomarker {
            if !self.biomarkers.contains(label) {
                self.biomarkers.push(label.clone());
            }
        }
        if let Some(es) = record.effect_size {
            self.effect_sizes.push(es);
        }
        if self.records.insert(taxonomy.clone(), record).is_none() {
            self.taxonomies.push(taxonomy);
        }
    }

    pub fn get(&self, taxonomy: &str) -> Option<&BiomarkerRecord> {
        self.records.get(taxonomy)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Largest effect size, `None` when the file carries none.
    pub fn max_effect_size(&self) -> Option<f64> {
        self.effect_sizes
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }
}

fn optional_field(field: &str) -> Option<&str> {
    let field = field.trim();
    if field.is_empty() || field == "-" {
        None
    } else {
        Some(field)
    }
}

/// Parses one `taxonomy\tmean\tbiomarker\teffect_size\tp_value` row.
pub fn parse_lefse_line(line: &str) -> std::result::Result<(String, BiomarkerRecord), String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != LEFSE_FIELDS {
        return Err(format!(
            "expected {} tab-separated fields, found {}",
            LEFSE_FIELDS,
            fields.len()
        ));
    }

    let taxonomy = normalize_taxonomy(fields[0]);
    if taxonomy.is_empty() {
        return Err("empty taxonomy".to_string());
    }

    let parse_num = |name: &str, value: Option<&str>| -> std::result::Result<Option<f64>, String> {
        value
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| format!("{} '{}' is not a number", name, v))
            })
            .transpose()
    };

    let mean = parse_num("mean", optional_field(fields[1]))?;
    let effect_size = parse_num("effect size", optional_field(fields[3]))?;
    let p_value = parse_num("p-value", optional_field(fields[4]))?;

    Ok((
        taxonomy,
        BiomarkerRecord {
            effect_size,
            biomarker: optional_field(fields[2]).map(str::to_string),
            mean,
            p_value,
        },
    ))
}

/// Reads a whole biomarker-result file. Any malformed row aborts the read.
pub fn parse_lefse_output<P: AsRef<Path>>(path: P) -> Result<LefseOutput> {
    let reader = open_text_reader(&path)?;
    let mut output = LefseOutput::default();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        let (taxonomy, record) =
            parse_lefse_line(line).map_err(|reason| ExportError::MalformedRow {
                path: path.as_ref().to_path_buf(),
                line: idx + 1,
                reason,
            })?;
        output.insert(taxonomy, record);
    }

    log::info!(
        "read {} rows and {} biomarkers from {}",
        output.taxonomies.len(),
        output.biomarkers.len(),
        path.as_ref().display()
    );
    Ok(output)
}
