// src/lib.rs
pub mod abundance;
pub mod annotate;
pub mod biom;
pub mod clade_size;
pub mod color;
pub mod config;
pub mod error;
pub mod io_util;
pub mod lefse;
pub mod taxonomy;
pub mod types;

use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::annotate::{emit_annotations, resolve_shading};
use crate::color::ColorAssignment;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::taxonomy::{build_taxonomy_table, load_inputs};
use crate::types::AnnotationLine;

/// Everything one run produces, kept structured; text is generated on demand.
#[derive(Debug, Clone, Default)]
pub struct ExportResults {
    /// Tree lineages in output order.
    pub taxa: Vec<String>,

    /// Annotation lines in output order.
    pub annotations: Vec<AnnotationLine>,

    /// Biomarker labels in colour-assignment order.
    pub biomarkers: Vec<String>,

    /// Problems that were recovered from, in order of occurrence.
    pub warnings: Vec<String>,
}

impl ExportResults {
    /// Generate the tree file text on demand
    pub fn get_tree_text(&self) -> String {
        let mut output = String::new();
        for taxonomy in &self.taxa {
            writeln!(output, "{}", taxonomy).unwrap();
        }
        output
    }

    /// Generate the annotation file text on demand
    pub fn get_annotation_text(&self) -> String {
        let mut output = String::new();
        for line in &self.annotations {
            writeln!(output, "{}", line).unwrap();
        }
        output
    }

    pub fn write_tree<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for taxonomy in &self.taxa {
            writeln!(writer, "{}", taxonomy)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_annotation<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for line in &self.annotations {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Logs every collected warning.
    pub fn report_warnings(&self) {
        for w in &self.warnings {
            log::warn!("{}", w);
        }
    }
}

/// Runs the whole synthesis: load inputs, build the taxonomy table, resolve
/// colours and shading, emit annotation lines.
///
/// Configuration problems fail here, before anything is written.
pub fn export_annotations(mut config: ExportConfig) -> Result<ExportResults> {
    // 1. Resolve configuration
    let mut warnings = config.validate()?;
    let mode = config.input_mode()?;

    // 2. Load and unify the inputs (the flattened biom file is gone after this)
    let inputs = load_inputs(&mode)?;
    let table = build_taxonomy_table(inputs, &config, &mut warnings);
    log::info!(
        "{} lineages, {} biomarkers{}",
        table.taxa.len(),
        table.lefse_output.biomarkers.len(),
        if table.synthetic_biomarkers { " (derived from abundances)" } else { "" }
    );

    // 3. Colours and shading
    let colors = ColorAssignment::new(table.lefse_output.biomarkers.iter().cloned());
    let shading = resolve_shading(&table.taxa, &config);

    // 4. Annotation lines
    let annotations = emit_annotations(&table, &colors, &shading, &config, &mut warnings);

    Ok(ExportResults {
        taxa: table.taxa,
        annotations,
        biomarkers: colors.labels().to_vec(),
        warnings,
    })
}

/// Runs [`export_annotations`] and writes both output files.
/// Collected warnings are reported once both files are written.
pub fn export_to_files<P: AsRef<Path>, Q: AsRef<Path>>(
    config: ExportConfig,
    tree_path: P,
    annotation_path: Q,
) -> Result<ExportResults> {
    let results = export_annotations(config)?;
    let tree_written = results.write_tree(&tree_path);
    let annotation_written = results.write_annotation(&annotation_path);
    results.report_warnings();
    tree_written?;
    annotation_written?;
    Ok(results)
}
