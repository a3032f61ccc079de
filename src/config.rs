// src/config.rs

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::color::parse_color_list;
use crate::error::{ExportError, Result};
use crate::io_util::open_text_reader;
use crate::types::{normalize_taxonomy, AbundanceInput, InputMode};

/// How explicit background clades are matched against lineages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CladeMatch {
    /// Plain substring test, `Bacteria` also hits `Proteobacteria`.
    Substring,
    /// The clade must cover whole ranks of the lineage.
    #[default]
    RankBoundary,
}

/// Every knob of one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub abundance_table: Option<PathBuf>,
    pub biom_table: Option<PathBuf>,
    pub lefse_output: Option<PathBuf>,

    pub title: Option<String>,
    pub title_font_size: u32,

    pub def_clade_size: f64,
    pub min_clade_size: f64,
    pub max_clade_size: f64,

    pub def_font_size: u32,
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub annotation_legend_font_size: u32,
    pub class_legend_font_size: u32,

    pub abundance_threshold: f64,

    /// Levels labelled on the tree itself.
    pub annotations: Vec<usize>,
    /// Levels labelled through a short key and the annotation legend.
    pub external_annotations: Vec<usize>,

    pub background_levels: Vec<usize>,
    pub background_clades: Vec<String>,
    pub background_colors: Vec<String>,
    pub clade_match: CladeMatch,

    pub most_abundant: usize,
    pub least_biomarkers: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            abundance_table: None,
            biom_table: None,
            lefse_output: None,
            title: None,
            title_font_size: 15,
            def_clade_size: 10.0,
            min_clade_size: 20.0,
            max_clade_size: 200.0,
            def_font_size: 10,
            min_font_size: 8,
            max_font_size: 12,
            annotation_legend_font_size: 10,
            class_legend_font_size: 10,
            abundance_threshold: 20.0,
            annotations: Vec::new(),
            external_annotations: Vec::new(),
            background_levels: Vec::new(),
            background_clades: Vec::new(),
            background_colors: Vec::new(),
            clade_match: CladeMatch::default(),
            most_abundant: 10,
            least_biomarkers: 3,
        }
    }
}

impl ExportConfig {
    /// Fixes recoverable problems in place and reports them as warnings.
    /// Inverted min/max pairs are reset to their defaults.
    pub fn validate(&mut self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let defaults = ExportConfig::default();

        if self.abundance_table.is_some() && self.biom_table.is_some() {
            return Err(ExportError::Configuration(
                "give either an abundance table or a biom table, not both".to_string(),
            ));
        }

        if self.min_clade_size > self.max_clade_size {
            warnings.push(format!(
                "min_clade_size ({}) cannot be greater than max_clade_size ({}), using defaults",
                self.min_clade_size, self.max_clade_size
            ));
            self.min_clade_size = defaults.min_clade_size;
            self.max_clade_size = defaults.max_clade_size;
        }

        if self.min_font_size > self.max_font_size {
            warnings.push(format!(
                "min_font_size ({}) cannot be greater than max_font_size ({}), using defaults",
                self.min_font_size, self.max_font_size
            ));
            self.min_font_size = defaults.min_font_size;
            self.max_font_size = defaults.max_font_size;
        }

        if self.most_abundant == 0 && self.lefse_output.is_none() {
            warnings.push(format!(
                "most_abundant must be positive, using {}",
                defaults.most_abundant
            ));
            self.most_abundant = defaults.most_abundant;
        }

        Ok(warnings)
    }

    /// Resolves which inputs this run has. Fails when there are none.
    pub fn input_mode(&self) -> Result<InputMode> {
        let abundance = match (&self.abundance_table, &self.biom_table) {
            (Some(p), None) => Some(AbundanceInput::Table(p.clone())),
            (None, Some(p)) => Some(AbundanceInput::Biom(p.clone())),
            (None, None) => None,
            (Some(_), Some(_)) => {
                return Err(ExportError::Configuration(
                    "give either an abundance table or a biom table, not both".to_string(),
                ))
            }
        };

        match (abundance, self.lefse_output.clone()) {
            (Some(abundance), Some(biomarkers)) => Ok(InputMode::Both {
                abundance,
                biomarkers,
            }),
            (Some(abundance), None) => Ok(InputMode::AbundanceOnly(abundance)),
            (None, Some(biomarkers)) => Ok(InputMode::BiomarkersOnly(biomarkers)),
            (None, None) => Err(ExportError::Configuration(
                "at least one of an abundance table, a biom table or a biomarker-result file is required"
                    .to_string(),
            )),
        }
    }

    /// Font size for a node `depth` ranks deep: `min + (max - min) / depth`.
    pub fn font_size_for_depth(&self, depth: usize) -> u32 {
        if depth == 0 {
            return self.def_font_size;
        }
        self.min_font_size + (self.max_font_size - self.min_font_size) / depth as u32
    }
}

/// Parses a comma-separated list of 1-based levels, e.g. `1,2,3`.
pub fn parse_levels(text: &str) -> Result<Vec<usize>> {
    let mut levels = Vec::new();
    for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let level: usize = item.parse().map_err(|_| {
            ExportError::Configuration(format!("'{}' is not a valid level", item))
        })?;
        if level == 0 {
            return Err(ExportError::Configuration(
                "levels are 1-based, 0 is not allowed".to_string(),
            ));
        }
        if !levels.contains(&level) {
            levels.push(level);
        }
    }
    Ok(levels)
}

/// Reads explicit background clades, one lineage per line.
pub fn read_clade_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = open_text_reader(path)?;
    let mut clades = Vec::new();
    for line in reader.lines() {
        let clade = normalize_taxonomy(&line?);
        if !clade.is_empty() && !clades.contains(&clade) {
            clades.push(clade);
        }
    }
    Ok(clades)
}

/// Background colours from a file when `arg` names one, otherwise from the string itself.
pub fn read_color_list(arg: &str) -> Result<Vec<String>> {
    let path = Path::new(arg);
    if path.is_file() {
        parse_color_list(&std::fs::read_to_string(path)?)
    } else {
        parse_color_list(arg)
    }
}
