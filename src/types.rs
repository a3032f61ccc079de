//src/types.rs

use std::fmt;
use std::path::PathBuf;

/// Separator used for every taxonomy once it has been normalized.
pub const RANK_SEPARATOR: char = '.';
pub const RANK_SEPARATOR_STR: &str = ".";

/// Separator used by raw abundance tables (`k__Bacteria|p__Firmicutes`).
pub const RAW_RANK_SEPARATOR: char = '|';

/// Rewrites a raw lineage into its canonical dot-joined form.
pub fn normalize_taxonomy(raw: &str) -> String {
    raw.trim().replace(RAW_RANK_SEPARATOR, RANK_SEPARATOR_STR)
}

/// Number of ranks in a canonical lineage.
pub fn taxonomy_level(taxonomy: &str) -> usize {
    if taxonomy.is_empty() {
        0
    } else {
        taxonomy.matches(RANK_SEPARATOR).count() + 1
    }
}

/// The lineage truncated to its first `level` ranks, if it is that deep.
pub fn truncate_taxonomy(taxonomy: &str, level: usize) -> Option<&str> {
    if level == 0 || taxonomy_level(taxonomy) < level {
        return None;
    }
    match taxonomy.match_indices(RANK_SEPARATOR).nth(level - 1) {
        Some((idx, _)) => Some(&taxonomy[..idx]),
        None => Some(taxonomy),
    }
}

/// First rank of a lineage.
pub fn root_rank(taxonomy: &str) -> &str {
    taxonomy.split(RANK_SEPARATOR).next().unwrap_or(taxonomy)
}

/// One row of the biomarker-result (LEfSe output) table.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomarkerRecord {
    pub effect_size: Option<f64>,
    pub biomarker: Option<String>,
    pub mean: Option<f64>,
    pub p_value: Option<f64>,
}

impl BiomarkerRecord {
    pub fn is_biomarker(&self) -> bool {
        self.biomarker.is_some()
    }
}

/// Where abundance data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbundanceInput {
    /// Feature rows x sample columns, pipe-delimited lineages.
    Table(PathBuf),
    /// Biom (JSON) table with a taxonomy metadata column.
    Biom(PathBuf),
}

impl AbundanceInput {
    pub fn path(&self) -> &PathBuf {
        match self {
            AbundanceInput::Table(p) | AbundanceInput::Biom(p) => p,
        }
    }
}

/// Which input sources a run was given. Resolved once, up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    AbundanceOnly(AbundanceInput),
    BiomarkersOnly(PathBuf),
    Both {
        abundance: AbundanceInput,
        biomarkers: PathBuf,
    },
}

/// A single line of the annotation file.
///
/// Global settings have no node (`key<TAB>value`), everything else is
/// `node<TAB>key<TAB>value`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationLine {
    pub node: Option<String>,
    pub key: &'static str,
    pub value: String,
}

impl AnnotationLine {
    pub fn global(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            node: None,
            key,
            value: value.into(),
        }
    }

    pub fn node(node: impl Into<String>, key: &'static str, value: impl Into<String>) -> Self {
        Self {
            node: Some(node.into()),
            key,
            value: value.into(),
        }
    }
}

impl fmt::Display for AnnotationLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{}\t{}\t{}", node, self.key, self.value),
            None => write!(f, "{}\t{}", self.key, self.value),
        }
    }
}
