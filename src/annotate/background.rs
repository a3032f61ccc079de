// src/annotate/background.rs

use ahash::{AHashMap, AHashSet};

use crate::color::{scale_color, NEUTRAL_BACKGROUND, PALETTE};
use crate::config::{CladeMatch, ExportConfig};
use crate::types::{root_rank, truncate_taxonomy, AnnotationLine, RANK_SEPARATOR, RANK_SEPARATOR_STR};

use super::{KEY_ANNOTATION, KEY_BACKGROUND_COLOR, KEY_FONT_SIZE, LABEL_CLADE_NAME};

/// Hands out one colour per root rank, cycling through a list.
#[derive(Debug, Clone)]
pub struct RootColorCycler {
    colors: Vec<String>,
    by_root: AHashMap<String, String>,
    next: usize,
}

impl RootColorCycler {
    pub fn new(colors: Vec<String>) -> Self {
        Self {
            colors,
            by_root: AHashMap::new(),
            next: 0,
        }
    }

    /// The configured list, or the biomarker palette when none is given.
    pub fn from_config(config: &ExportConfig) -> Self {
        if config.background_colors.is_empty() {
            Self::new(
                PALETTE
                    .iter()
                    .filter_map(|c| scale_color(*c, 1.0).ok())
                    .collect(),
            )
        } else {
            Self::new(config.background_colors.clone())
        }
    }

    pub fn color_for_root(&mut self, root: &str) -> String {
        if let Some(c) = self.by_root.get(root) {
            return c.clone();
        }
        let color = self.colors[self.next % self.colors.len()].clone();
        self.next += 1;
        self.by_root.insert(root.to_string(), color.clone());
        color
    }
}

/// Where a clade sits inside a lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CladeHit {
    /// Ancestor ranks before the match.
    pub depth: usize,
    /// Lineage prefix ending with the matched rank.
    pub node: String,
}

/// Locates `clade` inside `taxonomy` under the given matching rule.
pub fn find_clade(taxonomy: &str, clade: &str, mode: CladeMatch) -> Option<CladeHit> {
    if clade.is_empty() {
        return None;
    }
    match mode {
        CladeMatch::Substring => {
            let start = taxonomy.find(clade)?;
            let end = start + clade.len();
            let node_end = taxonomy[end..]
                .find(RANK_SEPARATOR)
                .map(|i| end + i)
                .unwrap_or(taxonomy.len());
            Some(CladeHit {
                depth: taxonomy[..start].matches(RANK_SEPARATOR).count(),
                node: taxonomy[..node_end].to_string(),
            })
        }
        CladeMatch::RankBoundary => {
            let ranks: Vec<&str> = taxonomy.split(RANK_SEPARATOR).collect();
            let wanted: Vec<&str> = clade.split(RANK_SEPARATOR).collect();
            if wanted.len() > ranks.len() {
                return None;
            }
            let start = ranks.windows(wanted.len()).position(|w| w == wanted.as_slice())?;
            Some(CladeHit {
                depth: start,
                node: ranks[..start + wanted.len()].join(RANK_SEPARATOR_STR),
            })
        }
    }
}

/// Background shading for one run, indexed by position in the tree list.
#[derive(Debug, Clone, Default)]
pub struct ShadingPlan {
    by_level: AHashMap<usize, Vec<AnnotationLine>>,
    by_clade: AHashMap<usize, Vec<AnnotationLine>>,
}

impl ShadingPlan {
    pub fn level_lines(&self, taxonomy_idx: usize) -> &[AnnotationLine] {
        self.by_level.get(&taxonomy_idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clade_lines(&self, taxonomy_idx: usize) -> &[AnnotationLine] {
        self.by_clade.get(&taxonomy_idx).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn shade(node: &str, color: String, font_size: u32) -> [AnnotationLine; 3] {
    [
        AnnotationLine::node(node, KEY_BACKGROUND_COLOR, color),
        AnnotationLine::node(node, KEY_ANNOTATION, LABEL_CLADE_NAME),
        AnnotationLine::node(node, KEY_FONT_SIZE, font_size.to_string()),
    ]
}

/// Computes level-based and clade-based shading for every lineage in `taxa`.
pub fn resolve_shading(taxa: &[String], config: &ExportConfig) -> ShadingPlan {
    let mut plan = ShadingPlan::default();

    // by level: one mark per truncated ancestor
    let mut level_colors = if config.background_colors.is_empty() {
        None
    } else {
        Some(RootColorCycler::new(config.background_colors.clone()))
    };
    let neutral = scale_color(NEUTRAL_BACKGROUND, 1.0).unwrap_or_else(|_| "#bfbfbf".to_string());
    let mut done: AHashSet<String> = AHashSet::new();

    for (idx, taxonomy) in taxa.iter().enumerate() {
        for &level in &config.background_levels {
            let Some(ancestor) = truncate_taxonomy(taxonomy, level) else {
                continue;
            };
            if !done.insert(ancestor.to_string()) {
                continue;
            }
            let color = match level_colors.as_mut() {
                Some(cycler) => cycler.color_for_root(root_rank(ancestor)),
                None => neutral.clone(),
            };
            plan.by_level
                .entry(idx)
                .or_default()
                .extend(shade(ancestor, color, config.font_size_for_depth(level)));
        }
    }

    // by clade: first lineage containing each clade, in clade order
    let mut clade_colors = RootColorCycler::from_config(config);
    let mut done_clades: AHashSet<&str> = AHashSet::new();

    for clade in &config.background_clades {
        if done_clades.contains(clade.as_str()) {
            continue;
        }
        let hit = taxa
            .iter()
            .enumerate()
            .find_map(|(idx, t)| find_clade(t, clade, config.clade_match).map(|h| (idx, t, h)));
        let Some((idx, taxonomy, hit)) = hit else {
            log::debug!("background clade '{}' not found in the tree", clade);
            continue;
        };
        done_clades.insert(clade.as_str());

        let color = clade_colors.color_for_root(root_rank(taxonomy));
        plan.by_clade
            .entry(idx)
            .or_default()
            .extend(shade(&hit.node, color, config.font_size_for_depth(hit.depth)));
    }

    plan
}
