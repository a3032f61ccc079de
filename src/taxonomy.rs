// src/taxonomy.rs

use ahash::AHashMap;

use crate::abundance::{AbundanceMatrix, AbundanceSource};
use crate::biom::load_biom;
use crate::clade_size::CladeSizeScaler;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::lefse::{parse_lefse_output, LefseOutput};
use crate::types::{taxonomy_level, AbundanceInput, BiomarkerRecord, InputMode, RANK_SEPARATOR};

/// Effect size given to synthetic biomarkers. Carries no statistical meaning.
pub const SYNTHETIC_EFFECT_SIZE: f64 = 1.0;

/// Mean abundance per canonical lineage, with its maximum.
#[derive(Debug, Clone, Default)]
pub struct AbundanceTable {
    values: AHashMap<String, f64>,
    max_abundance: Option<f64>,
}

impl AbundanceTable {
    pub fn from_pairs<I: IntoIterator<Item = (String, f64)>>(pairs: I) -> Self {
        let values: AHashMap<String, f64> = pairs.into_iter().collect();
        let max_abundance = values
            .values()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));
        Self {
            values,
            max_abundance,
        }
    }

    pub fn from_source(source: &dyn AbundanceSource) -> Self {
        Self::from_pairs(source.get_taxonomies().into_iter().filter_map(|t| {
            let a = source.get_average_abundance(&t)?;
            Some((t, a))
        }))
    }

    pub fn get(&self, taxonomy: &str) -> Option<f64> {
        self.values.get(taxonomy).copied()
    }

    pub fn max_abundance(&self) -> Option<f64> {
        self.max_abundance
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Inputs after loading, tagged by what was supplied.
pub enum LoadedInputs {
    AbundanceOnly(Box<dyn AbundanceSource>),
    BiomarkersOnly(LefseOutput),
    Both(Box<dyn AbundanceSource>, LefseOutput),
}

/// The unified view every later stage works from.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyTable {
    /// Tree lineages, canonical form, each once.
    pub taxa: Vec<String>,
    pub abundances: AbundanceTable,
    pub lefse_output: LefseOutput,
    /// Biomarkers were derived from abundances rather than read from a result file.
    pub synthetic_biomarkers: bool,
}

impl TaxonomyTable {
    pub fn size_scaler(&self, config: &ExportConfig) -> CladeSizeScaler {
        CladeSizeScaler {
            min: config.min_clade_size,
            max: config.max_clade_size,
            default: config.def_clade_size,
            max_abundance: self.abundances.max_abundance(),
        }
    }
}

fn load_abundance(input: &AbundanceInput) -> Result<Box<dyn AbundanceSource>> {
    log::info!("loading abundances from {}", input.path().display());
    let matrix = match input {
        AbundanceInput::Table(path) => AbundanceMatrix::from_path(path)?,
        AbundanceInput::Biom(path) => load_biom(path)?,
    };
    Ok(Box::new(matrix))
}

/// Reads every input named by `mode`.
pub fn load_inputs(mode: &InputMode) -> Result<LoadedInputs> {
    Ok(match mode {
        InputMode::AbundanceOnly(a) => LoadedInputs::AbundanceOnly(load_abundance(a)?),
        InputMode::BiomarkersOnly(p) => LoadedInputs::BiomarkersOnly(parse_lefse_output(p)?),
        InputMode::Both {
            abundance,
            biomarkers,
        } => LoadedInputs::Both(load_abundance(abundance)?, parse_lefse_output(biomarkers)?),
    })
}

/// Builds the taxonomy set, abundance lookup and biomarker table for one run.
pub fn build_taxonomy_table(
    inputs: LoadedInputs,
    config: &ExportConfig,
    warnings: &mut Vec<String>,
) -> TaxonomyTable {
    match inputs {
        LoadedInputs::Both(source, lefse_output) => TaxonomyTable {
            taxa: source.get_taxonomies(),
            abundances: AbundanceTable::from_source(source.as_ref()),
            lefse_output,
            synthetic_biomarkers: false,
        },
        LoadedInputs::BiomarkersOnly(lefse_output) => {
            let abundances = AbundanceTable::from_pairs(
                lefse_output
                    .taxonomies
                    .iter()
                    .filter_map(|t| Some((t.clone(), lefse_output.get(t)?.mean?))),
            );
            let mut table = TaxonomyTable {
                taxa: Vec::new(),
                abundances,
                lefse_output,
                synthetic_biomarkers: false,
            };

            let scaler = table.size_scaler(config);
            table.taxa = table
                .lefse_output
                .taxonomies
                .iter()
                .filter(|t| scaler.size_for(table.abundances.get(t)) >= config.abundance_threshold)
                .cloned()
                .collect();

            let dropped = table.lefse_output.taxonomies.len() - table.taxa.len();
            if dropped > 0 {
                log::info!(
                    "{} lineages below abundance threshold {} left out of the tree",
                    dropped,
                    config.abundance_threshold
                );
            }
            table
        }
        LoadedInputs::AbundanceOnly(source) => {
            let taxa = source.get_taxonomies();
            let abundances = AbundanceTable::from_source(source.as_ref());
            let lefse_output = synthesize_biomarkers(
                &taxa,
                &abundances,
                config.most_abundant,
                config.least_biomarkers,
                warnings,
            );
            TaxonomyTable {
                taxa,
                abundances,
                lefse_output,
                synthetic_biomarkers: true,
            }
        }
    }
}

/// Derives biomarkers from abundances alone.
///
/// Takes the `most_abundant` multi-rank lineages, finds the shallowest level where
/// at least `least_biomarkers` distinct rank names occur among them and turns each
/// of those names into a biomarker.
pub fn synthesize_biomarkers(
    taxa: &[String],
    abundances: &AbundanceTable,
    most_abundant: usize,
    least_biomarkers: usize,
    warnings: &mut Vec<String>,
) -> LefseOutput {
    let mut candidates: Vec<(&String, f64)> = taxa
        .iter()
        .filter(|t| taxonomy_level(t) > 1)
        .filter_map(|t| Some((t, abundances.get(t)?)))
        .collect();
    // stable: ties keep tree order
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(most_abundant);

    let mut output = LefseOutput::default();
    if candidates.is_empty() {
        warnings.push("no multi-rank lineages to derive biomarkers from".to_string());
        return output;
    }

    let min_level = candidates
        .iter()
        .map(|(t, _)| taxonomy_level(t))
        .min()
        .unwrap_or(1);

    let mut biomarkers: Vec<&str> = Vec::new();
    for level in 1..=min_level {
        biomarkers.clear();
        for (t, _) in &candidates {
            if let Some(rank) = t.split(RANK_SEPARATOR).nth(level - 1) {
                if !biomarkers.contains(&rank) {
                    biomarkers.push(rank);
                }
            }
        }
        if biomarkers.len() >= least_biomarkers {
            log::info!("using {} level-{} clades as biomarkers", biomarkers.len(), level);
            break;
        }
        if level == min_level {
            warnings.push(format!(
                "only {} distinct clades among the {} most abundant lineages (wanted {})",
                biomarkers.len(),
                candidates.len(),
                least_biomarkers
            ));
        }
    }

    for (t, abundance) in &candidates {
        let tag = biomarkers.iter().find(|bk| t.contains(**bk)).map(|bk| bk.to_string());
        output.insert(
            (*t).clone(),
            BiomarkerRecord {
                effect_size: Some(SYNTHETIC_EFFECT_SIZE),
                biomarker: tag,
                mean: Some(*abundance),
                p_value: None,
            },
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lefse::parse_lefse_line;

    fn matrix(rows: &[(&str, f64)]) -> Box<dyn AbundanceSource> {
        Box::new(AbundanceMatrix::from_rows(
            rows.iter().map(|(t, a)| (t.to_string(), vec![*a])),
        ))
    }

    fn lefse(lines: &[&str]) -> LefseOutput {
        let mut out = LefseOutput::default();
        for l in lines {
            let (t, r) = parse_lefse_line(l).unwrap();
            out.insert(t, r);
        }
        out
    }

    #[test]
    fn test_abundance_only_max_and_sizes() {
        let cfg = ExportConfig::default();
        let mut warnings = Vec::new();
        let table = build_taxonomy_table(
            LoadedInputs::AbundanceOnly(matrix(&[("A|B|C", 10.0), ("A|B|D", 90.0)])),
            &cfg,
            &mut warnings,
        );
        assert_eq!(table.taxa, vec!["A.B.C", "A.B.D"]);
        assert_eq!(table.abundances.max_abundance(), Some(90.0));

        let scaler = table.size_scaler(&cfg);
        assert!(
            scaler.size_for(table.abundances.get("A.B.D"))
                > scaler.size_for(table.abundances.get("A.B.C"))
        );
        assert!(table.synthetic_biomarkers);
    }

    #[test]
    fn test_biomarkers_only_filters_by_scaled_abundance() {
        let cfg = ExportConfig {
            abundance_threshold: 100.0,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let table = build_taxonomy_table(
            LoadedInputs::BiomarkersOnly(lefse(&[
                "A\t100\tg1\t3.0\t0.01",
                "A.B\t1\t\t\t-",
                "A.C\t60\tg2\t2.0\t0.02",
            ])),
            &cfg,
            &mut warnings,
        );
        // 20 + 200 ln(1.01) ~ 22 is dropped, 20 + 200 ln(1.6) ~ 114 is kept
        assert_eq!(table.taxa, vec!["A", "A.C"]);
        assert_eq!(table.lefse_output.taxonomies.len(), 3);
    }

    #[test]
    fn test_both_uses_abundance_taxa() {
        let mut warnings = Vec::new();
        let table = build_taxonomy_table(
            LoadedInputs::Both(
                matrix(&[("A|B", 5.0), ("A|C", 1.0)]),
                lefse(&["A.B\t5\tg1\t3.0\t0.01"]),
            ),
            &ExportConfig::default(),
            &mut warnings,
        );
        assert_eq!(table.taxa, vec!["A.B", "A.C"]);
        assert_eq!(table.lefse_output.biomarkers, vec!["g1"]);
        assert!(!table.synthetic_biomarkers);
    }

    #[test]
    fn test_synthesize_biomarkers_picks_shallowest_level() {
        let taxa: Vec<String> = ["K.P1.C1", "K.P1.C2", "K.P2.C3", "K.P3.C4", "K", "K.P4.C5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let abundances = AbundanceTable::from_pairs(vec![
            ("K.P1.C1".to_string(), 50.0),
            ("K.P1.C2".to_string(), 40.0),
            ("K.P2.C3".to_string(), 30.0),
            ("K.P3.C4".to_string(), 20.0),
            ("K".to_string(), 500.0),
            ("K.P4.C5".to_string(), 1.0),
        ]);
        let mut warnings = Vec::new();
        let out = synthesize_biomarkers(&taxa, &abundances, 4, 3, &mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(out.biomarkers, vec!["P1", "P2", "P3"]);
        assert_eq!(out.taxonomies, vec!["K.P1.C1", "K.P1.C2", "K.P2.C3", "K.P3.C4"]);
        let r = out.get("K.P1.C2").unwrap();
        assert_eq!(r.biomarker.as_deref(), Some("P1"));
        assert_eq!(r.effect_size, Some(SYNTHETIC_EFFECT_SIZE));
        assert_eq!(r.mean, Some(40.0));
    }

    #[test]
    fn test_synthesize_biomarkers_not_enough_clades() {
        let taxa = vec!["K.P1".to_string(), "K.P2".to_string()];
        let abundances =
            AbundanceTable::from_pairs(vec![("K.P1".to_string(), 2.0), ("K.P2".to_string(), 1.0)]);
        let mut warnings = Vec::new();
        let out = synthesize_biomarkers(&taxa, &abundances, 10, 3, &mut warnings);
        assert_eq!(warnings.len(), 1);
        assert_eq!(out.biomarkers, vec!["P1", "P2"]);
    }
}
