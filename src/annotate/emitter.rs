// src/annotate/emitter.rs

use ahash::AHashSet;

use crate::color::{ColorAssignment, EffectScale};
use crate::config::ExportConfig;
use crate::error::Result;
use crate::taxonomy::TaxonomyTable;
use crate::types::{taxonomy_level, AnnotationLine, BiomarkerRecord, RANK_SEPARATOR};

use super::background::ShadingPlan;
use super::{
    KEY_ANNOTATION, KEY_BACKGROUND_COLOR, KEY_CLADE_COLOR, KEY_CLADE_SIZE, KEY_FONT_SIZE,
    LABEL_CLADE_NAME,
};

/// Marker size of the biomarker legend entries.
pub const LEGEND_MARKER_SIZE: &str = "45";

/// Short legend keys: a, b, ... z, aa, ab, ...
fn external_key(mut n: usize) -> String {
    let mut key = Vec::new();
    loop {
        key.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    key.reverse();
    String::from_utf8(key).unwrap_or_default()
}

fn global_settings(config: &ExportConfig) -> Vec<AnnotationLine> {
    let mut lines = Vec::new();
    if let Some(title) = &config.title {
        lines.push(AnnotationLine::global("title", title.clone()));
        lines.push(AnnotationLine::global(
            "title_font_size",
            config.title_font_size.to_string(),
        ));
    }
    lines.push(AnnotationLine::global("clade_separation", "0.5"));
    lines.push(AnnotationLine::global("branch_bracket_depth", "0.65"));
    lines.push(AnnotationLine::global("branch_bracket_width", "0.5"));
    lines.push(AnnotationLine::global(
        "annotation_legend_font_size",
        config.annotation_legend_font_size.to_string(),
    ));
    lines.push(AnnotationLine::global(
        "class_legend_font_size",
        config.class_legend_font_size.to_string(),
    ));
    lines.push(AnnotationLine::global("class_legend_marker_size", "1.5"));
    lines
}

fn legend_entries(colors: &ColorAssignment) -> Result<Vec<AnnotationLine>> {
    let mut lines = Vec::new();
    for label in colors.labels() {
        let name = label.replace('_', " ");
        let rgb = colors.scaled_color_for(label, 1.0)?;
        lines.push(AnnotationLine::node(name.clone(), KEY_ANNOTATION, name.clone()));
        lines.push(AnnotationLine::node(name.clone(), KEY_CLADE_COLOR, rgb));
        lines.push(AnnotationLine::node(name, KEY_CLADE_SIZE, LEGEND_MARKER_SIZE));
    }
    Ok(lines)
}

/// Accumulates lines. Biomarker lines never repeat a `(node, key)` pair; shading
/// lines come before them and are kept as they are.
struct LineSink {
    lines: Vec<AnnotationLine>,
    seen: AHashSet<(String, &'static str)>,
}

impl LineSink {
    fn push(&mut self, line: AnnotationLine) {
        self.lines.push(line);
    }

    fn push_biomarker(&mut self, line: AnnotationLine) {
        if let Some(node) = &line.node {
            if !self.seen.insert((node.clone(), line.key)) {
                return;
            }
        }
        self.lines.push(line);
    }
}

struct BiomarkerContext<'a> {
    config: &'a ExportConfig,
    colors: &'a ColorAssignment,
    effect_scale: Option<EffectScale>,
    next_external_key: usize,
}

impl BiomarkerContext<'_> {
    fn clade_color(
        &self,
        taxonomy: &str,
        label: &str,
        record: &BiomarkerRecord,
        warnings: &mut Vec<String>,
    ) -> Result<String> {
        let Some(scale) = self.effect_scale else {
            return self.colors.scaled_color_for(label, 1.0);
        };
        match scale
            .factor(record.effect_size)
            .and_then(|f| self.colors.scaled_color_for(label, f))
        {
            Ok(c) => Ok(c),
            Err(e) => {
                warnings.push(format!("{}: {}, using the unscaled colour", taxonomy, e));
                self.colors.scaled_color_for(label, 1.0)
            }
        }
    }

    fn lines_for(
        &mut self,
        taxonomy: &str,
        record: &BiomarkerRecord,
        clade_size: f64,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<AnnotationLine>> {
        let Some(label) = record.biomarker.as_deref() else {
            return Ok(Vec::new());
        };
        let color = self.clade_color(taxonomy, label, record, warnings)?;
        let mut lines = vec![AnnotationLine::node(taxonomy, KEY_CLADE_COLOR, color.clone())];

        let level = taxonomy_level(taxonomy);
        let inline = self.config.annotations.contains(&level);
        let external = self.config.external_annotations.contains(&level);
        if clade_size < self.config.abundance_threshold || !(inline || external) {
            return Ok(lines);
        }

        let annotation = if inline {
            LABEL_CLADE_NAME.to_string()
        } else {
            let clade_name = taxonomy.rsplit(RANK_SEPARATOR).next().unwrap_or(taxonomy);
            let key = external_key(self.next_external_key);
            self.next_external_key += 1;
            format!("{}:{}", key, clade_name)
        };
        lines.push(AnnotationLine::node(taxonomy, KEY_BACKGROUND_COLOR, color));
        lines.push(AnnotationLine::node(taxonomy, KEY_ANNOTATION, annotation));
        lines.push(AnnotationLine::node(
            taxonomy,
            KEY_FONT_SIZE,
            self.config.font_size_for_depth(level).to_string(),
        ));
        Ok(lines)
    }
}

/// Produces the ordered annotation lines of one run.
///
/// Problems with single biomarker clades are pushed to `warnings` and the clade
/// is skipped; they never stop the rest of the tree from being annotated.
pub fn emit_annotations(
    table: &TaxonomyTable,
    colors: &ColorAssignment,
    shading: &ShadingPlan,
    config: &ExportConfig,
    warnings: &mut Vec<String>,
) -> Vec<AnnotationLine> {
    let mut sink = LineSink {
        lines: global_settings(config),
        seen: AHashSet::new(),
    };

    match legend_entries(colors) {
        Ok(lines) => lines.into_iter().for_each(|l| sink.push(l)),
        Err(e) => warnings.push(format!("biomarker legend skipped: {}", e)),
    }

    let scaler = table.size_scaler(config);
    let effect_scale = if table.synthetic_biomarkers {
        None
    } else {
        let biomarker_effects = table
            .lefse_output
            .records
            .values()
            .filter(|r| r.is_biomarker())
            .filter_map(|r| r.effect_size);
        table
            .lefse_output
            .max_effect_size()
            .and_then(|max_es| EffectScale::with_max(max_es, biomarker_effects))
    };
    let mut biomarkers = BiomarkerContext {
        config,
        colors,
        effect_scale,
        next_external_key: 0,
    };

    for (idx, taxonomy) in table.taxa.iter().enumerate() {
        let size = scaler.size_for(table.abundances.get(taxonomy));
        sink.push(AnnotationLine::node(taxonomy.as_str(), KEY_CLADE_SIZE, size.to_string()));

        for line in shading.level_lines(idx).iter().chain(shading.clade_lines(idx)) {
            sink.push(line.clone());
        }

        let Some(record) = table.lefse_output.get(taxonomy) else {
            continue;
        };
        match biomarkers.lines_for(taxonomy, record, size, warnings) {
            Ok(lines) => lines.into_iter().for_each(|l| sink.push_biomarker(l)),
            Err(e) => warnings.push(format!("{}: {}", taxonomy, e)),
        }
    }

    sink.lines
}
