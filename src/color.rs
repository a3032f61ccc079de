// src/color.rs

use ahash::AHashMap;

use crate::error::{ExportError, Result};

/// A colour in HSV space: hue in [0, 360], saturation and value in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Hsv {
    pub const fn new(h: f64, s: f64, v: f64) -> Self {
        Self { h, s, v }
    }
}

/// Biomarker palette, cycled by assignment order.
pub const PALETTE: [Hsv; 7] = [
    Hsv::new(245.0, 90.0, 100.0),
    Hsv::new(125.0, 80.0, 80.0),
    Hsv::new(0.0, 80.0, 100.0),
    Hsv::new(195.0, 100.0, 100.0),
    Hsv::new(150.0, 100.0, 100.0),
    Hsv::new(55.0, 100.0, 100.0),
    Hsv::new(280.0, 80.0, 88.0),
];

/// Neutral gray used for level shading when no colour list is configured.
pub const NEUTRAL_BACKGROUND: Hsv = Hsv::new(0.0, 0.0, 75.0);

fn check_range(what: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if !(min..=max).contains(&value) {
        return Err(ExportError::OutOfRange {
            what,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Standard HSV -> RGB with every component in [0, 1].
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Scales the value of `color` by `factor` and renders it as `#rrggbb`.
///
/// All components are validated before anything is converted.
pub fn scale_color(color: Hsv, factor: f64) -> Result<String> {
    check_range("hue", color.h, 0.0, 360.0)?;
    check_range("saturation", color.s, 0.0, 100.0)?;
    check_range("value", color.v, 0.0, 100.0)?;
    check_range("factor", factor, 0.0, 1.0)?;

    let v = color.v * factor;
    let (r, g, b) = hsv_to_rgb(color.h / 360.0, color.s / 100.0, v / 100.0);
    let channel = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    Ok(format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b)))
}

/// Palette index per biomarker label, by first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ColorAssignment {
    labels: Vec<String>,
    index: AHashMap<String, usize>,
}

impl ColorAssignment {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut assignment = Self::default();
        for label in labels {
            let label = label.into();
            if !assignment.index.contains_key(&label) {
                let idx = assignment.labels.len() % PALETTE.len();
                assignment.index.insert(label.clone(), idx);
                assignment.labels.push(label);
            }
        }
        assignment
    }

    /// Labels in assignment order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn palette_index(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn color_for(&self, label: &str) -> Option<Hsv> {
        self.palette_index(label).map(|i| PALETTE[i])
    }

    /// Palette colour of `label` with its value scaled by `factor`.
    /// Unknown labels render as the unscaled neutral colour.
    pub fn scaled_color_for(&self, label: &str, factor: f64) -> Result<String> {
        scale_color(self.color_for(label).unwrap_or(NEUTRAL_BACKGROUND), factor)
    }
}

/// Normalization constants for mapping effect sizes to colour intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectScale {
    pub max_effect_size: f64,
    pub max_log_effect_size: f64,
}

impl EffectScale {
    /// `None` when there is nothing to scale: no positive effect sizes, or all equal.
    pub fn from_effect_sizes<I: IntoIterator<Item = f64>>(effect_sizes: I) -> Option<Self> {
        let values: Vec<f64> = effect_sizes.into_iter().collect();
        let max_effect_size = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NAN, f64::max);
        Self::with_max(max_effect_size, values)
    }

    /// Normalizes against `max_effect_size`, which may come from rows outside
    /// `biomarker_effect_sizes`. The log spread is taken over the biomarkers only.
    pub fn with_max<I: IntoIterator<Item = f64>>(
        max_effect_size: f64,
        biomarker_effect_sizes: I,
    ) -> Option<Self> {
        if !(max_effect_size > 0.0) || !max_effect_size.is_finite() {
            return None;
        }

        let max_log_effect_size = biomarker_effect_sizes
            .into_iter()
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|es| (es / max_effect_size).ln().abs())
            .fold(0.0, f64::max);
        if !(max_log_effect_size > 0.0) || !max_log_effect_size.is_finite() {
            return None;
        }

        Some(Self {
            max_effect_size,
            max_log_effect_size,
        })
    }

    /// `|ln(es / max_es)| / max_log_es`, validated to lie in [0, 1].
    pub fn factor(&self, effect_size: Option<f64>) -> Result<f64> {
        let factor = match effect_size {
            Some(es) => (es / self.max_effect_size).ln().abs() / self.max_log_effect_size,
            None => f64::NAN,
        };
        check_range("factor", factor, 0.0, 1.0)?;
        Ok(factor)
    }
}

fn parse_color_entry(entry: &str) -> Result<String> {
    let entry = entry.trim();
    if let Some(hex) = entry.strip_prefix('#') {
        if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(format!("#{}", hex.to_ascii_lowercase()));
        }
        return Err(ExportError::Configuration(format!(
            "'{}' is not a #rrggbb colour",
            entry
        )));
    }

    let parts: Vec<f64> = entry
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| {
            ExportError::Configuration(format!("'{}' is neither a hex nor an HSV colour", entry))
        })?;
    if parts.len() != 3 {
        return Err(ExportError::Configuration(format!(
            "'{}' must be an h,s,v triple",
            entry
        )));
    }
    scale_color(Hsv::new(parts[0], parts[1], parts[2]), 1.0)
}

/// Parses a colour list: one entry per line (or `;`-separated), each entry `#rrggbb` or `h,s,v`.
pub fn parse_color_list(text: &str) -> Result<Vec<String>> {
    text.split(|c| c == '\n' || c == ';')
        .filter(|e| !e.trim().is_empty())
        .map(parse_color_entry)
        .collect()
}
