// src/clade_size.rs

/// Logarithmic marker size: `min + max * ln(1 + abundance / max_abundance)`.
///
/// Returns `None` when `max_abundance` is not strictly positive. Abundances are
/// clamped to `[0, max_abundance]`.
pub fn scale_clade_size(min: f64, max: f64, abundance: f64, max_abundance: f64) -> Option<f64> {
    if !(max_abundance > 0.0) || !max_abundance.is_finite() {
        return None;
    }
    let abundance = abundance.clamp(0.0, max_abundance);
    Some(min + max * (1.0 + abundance / max_abundance).ln())
}

/// Clade sizes for one run: bounds, fallback and the abundance maximum.
#[derive(Debug, Clone, Copy)]
pub struct CladeSizeScaler {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub max_abundance: Option<f64>,
}

impl CladeSizeScaler {
    pub fn size_for(&self, abundance: Option<f64>) -> f64 {
        match (abundance, self.max_abundance) {
            (Some(a), Some(max_a)) => {
                scale_clade_size(self.min, self.max, a, max_a).unwrap_or(self.default)
            }
            _ => self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_clade_size() {
        let s = scale_clade_size(20.0, 200.0, 50.0, 100.0).unwrap();
        assert!((s - (20.0 + 200.0 * 1.5f64.ln())).abs() < 1e-9);
        assert!((s - 101.09).abs() < 0.01);

        assert_eq!(scale_clade_size(20.0, 200.0, 0.0, 100.0), Some(20.0));
        assert_eq!(scale_clade_size(20.0, 200.0, 1.0, 0.0), None);
    }

    #[test]
    fn test_negative_abundance_clamped() {
        assert_eq!(scale_clade_size(20.0, 200.0, -5.0, 100.0), Some(20.0));
        assert_eq!(scale_clade_size(20.0, 200.0, -500.0, 100.0), Some(20.0));
    }

    #[test]
    fn test_scaler_fallback() {
        let scaler = CladeSizeScaler {
            min: 20.0,
            max: 200.0,
            default: 10.0,
            max_abundance: Some(90.0),
        };
        assert_eq!(scaler.size_for(None), 10.0);
        assert!(scaler.size_for(Some(90.0)) > scaler.size_for(Some(10.0)));

        let empty = CladeSizeScaler { max_abundance: None, ..scaler };
        assert_eq!(empty.size_for(Some(5.0)), 10.0);
    }
}
