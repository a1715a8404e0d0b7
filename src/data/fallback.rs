//! Simulated values for when the statistics API has no data
//!
//! Single values are the catalog baseline, unchanged. Trend series wobble
//! around the baseline with a seasonal component and random jitter, never
//! straying more than `MAX_JITTER` from it.

use rand::Rng;
use std::f64::consts::PI;
use std::sync::Arc;

use super::{Catalog, Indicator};

/// Baseline for keys the catalog does not know
pub const DEFAULT_BASELINE: f64 = 100.0;

/// Largest relative deviation of a series point from the baseline
pub const MAX_JITTER: f64 = 0.10;

/// Amplitude of the yearly seasonal swing, relative to the baseline
const SEASONAL_AMPLITUDE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    catalog: Arc<Catalog>,
}

impl FallbackGenerator {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Baseline value for an indicator reference.
    ///
    /// Unknown or ambiguous references get `DEFAULT_BASELINE`.
    pub fn generate(&self, key: &str) -> f64 {
        self.catalog
            .lookup(key)
            .map(Self::baseline)
            .unwrap_or(DEFAULT_BASELINE)
    }

    pub fn baseline(indicator: &Indicator) -> f64 {
        indicator.fallback
    }

    /// `points` monthly values around the baseline for `key`.
    pub fn series(&self, key: &str, points: usize) -> Vec<f64> {
        let base = self.generate(key);
        let mut rng = rand::thread_rng();
        let noise_band = MAX_JITTER - SEASONAL_AMPLITUDE;

        (0..points)
            .map(|i| {
                let seasonal = (i as f64 / 12.0 * 2.0 * PI).sin() * SEASONAL_AMPLITUDE;
                let noise = rng.gen_range(-noise_band..=noise_band);
                base * (1.0 + seasonal + noise)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> FallbackGenerator {
        FallbackGenerator::new(Arc::new(Catalog::builtin()))
    }

    #[test]
    fn test_generate_is_exact_baseline() {
        let fallback = generator();
        assert_eq!(fallback.generate("hoitotakuu"), 91.0);
        assert_eq!(fallback.generate("palaute"), 4.2);
        assert_eq!(fallback.generate("paivystys.kayntimaara"), 892.0);
        assert_eq!(fallback.generate("hoitotakuu"), fallback.generate("2230"));
    }

    #[test]
    fn test_generate_unknown_uses_default() {
        let fallback = generator();
        assert_eq!(fallback.generate("unknown"), DEFAULT_BASELINE);
        assert_eq!(fallback.generate("kayntimaara"), DEFAULT_BASELINE);
    }

    #[test]
    fn test_series_stays_within_jitter_band() {
        let fallback = generator();
        for _ in 0..20 {
            let series = fallback.series("odotusaika", 12);
            assert_eq!(series.len(), 12);
            for value in series {
                let deviation = (value - 28.0).abs() / 28.0;
                assert!(deviation <= MAX_JITTER + 1e-9, "value {} strays too far", value);
            }
        }
    }

    #[test]
    fn test_series_of_zero_points_is_empty() {
        assert!(generator().series("hoitotakuu", 0).is_empty());
    }
}
