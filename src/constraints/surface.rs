//! Surface-property n-sigma box.
//!
//! Keeps only models whose surface properties lie strictly inside
//! `observed ± n·σ` for every observed quantity. Teff is observed linearly but
//! the grid stores `logTeff`, so the Teff bounds are taken in log10.

use tracing::debug;

use crate::domain::{Measurement, ModelResult, SurfaceObservations, SurfaceProperties};

/// Open interval `(low, high)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub low: f64,
    pub high: f64,
}

impl Interval {
    fn around(m: Measurement, n_sigma: f64) -> Self {
        Self {
            low: m.value - n_sigma * m.error,
            high: m.value + n_sigma * m.error,
        }
    }

    fn log10(self) -> Self {
        Self {
            low: if self.low > 0.0 { self.low.log10() } else { f64::NEG_INFINITY },
            high: self.high.log10(),
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        v > self.low && v < self.high
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceBox {
    pub log_teff: Option<Interval>,
    pub logg: Option<Interval>,
    pub log_l: Option<Interval>,
}

impl SurfaceBox {
    pub fn from_observations(observed: &SurfaceObservations, n_sigma: f64) -> Self {
        Self {
            log_teff: observed.teff.map(|m| Interval::around(m, n_sigma).log10()),
            logg: observed.logg.map(|m| Interval::around(m, n_sigma)),
            log_l: observed.log_l.map(|m| Interval::around(m, n_sigma)),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.log_teff.is_none() && self.logg.is_none() && self.log_l.is_none()
    }

    /// A constrained quantity the model does not provide rejects the model.
    pub fn admits(&self, surface: &SurfaceProperties) -> bool {
        let check = |interval: Option<Interval>, value: Option<f64>| match (interval, value) {
            (None, _) => true,
            (Some(i), Some(v)) => i.contains(v),
            (Some(_), None) => false,
        };
        check(self.log_teff, surface.log_teff) && check(self.logg, surface.logg) && check(self.log_l, surface.log_l)
    }
}

/// Drop results outside the box; returns the kept results and the number dropped.
pub fn apply_surface_box(results: Vec<ModelResult>, surface_box: &SurfaceBox) -> (Vec<ModelResult>, usize) {
    if surface_box.is_unconstrained() {
        return (results, 0);
    }
    let before = results.len();
    let kept: Vec<ModelResult> = results
        .into_iter()
        .filter(|r| surface_box.admits(&r.surface))
        .collect();
    let dropped = before - kept.len();
    debug!(kept = kept.len(), dropped, "surface box applied");
    (kept, dropped)
}
