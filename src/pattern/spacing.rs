//! Period spacing series.
//!
//! For g-modes the spacing between periods of consecutive radial orders is close
//! to constant, so comparing spacings (rather than raw periods) measures how well
//! a selected theoretical sequence reproduces the *shape* of the observed pattern.

/// Consecutive period spacings and, if errors were given, their propagated errors.
#[derive(Debug, Clone, PartialEq)]
pub struct SpacingSeries {
    pub spacings: Vec<f64>,
    pub errors: Option<Vec<f64>>,
}

impl SpacingSeries {
    pub fn len(&self) -> usize {
        self.spacings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spacings.is_empty()
    }
}

/// Spacings `|P_i - P_{i+1}|` of an ordered period sequence.
///
/// Errors, when given, must have the same length as `periods` and propagate as
/// `sqrt(σ_i² + σ_{i+1}²)`.
pub fn spacing_series(periods: &[f64], errors: Option<&[f64]>) -> SpacingSeries {
    let spacings = periods.windows(2).map(|w| (w[0] - w[1]).abs()).collect();
    let errors = errors.map(|errs| {
        errs.windows(2)
            .map(|w| (w[0] * w[0] + w[1] * w[1]).sqrt())
            .collect()
    });
    SpacingSeries { spacings, errors }
}

/// Mean squared normalised difference between an observed and a theoretical spacing series.
///
/// Returns 0 when there are no spacings to compare (a single-mode segment).
pub fn spacing_chi2(observed: &SpacingSeries, theoretical: &SpacingSeries) -> f64 {
    let Some(errors) = observed.errors.as_deref() else {
        return 0.0;
    };
    if observed.is_empty() {
        return 0.0;
    }

    let sum: f64 = observed
        .spacings
        .iter()
        .zip(theoretical.spacings.iter())
        .zip(errors.iter())
        .map(|((o, t), e)| ((o - t) / e).powi(2))
        .sum();
    sum / observed.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spacings_and_errors() {
        let s = spacing_series(&[1.0, 0.9, 0.75], Some(&[0.03, 0.04, 0.0]));
        assert_eq!(s.len(), 2);
        assert_relative_eq!(s.spacings[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(s.spacings[1], 0.15, epsilon = 1e-12);
        let errors = s.errors.unwrap();
        assert_relative_eq!(errors[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(errors[1], 0.04, epsilon = 1e-12);
    }

    #[test]
    fn single_period_has_no_spacing() {
        let s = spacing_series(&[1.0], None);
        assert!(s.is_empty());
        assert!(s.errors.is_none());
    }

    #[test]
    fn chi2_is_mean_over_spacings() {
        let obs = spacing_series(&[1.0, 0.9, 0.8], Some(&[0.01, 0.01, 0.01]));
        let thr = spacing_series(&[1.0, 0.9, 0.8], None);
        assert_relative_eq!(spacing_chi2(&obs, &thr), 0.0, epsilon = 1e-12);

        let shifted = spacing_series(&[1.0, 0.9, 0.7], None);
        // Second spacing off by 0.1 with error sqrt(2)*0.01: (0.1/0.01414)^2 = 50, mean 25.
        assert_relative_eq!(spacing_chi2(&obs, &shifted), 25.0, epsilon = 1e-9);
    }
}
