//! Observed and theoretical pulsation patterns.

use thiserror::Error;

use super::types::{GAP_MARKER, MISSING_VALUE, Observable, OrderDirection};

/// Errors raised while building or matching patterns.
///
/// All of them describe a configuration/input problem, never a per-model data
/// condition (those are reported through sentinels instead).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    #[error("observed values ({values}) and errors ({errors}) have different lengths")]
    LengthMismatch { values: usize, errors: usize },
    #[error("slot {slot}: gap marker in only one of value ({value}) and error ({error})")]
    GapMismatch { slot: usize, value: f64, error: f64 },
    #[error("slot {slot}: observed value {value} is not a positive finite number")]
    InvalidValue { slot: usize, value: f64 },
    #[error("slot {slot}: observed error {error} is not a positive finite number")]
    InvalidError { slot: usize, error: f64 },
    #[error("observed pattern contains no pulsations")]
    Empty,
    #[error("{anchors} anchor pulsation(s) supplied for {segments} pattern segment(s)")]
    AnchorCount { anchors: usize, segments: usize },
    #[error("anchor pulsation {anchor} is not one of the observed values of segment {segment}")]
    AnchorNotObserved { anchor: f64, segment: usize },
}

/// The observed pattern: one value and error per slot, gaps marked by [`GAP_MARKER`].
///
/// Values are ordered increasing in frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedPattern {
    observable: Observable,
    values: Vec<f64>,
    errors: Vec<f64>,
}

impl ObservedPattern {
    pub fn new(observable: Observable, values: Vec<f64>, errors: Vec<f64>) -> Result<Self, PatternError> {
        if values.len() != errors.len() {
            return Err(PatternError::LengthMismatch {
                values: values.len(),
                errors: errors.len(),
            });
        }

        for (slot, (&value, &error)) in values.iter().zip(errors.iter()).enumerate() {
            let value_gap = value == GAP_MARKER;
            let error_gap = error == GAP_MARKER;
            if value_gap != error_gap {
                return Err(PatternError::GapMismatch { slot, value, error });
            }
            if value_gap {
                continue;
            }
            if !(value.is_finite() && value > 0.0) {
                return Err(PatternError::InvalidValue { slot, value });
            }
            if !(error.is_finite() && error > 0.0) {
                return Err(PatternError::InvalidError { slot, error });
            }
        }

        if values.iter().all(|&v| v == GAP_MARKER) {
            return Err(PatternError::Empty);
        }

        Ok(Self {
            observable,
            values,
            errors,
        })
    }

    pub fn observable(&self) -> Observable {
        self.observable
    }

    /// Number of slots, gaps included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Slot values, with [`GAP_MARKER`] at gaps.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    pub fn is_gap(&self, slot: usize) -> bool {
        self.values.get(slot).is_some_and(|&v| v == GAP_MARKER)
    }

    pub fn gap_count(&self) -> usize {
        self.values.iter().filter(|&&v| v == GAP_MARKER).count()
    }

    /// Split at gap markers.
    ///
    /// A pattern with `k` gaps always yields `k + 1` segments; a gap in the first or
    /// last slot, or two gaps in a row, yields an empty segment.
    pub fn segments(&self) -> Vec<ObservedSegment> {
        let mut out = Vec::with_capacity(self.gap_count() + 1);
        let mut current = ObservedSegment::starting_at(0);

        for (slot, (&value, &error)) in self.values.iter().zip(self.errors.iter()).enumerate() {
            if value == GAP_MARKER {
                out.push(std::mem::replace(&mut current, ObservedSegment::starting_at(slot + 1)));
            } else {
                current.values.push(value);
                current.errors.push(error);
            }
        }
        out.push(current);
        out
    }

    /// Output column labels, one per slot: `f<slot>` (1-based) or `f_missing` at gaps.
    pub fn slot_labels(&self) -> Vec<String> {
        (0..self.len())
            .map(|slot| {
                if self.is_gap(slot) {
                    "f_missing".to_string()
                } else {
                    format!("f{}", slot + 1)
                }
            })
            .collect()
    }
}

/// One contiguous, gap-free slice of an [`ObservedPattern`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedSegment {
    /// Slot index of the first value in the full pattern.
    pub start: usize,
    pub values: Vec<f64>,
    pub errors: Vec<f64>,
}

impl ObservedSegment {
    fn starting_at(start: usize) -> Self {
        Self {
            start,
            values: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value with the highest frequency: the maximum frequency, or the minimum period.
    pub fn highest_frequency_value(&self, observable: Observable) -> Option<f64> {
        let values = self.values.iter().copied();
        match observable {
            Observable::Frequency => values.reduce(f64::max),
            Observable::Period => values.reduce(f64::min),
        }
    }

    /// Values converted to periods, with errors propagated as `σ_P = σ_f / f²`.
    pub fn as_periods(&self, observable: Observable) -> (Vec<f64>, Vec<f64>) {
        match observable {
            Observable::Period => (self.values.clone(), self.errors.clone()),
            Observable::Frequency => self
                .values
                .iter()
                .zip(self.errors.iter())
                .map(|(&f, &e)| (1.0 / f, e / (f * f)))
                .unzip(),
        }
    }
}

/// A model's theoretical pattern: frequencies keyed by radial order, in the grid's column order.
///
/// Orders with no computed frequency are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct TheoreticalPattern {
    orders: Vec<i32>,
    frequencies: Vec<f64>,
    direction: OrderDirection,
}

impl TheoreticalPattern {
    /// Build from `(order, frequency)` pairs, dropping non-finite frequencies.
    pub fn from_modes(modes: impl IntoIterator<Item = (i32, f64)>) -> Self {
        let (orders, frequencies): (Vec<i32>, Vec<f64>) =
            modes.into_iter().filter(|(_, f)| f.is_finite()).unzip();
        let direction = OrderDirection::from_orders(&orders);
        Self {
            orders,
            frequencies,
            direction,
        }
    }

    pub fn orders(&self) -> &[i32] {
        &self.orders
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn periods(&self) -> Vec<f64> {
        self.frequencies.iter().map(|f| 1.0 / f).collect()
    }

    /// Values in the requested observable.
    pub fn values(&self, observable: Observable) -> Vec<f64> {
        match observable {
            Observable::Frequency => self.frequencies.clone(),
            Observable::Period => self.periods(),
        }
    }

    /// Frequency stored for `order`, if that mode is present.
    pub fn frequency_of(&self, order: i32) -> Option<f64> {
        self.orders
            .iter()
            .position(|&o| o == order)
            .map(|i| self.frequencies[i])
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Same orders, new frequencies (e.g. after rotation rescaling).
    ///
    /// `None` unless there is exactly one frequency per order.
    pub fn with_frequencies(&self, frequencies: Vec<f64>) -> Option<Self> {
        if frequencies.len() != self.frequencies.len() {
            return None;
        }
        Some(Self {
            orders: self.orders.clone(),
            frequencies,
            direction: self.direction,
        })
    }

    /// Keep only modes strictly above `frequency`. The direction is preserved.
    pub fn above_frequency(&self, frequency: f64) -> Self {
        let (orders, frequencies) = self
            .orders
            .iter()
            .zip(self.frequencies.iter())
            .filter(|&(_, &f)| f > frequency)
            .map(|(&o, &f)| (o, f))
            .unzip();
        Self {
            orders,
            frequencies,
            direction: self.direction,
        }
    }
}

/// One observed value paired with its selected theoretical counterpart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedMode {
    pub observed: f64,
    /// None when the theoretical pattern ran out before this slot.
    pub theoretical: Option<f64>,
    pub order: Option<i32>,
    /// `((observed - theoretical) / error)^2` for this slot.
    pub chi2: Option<f64>,
}

impl MatchedMode {
    pub fn unmatched(observed: f64) -> Self {
        Self {
            observed,
            theoretical: None,
            order: None,
            chi2: None,
        }
    }

    /// Theoretical value, or [`MISSING_VALUE`].
    pub fn theoretical_or_missing(&self) -> f64 {
        self.theoretical.unwrap_or(MISSING_VALUE)
    }
}

/// The selected theoretical sequence for one observed segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMatch {
    /// One entry per observed value of the segment, same order.
    pub modes: Vec<MatchedMode>,
    /// Period spacing chi-square of the whole segment (longest-sequence strategy only).
    pub spacing_chi2: Option<f64>,
}

impl SegmentMatch {
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn theoretical_values(&self) -> Vec<f64> {
        self.modes.iter().map(MatchedMode::theoretical_or_missing).collect()
    }

    /// Number of observed values that found a theoretical counterpart.
    pub fn matched_count(&self) -> usize {
        self.modes.iter().filter(|m| m.theoretical.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(values: &[f64], errors: &[f64]) -> ObservedPattern {
        ObservedPattern::new(Observable::Period, values.to_vec(), errors.to_vec()).unwrap()
    }

    #[test]
    fn segments_split_at_gaps() {
        let p = pattern(&[0.9, 0.8, 0.0, 0.6, 0.5], &[0.01, 0.01, 0.0, 0.01, 0.01]);
        let segments = p.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].values, vec![0.9, 0.8]);
        assert_eq!(segments[1].values, vec![0.6, 0.5]);
        assert_eq!(segments[1].start, 3);
        assert_eq!(p.slot_labels(), vec!["f1", "f2", "f_missing", "f4", "f5"]);
    }

    #[test]
    fn boundary_and_repeated_gaps_give_empty_segments() {
        let p = pattern(&[0.0, 0.9, 0.0, 0.0, 0.5], &[0.0, 0.01, 0.0, 0.0, 0.01]);
        let lengths: Vec<usize> = p.segments().iter().map(ObservedSegment::len).collect();
        assert_eq!(lengths, vec![0, 1, 0, 1]);
        // One implicit gap between consecutive segments restores the slot count.
        assert_eq!(lengths.iter().sum::<usize>() + lengths.len() - 1, p.len());
    }

    #[test]
    fn gap_markers_must_coincide() {
        let err = ObservedPattern::new(Observable::Period, vec![0.9, 0.0], vec![0.01, 0.02]).unwrap_err();
        assert!(matches!(err, PatternError::GapMismatch { slot: 1, .. }));
    }

    #[test]
    fn rejects_length_mismatch_and_empty() {
        assert!(matches!(
            ObservedPattern::new(Observable::Period, vec![0.9], vec![]),
            Err(PatternError::LengthMismatch { .. })
        ));
        assert_eq!(
            ObservedPattern::new(Observable::Period, vec![0.0], vec![0.0]),
            Err(PatternError::Empty)
        );
    }

    #[test]
    fn frequency_segments_convert_to_periods() {
        let p = ObservedPattern::new(Observable::Frequency, vec![1.0, 2.0], vec![0.1, 0.2]).unwrap();
        let (periods, errors) = p.segments()[0].as_periods(Observable::Frequency);
        assert_eq!(periods, vec![1.0, 0.5]);
        assert!((errors[1] - 0.05).abs() < 1e-15);
    }

    #[test]
    fn theoretical_pattern_drops_missing_modes() {
        let t = TheoreticalPattern::from_modes([(-1, 2.0), (-2, f64::NAN), (-3, 1.0)]);
        assert_eq!(t.orders(), &[-1, -3]);
        assert_eq!(t.periods(), vec![0.5, 1.0]);
    }

    #[test]
    fn above_frequency_keeps_direction() {
        let t = TheoreticalPattern::from_modes([(-1, 3.0), (-2, 2.0), (-3, 1.0)]);
        let kept = t.above_frequency(1.5);
        assert_eq!(kept.orders(), &[-1, -2]);
        assert_eq!(kept.direction(), OrderDirection::Descending);
        assert!(t.above_frequency(3.0).is_empty());
    }

    #[test]
    fn with_frequencies_requires_one_value_per_order() {
        let t = TheoreticalPattern::from_modes([(-1, 3.0), (-2, 2.0)]);
        let shifted = t.with_frequencies(vec![3.5, 2.5]).unwrap();
        assert_eq!(shifted.orders(), t.orders());
        assert_eq!(shifted.direction(), OrderDirection::Descending);
        assert!(t.with_frequencies(vec![3.5]).is_none());
    }
}
