//! Pattern assembly across observed segments.
//!
//! Takes one model's theoretical pattern and produces the full selected pattern
//! for the (possibly interrupted) observed pattern:
//!
//! - each segment is matched on its own, with the run's [`BuildStrategy`]
//! - a later segment never sees modes at or below the highest frequency claimed
//!   by an earlier one
//! - segment outputs are joined with [`GAP_MARKER`] so gap slots line up with the
//!   observation table

use tracing::trace;

use crate::domain::{
    BuildStrategy, GAP_MARKER, MatchedMode, Observable, ObservedPattern, ObservedSegment, PatternError,
    SegmentMatch, SelectionMethod, TheoreticalPattern,
};

use super::selector::{select_from_anchor, select_longest_sequence};

impl BuildStrategy {
    /// Resolve the CLI method against the observed segmentation.
    ///
    /// Anchors are only consulted for `highest-amplitude`; there must be exactly one
    /// per segment, and each must be one of its segment's observed values (empty
    /// segments accept any anchor).
    pub fn resolve(
        method: SelectionMethod,
        anchors: &[f64],
        segments: &[ObservedSegment],
    ) -> Result<Self, PatternError> {
        match method {
            SelectionMethod::HighestFrequency => Ok(BuildStrategy::AnchorHighestFrequency),
            SelectionMethod::ChisqLongestSequence => Ok(BuildStrategy::ChiSquareLongestSequence),
            SelectionMethod::HighestAmplitude => {
                if anchors.len() != segments.len() {
                    return Err(PatternError::AnchorCount {
                        anchors: anchors.len(),
                        segments: segments.len(),
                    });
                }
                for (segment_index, (segment, &anchor)) in segments.iter().zip(anchors.iter()).enumerate() {
                    if !segment.is_empty() && !segment.values.contains(&anchor) {
                        return Err(PatternError::AnchorNotObserved {
                            anchor,
                            segment: segment_index,
                        });
                    }
                }
                Ok(BuildStrategy::AnchorHighestAmplitude {
                    anchors: anchors.to_vec(),
                })
            }
        }
    }
}

/// Selected theoretical pattern for one model, one value per observed slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPattern {
    /// Matched values, [`GAP_MARKER`] at gaps, `-1` where the pattern ran out.
    pub values: Vec<f64>,
    pub segments: Vec<SegmentMatch>,
}

impl AssembledPattern {
    /// `selected - observed` per slot; zero at gaps.
    pub fn residuals(&self, observed: &ObservedPattern) -> Vec<f64> {
        self.values
            .iter()
            .zip(observed.values().iter())
            .map(|(s, o)| s - o)
            .collect()
    }
}

/// Matches theoretical patterns against one fixed observed pattern.
///
/// Segmentation and anchor positions are resolved once at construction and
/// reused for every model row.
#[derive(Debug, Clone)]
pub struct PatternAssembler {
    observed: ObservedPattern,
    segments: Vec<ObservedSegment>,
    strategy: BuildStrategy,
    anchor_slots: Vec<Option<usize>>,
}

impl PatternAssembler {
    pub fn new(
        observed: ObservedPattern,
        method: SelectionMethod,
        anchors: &[f64],
    ) -> Result<Self, PatternError> {
        let segments = observed.segments();
        let strategy = BuildStrategy::resolve(method, anchors, &segments)?;
        let anchor_slots = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| anchor_slot(&strategy, observed.observable(), i, segment))
            .collect();

        Ok(Self {
            observed,
            segments,
            strategy,
            anchor_slots,
        })
    }

    pub fn observed(&self) -> &ObservedPattern {
        &self.observed
    }

    pub fn segments(&self) -> &[ObservedSegment] {
        &self.segments
    }

    pub fn strategy(&self) -> &BuildStrategy {
        &self.strategy
    }

    /// Select and join the theoretical sequence of every segment.
    pub fn assemble(&self, pattern: &TheoreticalPattern) -> AssembledPattern {
        let mut values = Vec::with_capacity(self.observed.len());
        let mut matches = Vec::with_capacity(self.segments.len());
        let mut claimed: Option<f64> = None;

        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                values.push(GAP_MARKER);
            }

            let remaining = claimed.map(|f| pattern.above_frequency(f));
            let available = remaining.as_ref().unwrap_or(pattern);

            let matched = self.select_segment(i, segment, available, pattern);
            trace!(
                segment = i,
                observed = segment.len(),
                available = available.len(),
                matched = matched.matched_count(),
                spacing_chi2 = ?matched.spacing_chi2,
                "segment selected"
            );

            // Claimed modes are looked up by order so the threshold is the stored
            // frequency, not one recovered through a period round trip.
            for order in matched.modes.iter().filter_map(|m| m.order) {
                if let Some(frequency) = pattern.frequency_of(order) {
                    claimed = Some(claimed.map_or(frequency, |c| c.max(frequency)));
                }
            }

            values.extend(matched.theoretical_values());
            matches.push(matched);
        }

        AssembledPattern {
            values,
            segments: matches,
        }
    }

    fn select_segment(
        &self,
        index: usize,
        segment: &ObservedSegment,
        available: &TheoreticalPattern,
        full: &TheoreticalPattern,
    ) -> SegmentMatch {
        if segment.is_empty() {
            return SegmentMatch {
                modes: Vec::new(),
                spacing_chi2: None,
            };
        }

        let observable = self.observed.observable();
        match (&self.strategy, self.anchor_slots[index]) {
            (BuildStrategy::ChiSquareLongestSequence, _) => {
                let (periods, errors) = segment.as_periods(observable);
                let matched = select_longest_sequence(
                    &available.periods(),
                    available.orders(),
                    full.direction(),
                    &periods,
                    &errors,
                );
                match observable {
                    Observable::Period => matched,
                    Observable::Frequency => to_frequency_match(matched, segment),
                }
            }
            (_, Some(slot)) => select_from_anchor(
                &available.values(observable),
                available.orders(),
                &segment.values,
                &segment.errors,
                slot,
            ),
            (_, None) => SegmentMatch {
                modes: segment.values.iter().map(|&v| MatchedMode::unmatched(v)).collect(),
                spacing_chi2: None,
            },
        }
    }
}

/// Slot of the anchor inside its segment, for the anchor strategies.
fn anchor_slot(
    strategy: &BuildStrategy,
    observable: Observable,
    index: usize,
    segment: &ObservedSegment,
) -> Option<usize> {
    let anchor = match strategy {
        BuildStrategy::AnchorHighestAmplitude { anchors } => anchors.get(index).copied(),
        BuildStrategy::AnchorHighestFrequency => segment.highest_frequency_value(observable),
        BuildStrategy::ChiSquareLongestSequence => None,
    }?;
    segment.values.iter().position(|&v| v == anchor)
}

/// Re-express a period-space match in frequencies; per-slot chi-square stays as computed.
fn to_frequency_match(matched: SegmentMatch, segment: &ObservedSegment) -> SegmentMatch {
    let modes = matched
        .modes
        .into_iter()
        .zip(segment.values.iter())
        .map(|(mode, &observed)| MatchedMode {
            observed,
            theoretical: mode.theoretical.map(|p| 1.0 / p),
            ..mode
        })
        .collect();
    SegmentMatch {
        modes,
        spacing_chi2: matched.spacing_chi2,
    }
}
