//! Selection of the theoretical sequence that matches one observed segment.
//!
//! Two strategies:
//!
//! - [`select_from_anchor`]: align the theoretical pattern on the mode closest to
//!   one designated observed value.
//! - [`select_longest_sequence`]: match every observed period to its best
//!   chi-square counterpart, keep the longest run of consecutive radial orders,
//!   and align the whole segment on that run.
//!
//! Both work on a single segment. Slots that would fall outside the theoretical
//! pattern come back unmatched.

use tracing::trace;

use crate::domain::{MISMATCH_CHI2, MatchedMode, OrderDirection, SegmentMatch};

use super::spacing::{spacing_chi2, spacing_series};

/// Align `theoretical` so the value closest to the anchor sits at the anchor's slot.
///
/// `observed` is the segment (values in the same observable as `theoretical`),
/// `errors` its errors, and `anchor_slot` the index of the anchor in `observed`.
/// Ties for "closest" go to the lowest theoretical index.
pub fn select_from_anchor(
    theoretical: &[f64],
    orders: &[i32],
    observed: &[f64],
    errors: &[f64],
    anchor_slot: usize,
) -> SegmentMatch {
    let Some(closest) = index_of_min(theoretical.iter().map(|t| (t - observed[anchor_slot]).abs())) else {
        return SegmentMatch {
            modes: observed.iter().map(|&o| MatchedMode::unmatched(o)).collect(),
            spacing_chi2: None,
        };
    };

    let offset = closest as isize - anchor_slot as isize;
    let modes = aligned_modes(theoretical, orders, observed, errors, offset);
    trace!(anchor_slot, closest, offset, "anchored segment");

    SegmentMatch {
        modes,
        spacing_chi2: None,
    }
}

/// Per-observation best match, kept for run bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BestMatch {
    observed_index: usize,
    theoretical_index: usize,
    order: i32,
    chi2: f64,
}

/// Longest consistent chi-square sequence, in period space.
///
/// `periods`/`orders` describe the theoretical pattern in storage order; `direction`
/// is the order direction of the model's full pattern. `observed`/`errors` are the
/// segment's periods and period errors.
///
/// A theoretical pattern shorter than the segment cannot be matched: every slot
/// comes back unmatched with a spacing chi-square of [`MISMATCH_CHI2`].
pub fn select_longest_sequence(
    periods: &[f64],
    orders: &[i32],
    direction: OrderDirection,
    observed: &[f64],
    errors: &[f64],
) -> SegmentMatch {
    if periods.len() < observed.len() {
        return SegmentMatch {
            modes: observed.iter().map(|&o| MatchedMode::unmatched(o)).collect(),
            spacing_chi2: Some(MISMATCH_CHI2),
        };
    }
    if observed.is_empty() {
        return SegmentMatch {
            modes: Vec::new(),
            spacing_chi2: Some(0.0),
        };
    }

    let best: Vec<BestMatch> = observed
        .iter()
        .zip(errors.iter())
        .enumerate()
        .filter_map(|(observed_index, (&period, &error))| {
            let chi2s = periods.iter().map(|&t| ((period - t) / error).powi(2));
            let theoretical_index = index_of_min(chi2s)?;
            Some(BestMatch {
                observed_index,
                theoretical_index,
                order: orders[theoretical_index],
                chi2: ((period - periods[theoretical_index]) / error).powi(2),
            })
        })
        .collect();

    let runs = consecutive_runs(&best, direction);
    let chosen = pick_run(&runs);
    let first = chosen[0];
    trace!(
        runs = runs.len(),
        chosen_len = chosen.len(),
        observed_index = first.observed_index,
        theoretical_index = first.theoretical_index,
        "longest sequence"
    );

    let offset = first.theoretical_index as isize - first.observed_index as isize;
    let modes = aligned_modes(periods, orders, observed, errors, offset);

    let selected: Vec<f64> = modes.iter().map(MatchedMode::theoretical_or_missing).collect();
    let chi2 = spacing_chi2(&spacing_series(observed, Some(errors)), &spacing_series(&selected, None));

    SegmentMatch {
        modes,
        spacing_chi2: Some(chi2),
    }
}

/// Partition best matches into runs of consecutive radial orders.
///
/// Walks pairs `(i, i+1)` and appends entry `i` to the current run; a break in
/// continuity closes the run, and the final pair closes the last run after
/// appending entry `i` a second time. The last best match is therefore never part
/// of a run, and a closing entry counts twice in its run's mean chi-square. The
/// alignment only depends on each run's first entry.
fn consecutive_runs(best: &[BestMatch], direction: OrderDirection) -> Vec<Vec<BestMatch>> {
    if best.len() == 1 {
        return vec![best.to_vec()];
    }

    let last_pair = best.len() - 2;
    let mut runs = Vec::new();
    let mut current = Vec::new();

    for (i, pair) in best.windows(2).enumerate() {
        current.push(pair[0]);
        if !direction.continues(pair[0].order, pair[1].order) {
            runs.push(std::mem::take(&mut current));
        }
        if i == last_pair {
            current.push(pair[0]);
            runs.push(std::mem::take(&mut current));
        }
    }

    runs
}

/// The longest run; among equally long runs, the lowest mean chi-square (first wins ties).
fn pick_run(runs: &[Vec<BestMatch>]) -> &[BestMatch] {
    let longest = runs.iter().map(Vec::len).max().unwrap_or(0);
    let candidates: Vec<&Vec<BestMatch>> = runs.iter().filter(|r| r.len() == longest).collect();

    if candidates.len() == 1 {
        return candidates[0];
    }

    let scores = candidates
        .iter()
        .map(|run| run.iter().map(|m| m.chi2).sum::<f64>() / run.len() as f64);
    let best = index_of_min(scores).unwrap_or(0);
    candidates[best]
}

/// Read the theoretical pattern at `slot + offset` for every observed slot.
fn aligned_modes(
    theoretical: &[f64],
    orders: &[i32],
    observed: &[f64],
    errors: &[f64],
    offset: isize,
) -> Vec<MatchedMode> {
    observed
        .iter()
        .zip(errors.iter())
        .enumerate()
        .map(|(slot, (&obs, &err))| {
            let index = slot as isize + offset;
            if index < 0 || index as usize >= theoretical.len() {
                return MatchedMode::unmatched(obs);
            }
            let value = theoretical[index as usize];
            MatchedMode {
                observed: obs,
                theoretical: Some(value),
                order: Some(orders[index as usize]),
                chi2: Some(((obs - value) / err).powi(2)),
            }
        })
        .collect()
}

/// Index of the first minimum; `None` for an empty iterator. NaN never wins.
fn index_of_min(values: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            None => best = Some((i, v)),
            Some((_, b)) if v < b || (b.is_nan() && !v.is_nan()) => best = Some((i, v)),
            _ => {}
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const THEO: [f64; 8] = [1.0, 0.95, 0.85, 0.82, 0.7, 0.62, 0.55, 0.48];
    const ORDERS: [i32; 8] = [-10, -9, -8, -7, -6, -5, -4, -3];

    fn non_missing_orders(m: &SegmentMatch) -> Vec<i32> {
        m.modes.iter().filter_map(|mode| mode.order).collect()
    }

    #[test]
    fn anchor_aligns_closest_value_on_anchor_slot() {
        let obs = [0.86, 0.81, 0.71];
        let err = [0.01; 3];
        let m = select_from_anchor(&THEO, &ORDERS, &obs, &err, 1);
        assert_eq!(m.theoretical_values(), vec![0.85, 0.82, 0.7]);
        assert_eq!(non_missing_orders(&m), vec![-8, -7, -6]);
    }

    #[test]
    fn anchor_equal_to_theoretical_value_has_zero_residual() {
        let obs = [0.97, 0.85, 0.8];
        let err = [0.01; 3];
        let m = select_from_anchor(&THEO, &ORDERS, &obs, &err, 1);
        assert_eq!(m.modes[1].theoretical, Some(0.85));
        assert_eq!(m.modes[1].chi2, Some(0.0));
    }

    #[test]
    fn anchor_pads_both_ends_with_missing() {
        let obs = [1.2, 1.1, 1.0, 0.9];
        let err = [0.01; 4];
        let m = select_from_anchor(&THEO[..3], &ORDERS[..3], &obs, &err, 2);
        assert_eq!(m.theoretical_values(), vec![-1.0, -1.0, 1.0, 0.95]);

        let obs = [0.86, 0.5, 0.4, 0.3];
        let m = select_from_anchor(&THEO[..3], &ORDERS[..3], &obs, &err, 0);
        assert_eq!(m.theoretical_values(), vec![0.85, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn anchor_tie_goes_to_first_occurrence() {
        let theo = [1.0, 2.0, 3.0];
        let m = select_from_anchor(&theo, &[1, 2, 3], &[1.5], &[0.1], 0);
        assert_eq!(m.theoretical_values(), vec![1.0]);
    }

    #[test]
    fn anchor_on_empty_pattern_is_unmatched() {
        let m = select_from_anchor(&[], &[], &[0.5, 0.4], &[0.01, 0.01], 0);
        assert_eq!(m.matched_count(), 0);
    }

    #[test]
    fn short_theoretical_pattern_is_a_structural_mismatch() {
        let obs = [0.9, 0.8, 0.7];
        let m = select_longest_sequence(&THEO[..2], &ORDERS[..2], OrderDirection::Ascending, &obs, &[0.01; 3]);
        assert_eq!(m.spacing_chi2, Some(1e16));
        assert_eq!(m.theoretical_values(), vec![-1.0; 3]);
        assert!(m.modes.iter().all(|mode| mode.order.is_none()));
    }

    #[test]
    fn exact_pattern_is_recovered() {
        let obs = [0.85, 0.82, 0.7, 0.62];
        let m = select_longest_sequence(&THEO, &ORDERS, OrderDirection::Ascending, &obs, &[0.01; 4]);
        assert_eq!(m.theoretical_values(), obs.to_vec());
        assert_eq!(non_missing_orders(&m), vec![-8, -7, -6, -5]);
        assert_relative_eq!(m.spacing_chi2.unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn run_anchors_alignment_beyond_its_own_length() {
        // 0.83 is matched to 0.82 (order -7) while its neighbours match -9 and -5,
        // so the longest run is the final (0.61, 0.56) stretch.
        let obs = [0.96, 0.83, 0.61, 0.56, 0.49];
        let m = select_longest_sequence(&THEO, &ORDERS, OrderDirection::Ascending, &obs, &[0.01; 5]);
        assert_eq!(m.theoretical_values(), vec![0.82, 0.7, 0.62, 0.55, 0.48]);
    }

    #[test]
    fn equal_length_runs_break_tie_on_mean_chi2() {
        // Pairs (0, 1) and (2, 3) each form a consecutive run of two; the second
        // run matches much more closely and must win.
        let theo = [10.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        let orders: Vec<i32> = (-10..=-1).collect();
        let obs = [9.5, 8.5, 5.001, 4.001, 2.2];
        let m = select_longest_sequence(&theo, &orders, OrderDirection::Ascending, &obs, &[0.1; 5]);
        // Run (5.001 -> 5.0, 4.001 -> 4.0) anchors: observed slot 2 sits on index 5.
        assert_eq!(m.theoretical_values(), vec![7.0, 6.0, 5.0, 4.0, 3.0]);
    }

    #[test]
    fn first_run_wins_when_mean_chi2_ties() {
        let theo = [10.0, 9.0, 8.0, 7.0, 6.0, 5.0];
        let orders: Vec<i32> = (-6..=-1).collect();
        // Both candidate runs have identical (zero) chi-square.
        let obs = [10.0, 8.0, 5.0];
        let m = select_longest_sequence(&theo, &orders, OrderDirection::Ascending, &obs, &[0.1; 3]);
        assert_eq!(m.theoretical_values(), vec![10.0, 9.0, 8.0]);
    }

    #[test]
    fn single_observation_forms_its_own_run() {
        let m = select_longest_sequence(&THEO, &ORDERS, OrderDirection::Ascending, &[0.71], &[0.01]);
        assert_eq!(m.theoretical_values(), vec![0.7]);
        assert_eq!(m.spacing_chi2, Some(0.0));
    }

    #[test]
    fn runs_duplicate_the_closing_entry() {
        let make = |order| BestMatch {
            observed_index: 0,
            theoretical_index: 0,
            order,
            chi2: 1.0,
        };
        // |n| steps down by one: all consecutive for an ascending pattern.
        let best = [make(-5), make(-4), make(-3)];
        let runs = consecutive_runs(&best, OrderDirection::Ascending);
        assert_eq!(runs.len(), 1);
        let orders: Vec<i32> = runs[0].iter().map(|m| m.order).collect();
        assert_eq!(orders, vec![-5, -4, -4]);

        // A break closes the run; the last pair then opens and closes its own.
        let best = [make(-5), make(-2), make(-1)];
        let runs = consecutive_runs(&best, OrderDirection::Ascending);
        let lengths: Vec<usize> = runs.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![1, 2]);
    }

    #[test]
    fn selected_orders_are_consecutive_and_selection_is_repeatable() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let n_theo = rng.gen_range(4..30);
            let start = -rng.gen_range(40..80);
            let orders: Vec<i32> = (0..n_theo).map(|i| start + i).collect();
            let mut period = rng.gen_range(1.5..3.0);
            let theo: Vec<f64> = (0..n_theo)
                .map(|_| {
                    period -= rng.gen_range(0.02..0.08);
                    period
                })
                .collect();

            let n_obs = rng.gen_range(1..=n_theo.min(12) as usize);
            let obs: Vec<f64> = (0..n_obs).map(|i| theo[i] + rng.gen_range(-0.01..0.01)).collect();
            let err = vec![0.005; n_obs];

            let first = select_longest_sequence(&theo, &orders, OrderDirection::Ascending, &obs, &err);
            let again = select_longest_sequence(&theo, &orders, OrderDirection::Ascending, &obs, &err);
            assert_eq!(first, again);

            let matched = non_missing_orders(&first);
            for w in matched.windows(2) {
                assert_eq!(w[1] - w[0], 1);
            }
            assert_eq!(first.len(), n_obs);
        }
    }

    #[test]
    fn descending_orders_form_runs() {
        // Orders -1, -2, ... with periods growing along the storage order.
        let theo = [0.48, 0.55, 0.62, 0.7, 0.82, 0.85, 0.95, 1.0];
        let orders: Vec<i32> = (1..=8).map(|n| -n).collect();
        let obs = [0.49, 0.56, 0.61, 0.83, 0.96];
        let m = select_longest_sequence(&theo, &orders, OrderDirection::Descending, &obs, &[0.01; 5]);

        assert_eq!(m.theoretical_values(), vec![0.48, 0.55, 0.62, 0.7, 0.82]);
        assert_eq!(non_missing_orders(&m), vec![-1, -2, -3, -4, -5]);
        // Spacings 0.07, 0.05, 0.22, 0.13 against 0.07, 0.07, 0.08, 0.12.
        assert_relative_eq!(m.spacing_chi2.unwrap(), 25.125, max_relative = 1e-9);
    }

    #[test]
    fn missing_slot_enters_the_spacing_chi2() {
        // The run anchors slot 0 on -6, so slot 4 falls past order -3.
        let obs = [0.7, 0.62, 0.555, 0.49, 0.30];
        let m = select_longest_sequence(&THEO, &ORDERS, OrderDirection::Ascending, &obs, &[0.01; 5]);

        assert_eq!(m.theoretical_values(), vec![0.7, 0.62, 0.55, 0.48, -1.0]);
        assert_eq!(non_missing_orders(&m), vec![-6, -5, -4, -3]);
        assert_relative_eq!(m.spacing_chi2.unwrap(), 2080.1875, max_relative = 1e-9);
    }

    #[test]
    fn descending_selection_is_consecutive_and_repeatable() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let n_theo = rng.gen_range(4..30);
            let orders: Vec<i32> = (1..=n_theo).map(|n| -n).collect();
            let mut period = rng.gen_range(0.2..0.5);
            let theo: Vec<f64> = (0..n_theo)
                .map(|_| {
                    period += rng.gen_range(0.02..0.08);
                    period
                })
                .collect();

            let n_obs = rng.gen_range(1..=n_theo.min(12) as usize);
            let start = rng.gen_range(0..=theo.len() - n_obs);
            let obs: Vec<f64> = (0..n_obs)
                .map(|i| theo[start + i] + rng.gen_range(-0.005..0.005))
                .collect();
            let err = vec![0.005; n_obs];

            let first = select_longest_sequence(&theo, &orders, OrderDirection::Descending, &obs, &err);
            let again = select_longest_sequence(&theo, &orders, OrderDirection::Descending, &obs, &err);
            assert_eq!(first, again);
            assert_eq!(first.len(), n_obs);

            let matched = non_missing_orders(&first);
            for w in matched.windows(2) {
                assert_eq!(w[1] - w[0], -1);
            }
        }
    }

    #[test]
    fn index_of_min_skips_nan() {
        assert_eq!(index_of_min([f64::NAN, 2.0, 1.0, 1.0]), Some(2));
        assert_eq!(index_of_min(std::iter::empty()), None);
    }
}
