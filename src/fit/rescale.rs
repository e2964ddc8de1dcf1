//! Rotation rescaling of theoretical frequencies.
//!
//! Grid patterns are computed at a native rotation rate. To compare them with
//! an observation at a different (trial) rotation, the frequencies are shifted
//! to that trial rate before pattern selection.
//!
//! [`FrameShift`] is a first-order shift of the advective `m·Ω` term only. It is
//! not a rescaling under the traditional approximation of rotation (TAR): the
//! co-rotating frequencies do not change with the trial rate. A TAR rescaler
//! plugs in through [`RotationRescaler`].

/// Maps frequencies computed at `native_rotation` to `trial_rotation`.
///
/// Implementations must return a vector of the same length and must be the
/// identity when the two rotation rates are equal.
pub trait RotationRescaler: Send + Sync {
    fn rescale(&self, frequencies: &[f64], native_rotation: f64, trial_rotation: f64) -> Vec<f64>;
}

/// Inertial-frame shift `f' = f + m (Ω_trial - Ω_native)`.
///
/// Only the advective term is rescaled; the co-rotating frequencies are taken
/// as fixed. This is not a TAR rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShift {
    pub azimuthal_order: i32,
}

impl RotationRescaler for FrameShift {
    fn rescale(&self, frequencies: &[f64], native_rotation: f64, trial_rotation: f64) -> Vec<f64> {
        let shift = self.azimuthal_order as f64 * (trial_rotation - native_rotation);
        frequencies.iter().map(|f| f + shift).collect()
    }
}
