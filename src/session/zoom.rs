//! Zoom bookkeeping.
//!
//! All functions here are pure; the coordinator applies their results to the
//! hardware under the device lock.

use crate::assert_invariant;
use crate::types::CaptureDevice;
use serde::{Deserialize, Serialize};

/// Number of linear steps a smooth zoom is divided into
pub const SMOOTH_ZOOM_STEPS: u32 = 20;

/// Factors closer than this are the same factor
const FACTOR_EPSILON: f32 = 1e-3;

pub(crate) const INVARIANT_IN_BOUNDS: &str = "Zoom factor stays within device bounds";
pub(crate) const INVARIANT_SORTED: &str = "Available zoom factors are sorted and unique";

/// Current zoom plus the limits of the active device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomState {
    pub current: f32,
    pub min: f32,
    pub max: f32,
    /// Sorted ascending, deduplicated, always containing 1.0
    pub available: Vec<f32>,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            current: 1.0,
            min: 1.0,
            max: 1.0,
            available: vec![1.0],
        }
    }
}

impl ZoomState {
    /// Scan a device's zoom limits. The device starts at 1x, clamped into range.
    pub fn for_device(device: &CaptureDevice, standard_factors: &[f32]) -> Self {
        let caps = &device.capabilities;
        let (min, max) = sanitize_bounds(caps.min_zoom_factor, caps.max_zoom_factor);
        let available = available_factors(min, max, standard_factors, &caps.switch_over_zoom_factors);

        let mut state = Self {
            current: 1.0,
            min,
            max,
            available,
        };
        state.current = state.clamp(1.0);
        state.check_invariants();
        state
    }

    /// Clamp into `[min, max]`; NaN maps to `min`.
    pub fn clamp(&self, factor: f32) -> f32 {
        if factor.is_nan() {
            return self.min;
        }
        factor.max(self.min).min(self.max)
    }

    pub(crate) fn set_current(&mut self, factor: f32) {
        self.current = factor;
        self.check_invariants();
    }

    fn check_invariants(&self) {
        assert_invariant!(
            self.current >= self.min && self.current <= self.max,
            INVARIANT_IN_BOUNDS,
            "session::zoom"
        );
        assert_invariant!(
            self.available
                .windows(2)
                .all(|pair| pair[1] - pair[0] >= FACTOR_EPSILON),
            INVARIANT_SORTED,
            "session::zoom"
        );
    }

    /// Member of the available set closest to `value`; ties go to the smaller factor.
    pub fn nearest_available(&self, value: f32) -> f32 {
        nearest_factor(&self.available, value)
    }

    /// The next optical stop after the current factor, cycling back to the first.
    pub fn next_optical_factor(&self, tolerance: f32) -> Option<f32> {
        next_optical_factor(&self.available, self.current, tolerance)
    }
}

fn sanitize_bounds(min: f32, max: f32) -> (f32, f32) {
    let min = if min.is_finite() && min > 0.0 { min } else { 1.0 };
    let max = if max.is_finite() && max >= min { max } else { min };
    (min, max)
}

/// Standard factors and switch-over factors inside `[min, max]`, plus 1.0.
pub fn available_factors(min: f32, max: f32, standard: &[f32], switch_over: &[f32]) -> Vec<f32> {
    let mut factors: Vec<f32> = standard
        .iter()
        .chain(switch_over.iter())
        .copied()
        .filter(|f| f.is_finite() && *f >= min - FACTOR_EPSILON && *f <= max + FACTOR_EPSILON)
        // 1.0 itself is always present, never a near neighbour of it
        .filter(|f| (*f - 1.0).abs() >= FACTOR_EPSILON)
        .collect();
    factors.push(1.0);
    factors.sort_by(|a, b| a.total_cmp(b));
    factors.dedup_by(|later, earlier| (*later - *earlier).abs() < FACTOR_EPSILON);
    factors
}

/// Element minimizing the absolute distance to `value`; `value` itself when empty.
pub fn nearest_factor(available: &[f32], value: f32) -> f32 {
    let mut best: Option<(f32, f32)> = None;
    for &factor in available {
        let distance = (factor - value).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((factor, distance)),
        }
    }
    best.map(|(factor, _)| factor).unwrap_or(value)
}

/// Locate `current` in the sorted list and return the following factor.
///
/// Position is the nearest factor within `tolerance`, else the highest factor
/// strictly below `current`, else the first one.
pub fn next_optical_factor(available: &[f32], current: f32, tolerance: f32) -> Option<f32> {
    if available.is_empty() {
        return None;
    }

    let matched = available
        .iter()
        .enumerate()
        .filter(|(_, f)| (**f - current).abs() < tolerance)
        .min_by(|(_, a), (_, b)| (**a - current).abs().total_cmp(&(**b - current).abs()))
        .map(|(i, _)| i);

    let index = matched
        .or_else(|| available.iter().rposition(|f| *f < current))
        .unwrap_or(0);

    available.get((index + 1) % available.len()).copied()
}

/// Factors of a linear ramp from `start` to `target`, excluding `start`.
///
/// The last element is exactly `target`.
pub fn ramp(start: f32, target: f32, steps: u32) -> Vec<f32> {
    let steps = steps.max(1);
    let delta = (target - start) / steps as f32;
    (1..=steps)
        .map(|i| if i == steps { target } else { start + delta * i as f32 })
        .collect()
}
