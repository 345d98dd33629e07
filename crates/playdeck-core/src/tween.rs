// crates/playdeck-core/src/tween.rs
//
// Progress-shaping curves for transitions.
//
// All curves map `t` ∈ [0, 1] to [0, 1]. Transitions evaluate the chosen
// curve at the half-step positions δ1/δ2 so interlaced output gets distinct
// field progress.

/// Clamp `v` to [0.0, 1.0].
#[inline]
pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Linear interpolation between `a` and `b` at `t` ∈ [0, 1].
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Curve selection carried in a transition config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tween {
    /// Constant-velocity progress. The broadcast default — a mix that
    /// accelerates reads as a glitch on air.
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    EaseInOutCubic,
}

impl Tween {
    /// Look up a curve by protocol name. Unknown names fall back to linear.
    pub fn from_name(name: &str) -> Tween {
        match name.to_ascii_uppercase().as_str() {
            "EASEIN" => Tween::EaseIn,
            "EASEOUT" => Tween::EaseOut,
            "EASEINOUT" => Tween::EaseInOut,
            "EASEINOUTCUBIC" => Tween::EaseInOutCubic,
            _ => Tween::Linear,
        }
    }

    pub fn apply(self, t: f64) -> f64 {
        let t = clamp01(t);
        match self {
            Tween::Linear => t,
            Tween::EaseIn => t * t,
            Tween::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Tween::EaseInOut => t * t * (3.0 - 2.0 * t),
            Tween::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}
