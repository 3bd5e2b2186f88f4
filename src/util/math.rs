//! Scalar helpers shared by the decoder and the geometry code.

/// Logistic function.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Inverse of [`sigmoid`] for `p` in `(0, 1)`.
///
/// `p <= 0` maps to negative infinity and `p >= 1` to positive infinity, so the
/// result can be used directly as a logit cut for "probability > p".
#[inline]
pub fn logit(p: f32) -> f32 {
    if p <= 0.0 {
        return f32::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f32::INFINITY;
    }
    (p / (1.0 - p)).ln()
}

/// Clamps `value` into `[lo, hi]`.
///
/// Unlike `f32::clamp` this never panics when `hi < lo`; the upper bound wins.
#[inline]
pub fn clamp_coord(value: f32, lo: f32, hi: f32) -> f32 {
    let mut v = value;
    if v < lo {
        v = lo;
    }
    if v > hi {
        v = hi;
    }
    v
}

/// Index and value of the largest element, preferring the lowest index on ties.
pub(crate) fn argmax(values: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, value) in values.enumerate() {
        match best {
            _ if value.is_nan() => {}
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((idx, value)),
        }
    }
    best
}
