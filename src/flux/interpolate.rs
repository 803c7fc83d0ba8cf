use crate::data::model::{Moments, PerFlavor};
use crate::error::{ensure_finite, PipelineError, Result};

// ---------------------------------------------------------------------------
// Blend – values that can be linearly interpolated
// ---------------------------------------------------------------------------

/// A value that supports the two-point interpolation weighting.
pub trait Blend: Clone {
    /// `(self * w0 + other * w1) / norm`, component-wise.
    fn blend(&self, w0: f64, other: &Self, w1: f64, norm: f64) -> Self;

    fn check_finite(&self) -> Result<()>;
}

impl Blend for f64 {
    fn blend(&self, w0: f64, other: &Self, w1: f64, norm: f64) -> Self {
        (self * w0 + other * w1) / norm
    }

    fn check_finite(&self) -> Result<()> {
        ensure_finite("interpolated value", *self).map(|_| ())
    }
}

impl Blend for Moments {
    fn blend(&self, w0: f64, other: &Self, w1: f64, norm: f64) -> Self {
        Moments {
            lum: self.lum.blend(w0, &other.lum, w1, norm),
            avg: self.avg.blend(w0, &other.avg, w1, norm),
            rms: self.rms.blend(w0, &other.rms, w1, norm),
        }
    }

    fn check_finite(&self) -> Result<()> {
        self.lum.check_finite()?;
        self.avg.check_finite()?;
        self.rms.check_finite()
    }
}

impl<T: Blend> Blend for PerFlavor<T> {
    fn blend(&self, w0: f64, other: &Self, w1: f64, norm: f64) -> Self {
        PerFlavor::from_fn(|flavor| self[flavor].blend(w0, &other[flavor], w1, norm))
    }

    fn check_finite(&self) -> Result<()> {
        self.iter().try_for_each(|(_, v)| v.check_finite())
    }
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Linearly interpolate `values` (aligned with increasing `time`) at `t`.
///
/// `t` must lie within `[time[0], time[last]]`. A query that hits a stored
/// timestep returns the stored value unchanged.
pub fn interpolate<V: Blend>(time: &[f64], values: &[V], t: f64) -> Result<V> {
    if values.len() != time.len() {
        return Err(PipelineError::LengthMismatch {
            what: "interpolation values",
            expected: time.len(),
            found: values.len(),
        });
    }
    let (Some(&start), Some(&end)) = (time.first(), time.last()) else {
        return Err(PipelineError::LengthMismatch {
            what: "interpolation time axis (minimum)",
            expected: 1,
            found: 0,
        });
    };
    if !(t >= start && t <= end) {
        return Err(PipelineError::OutOfRange { t, start, end });
    }

    // right-closed: time[i - 1] < t <= time[i]
    let i = time.partition_point(|&x| x < t);
    if time[i] == t {
        return Ok(values[i].clone());
    }

    let (t0, t1) = (time[i - 1], time[i]);
    let span = t1 - t0;
    if span <= 0.0 {
        return Err(PipelineError::DegenerateInterval { t });
    }

    let y = values[i - 1].blend(t1 - t, &values[i], t - t0, span);
    y.check_finite()?;
    Ok(y)
}

/// [`interpolate`] at each query point.
pub fn interpolate_many<V: Blend>(time: &[f64], values: &[V], ts: &[f64]) -> Result<Vec<V>> {
    ts.iter().map(|&t| interpolate(time, values, t)).collect()
}
