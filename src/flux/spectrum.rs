//! Pinched (alpha-fit) neutrino energy spectrum.
//!
//! The spectral shape is
//!
//! ```text
//! φ(E) = N (E/⟨E⟩)^α exp(-(α+1) E/⟨E⟩),   N = (α+1)^(α+1) / (⟨E⟩ Γ(α+1))
//! ```
//!
//! normalised so that `∫ φ dE = 1`. The pinch parameter comes from the first
//! two energy moments.

use std::f64::consts::PI;

use statrs::function::gamma::ln_gamma;

use crate::data::model::{EnergyBins, Moments, PerFlavor};
use crate::error::{ensure_finite, PipelineError, Result};

/// Flux at Earth per flavor per energy bin, indexed `[sample][flavor][energy bin]`.
pub type FluxSpectrum = Vec<PerFlavor<Vec<f64>>>;

/// Pinch parameter `α = (rms² − 2⟨E⟩²) / (⟨E⟩² − rms²)`.
///
/// Identical to the usual `(2⟨E⟩² − ⟨E²⟩) / (⟨E²⟩ − ⟨E⟩²)` with both terms negated.
pub fn pinch_parameter(avg: f64, rms: f64) -> Result<f64> {
    let avg2 = avg * avg;
    let rms2 = rms * rms;
    let denom = avg2 - rms2;
    if denom == 0.0 {
        return Err(PipelineError::DegeneratePinch { avg, rms });
    }
    let alpha = ensure_finite("pinch parameter", (rms2 - 2.0 * avg2) / denom)?;
    if alpha <= -1.0 {
        return Err(PipelineError::InvalidPinch { alpha });
    }
    Ok(alpha)
}

/// Normalised spectral shape for one (⟨E⟩, α) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchedSpectrum {
    pub avg: f64,
    pub alpha: f64,
    /// ln N; N itself overflows for α above ~140.
    ln_norm: f64,
}

impl PinchedSpectrum {
    pub fn from_moments(avg: f64, rms: f64) -> Result<Self> {
        let alpha = pinch_parameter(avg, rms)?;
        Self::from_alpha(avg, alpha)
    }

    pub fn from_alpha(avg: f64, alpha: f64) -> Result<Self> {
        if !(avg > 0.0) {
            return Err(PipelineError::NonPositiveMeanEnergy { avg });
        }
        if !(alpha > -1.0) {
            return Err(PipelineError::InvalidPinch { alpha });
        }
        let a1 = alpha + 1.0;
        let ln_norm = ensure_finite(
            "spectrum normalisation",
            a1 * a1.ln() - avg.ln() - ln_gamma(a1),
        )?;
        Ok(PinchedSpectrum { avg, alpha, ln_norm })
    }

    /// φ(E) in 1/GeV.
    pub fn phi(&self, energy: f64) -> f64 {
        let x = energy / self.avg;
        // x^0 is 1 even at E = 0
        let power = if self.alpha == 0.0 { 0.0 } else { self.alpha * x.ln() };
        (self.ln_norm + power - (self.alpha + 1.0) * x).exp()
    }
}

/// `1 / (4π d²)` for a source at `distance` cm.
pub fn luminosity_to_flux(distance: f64) -> f64 {
    1.0 / (4.0 * PI * distance * distance)
}

/// Number flux [1/s/cm²] of one flavor in every energy bin.
///
/// Zero luminosity yields a zero row without evaluating the spectrum.
pub fn flux_row(moments: &Moments, energy_bins: &EnergyBins, lum_to_flux: f64) -> Result<Vec<f64>> {
    if moments.lum == 0.0 {
        return Ok(vec![0.0; energy_bins.len()]);
    }
    if !(moments.avg > 0.0) {
        return Err(PipelineError::NonPositiveEnergy {
            avg: moments.avg,
            lum: moments.lum,
        });
    }

    let spectrum = PinchedSpectrum::from_moments(moments.avg, moments.rms)?;
    let number_rate = lum_to_flux * moments.lum / moments.avg;
    let de = energy_bins.width();

    energy_bins
        .lefts()
        .iter()
        .map(|&e| ensure_finite("flux", number_rate * spectrum.phi(e) * de))
        .collect()
}

/// Evaluate [`flux_row`] for every sample and flavor.
pub fn flux_spectrum(
    samples: &[PerFlavor<Moments>],
    energy_bins: &EnergyBins,
    distance: f64,
) -> Result<FluxSpectrum> {
    let lum_to_flux = luminosity_to_flux(distance);
    samples
        .iter()
        .map(|sample| PerFlavor::try_from_fn(|flavor| flux_row(&sample[flavor], energy_bins, lum_to_flux)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Bins, Flavor};
    use approx::assert_relative_eq;

    /// ∫ φ dE on a log grid, which also copes with the E → 0 singularity for α < 0.
    fn integrate_phi(spectrum: &PinchedSpectrum) -> f64 {
        let n = 200_000;
        let u0 = (1e-14 * spectrum.avg).ln();
        let u1 = (40.0 * spectrum.avg).ln();
        let du = (u1 - u0) / n as f64;
        let f = |u: f64| {
            let e = u.exp();
            spectrum.phi(e) * e
        };
        let mut sum = 0.5 * (f(u0) + f(u1));
        for i in 1..n {
            sum += f(u0 + i as f64 * du);
        }
        sum * du
    }

    #[test]
    fn matches_literature_form() {
        let (avg, rms) = (10.0_f64, 12.0_f64);
        let literature = (2.0 * avg * avg - rms * rms) / (rms * rms - avg * avg);
        assert_relative_eq!(pinch_parameter(avg, rms).unwrap(), literature, epsilon = 1e-14);
        assert_relative_eq!(literature, 56.0 / 44.0, epsilon = 1e-14);
    }

    #[test]
    fn equal_moments_are_degenerate() {
        let err = pinch_parameter(10.0, 10.0).unwrap_err();
        assert!(matches!(err, PipelineError::DegeneratePinch { .. }));
        // rms < avg gives α < -1
        assert!(matches!(
            pinch_parameter(10.0, 9.0).unwrap_err(),
            PipelineError::InvalidPinch { .. }
        ));
    }

    #[test]
    fn shape_is_normalised() {
        for alpha in [-0.5, 0.0, 1.0, 56.0 / 44.0, 2.5, 5.0, 50.0, 150.0, 300.0] {
            let spectrum = PinchedSpectrum::from_alpha(12.0, alpha).unwrap();
            let integral = integrate_phi(&spectrum);
            assert_relative_eq!(integral, 1.0, max_relative = 1e-3);
        }
    }

    #[test]
    fn nearly_equal_moments_stay_finite() {
        // α ≈ 165, where (α+1)^(α+1) alone overflows f64
        let spectrum = PinchedSpectrum::from_moments(10.0, 10.03).unwrap();
        assert!(spectrum.alpha > 160.0);
        let peak = spectrum.phi(10.0);
        assert!(peak.is_finite() && peak > 0.0);
        assert_eq!(spectrum.phi(0.0), 0.0);
        assert_relative_eq!(integrate_phi(&spectrum), 1.0, max_relative = 1e-3);

        let bins = Bins::with_width(vec![0.010], 0.0001).unwrap();
        let m = Moments { lum: 1e51, avg: 0.01, rms: 0.01003 };
        assert!(flux_row(&m, &bins, luminosity_to_flux(3.086e22)).unwrap()[0] > 0.0);
    }

    #[test]
    fn non_positive_mean_energy_has_its_own_error() {
        let err = PinchedSpectrum::from_alpha(0.0, 1.0).unwrap_err();
        assert!(matches!(err, PipelineError::NonPositiveMeanEnergy { .. }));
        assert!(!err.to_string().contains("NaN"));
        assert!(err.is_data_integrity());
    }

    #[test]
    fn alpha_zero_is_exponential() {
        let spectrum = PinchedSpectrum::from_alpha(2.0, 0.0).unwrap();
        assert_relative_eq!(spectrum.phi(1.0), 0.5 * (-0.5_f64).exp(), epsilon = 1e-14);
    }

    #[test]
    fn flux_scales_with_inverse_square_distance() {
        let bins = Bins::with_width(vec![0.005], 0.001).unwrap();
        let m = Moments { lum: 1e51, avg: 0.01, rms: 0.012 };
        let near = flux_row(&m, &bins, luminosity_to_flux(1.0)).unwrap()[0];
        let far = flux_row(&m, &bins, luminosity_to_flux(2.0)).unwrap()[0];
        assert_relative_eq!(near / far, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_luminosity_is_zero_filled() {
        let bins = Bins::from_left_edges(vec![0.001, 0.002, 0.003]).unwrap();
        let dark = Moments { lum: 0.0, avg: 0.0, rms: 0.0 };
        assert_eq!(flux_row(&dark, &bins, 1.0).unwrap(), vec![0.0; 3]);

        let bad = Moments { lum: 1.0, avg: 0.0, rms: 0.0 };
        assert!(matches!(
            flux_row(&bad, &bins, 1.0).unwrap_err(),
            PipelineError::NonPositiveEnergy { .. }
        ));
    }

    #[test]
    fn spectrum_shape_is_time_flavor_energy() {
        let bins = Bins::from_left_edges(vec![0.005, 0.010]).unwrap();
        let sample = PerFlavor::from_fn(|f| Moments {
            lum: if f == Flavor::AntiElectron { 0.0 } else { 1e51 },
            avg: 0.01,
            rms: 0.012,
        });
        let spectrum = flux_spectrum(&[sample, sample], &bins, 3.086e22).unwrap();
        assert_eq!(spectrum.len(), 2);
        assert_eq!(spectrum[0][Flavor::Electron].len(), 2);
        assert!(spectrum[1][Flavor::HeavyLepton].iter().all(|&f| f > 0.0));
        assert_eq!(spectrum[1][Flavor::AntiElectron], vec![0.0, 0.0]);
    }
}
