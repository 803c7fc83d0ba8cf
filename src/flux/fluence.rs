use log::{debug, info};

use crate::data::model::{EnergyBins, FluenceTable, Flavor, MomentSeries, PerFlavor, TimeBins};
use crate::error::Result;

use super::binning::{slice_bin, BinSlice};
use super::spectrum::flux_spectrum;

/// Trapezoidal rule for samples `y` at abscissae `x`.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Integrate the flux spectrum over one bin's local (edge-exact) times.
///
/// Returns the fluence per flavor per energy bin [1/cm²].
pub fn fluence_row(
    slice: &BinSlice,
    energy_bins: &EnergyBins,
    distance: f64,
) -> Result<PerFlavor<Vec<f64>>> {
    let spectrum = flux_spectrum(&slice.samples, energy_bins, distance)?;
    let mut column = vec![0.0; slice.time.len()];

    Ok(PerFlavor::from_fn(|flavor: Flavor| {
        (0..energy_bins.len())
            .map(|e| {
                for (k, sample) in spectrum.iter().enumerate() {
                    column[k] = sample[flavor][e];
                }
                trapezoid(&column, &slice.time)
            })
            .collect()
    }))
}

/// Full fluence table for a simulated model.
pub fn fluence_table(
    series: &MomentSeries,
    time_bins: &TimeBins,
    energy_bins: &EnergyBins,
    distance: f64,
) -> Result<FluenceTable> {
    info!(
        "Integrating fluences: {} time bins x {} energy bins, d = {distance:e} cm",
        time_bins.len(),
        energy_bins.len()
    );

    let mut rows = Vec::with_capacity(time_bins.len());
    for i in 0..time_bins.len() {
        let (left, right) = time_bins.edges(i);
        let slice = slice_bin(series, left, right)?;
        debug!("bin {i}: [{left}, {right}) spans {} local samples", slice.time.len());
        rows.push(fluence_row(&slice, energy_bins, distance)?);
    }

    FluenceTable::from_rows(time_bins.clone(), energy_bins.clone(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Bins, Moments};
    use crate::flux::spectrum::{luminosity_to_flux, PinchedSpectrum};
    use approx::assert_relative_eq;

    const KPC: f64 = 3.086e21;

    fn constant_series(time: &[f64], m: Moments) -> MomentSeries {
        let samples = vec![PerFlavor::from_fn(|_| m); time.len()];
        MomentSeries::new(time.to_vec(), samples).unwrap()
    }

    #[test]
    fn trapezoid_of_a_line_is_exact() {
        let x = [0.0, 0.5, 2.0];
        let y = [1.0, 2.0, 5.0];
        assert_relative_eq!(trapezoid(&y, &x), 6.0);
        assert_eq!(trapezoid(&[3.0], &[1.0]), 0.0);
    }

    #[test]
    fn single_bin_scenario() {
        let m = Moments { lum: 1e51, avg: 10.0, rms: 12.0 };
        let series = constant_series(&[0.0, 1.0, 2.0, 3.0], m);
        let time_bins = Bins::with_width(vec![0.0], 1.0).unwrap();
        let energy_bins = Bins::with_width(vec![5.0], 1.0).unwrap();

        let table = fluence_table(&series, &time_bins, &energy_bins, KPC).unwrap();
        let fluence = table.get(Flavor::Electron, 0, 0);
        assert!(fluence.is_finite() && fluence > 0.0);

        // constant emission over a 1 s bin: fluence == flux
        let spectrum = PinchedSpectrum::from_moments(10.0, 12.0).unwrap();
        let expected = luminosity_to_flux(KPC) * 1e51 / 10.0 * spectrum.phi(5.0) * 1.0;
        assert_relative_eq!(fluence, expected, max_relative = 1e-12);

        let again = fluence_table(&series, &time_bins, &energy_bins, KPC).unwrap();
        assert_eq!(
            again.get(Flavor::Electron, 0, 0).to_bits(),
            fluence.to_bits()
        );
        assert_eq!(again, table);
    }

    #[test]
    fn linear_luminosity_integrates_exactly_across_misaligned_edges() {
        // L(t) = 1e50 * (1 + t); the spectrum shape is constant so the fluence is
        // proportional to ∫ L dt, which the trapezoid rule gets exactly.
        let time = [0.0, 0.07, 0.31, 0.44, 0.9, 1.3];
        let samples = time
            .iter()
            .map(|&t| {
                PerFlavor::from_fn(|_| Moments { lum: 1e50 * (1.0 + t), avg: 10.0, rms: 12.0 })
            })
            .collect();
        let series = MomentSeries::new(time.to_vec(), samples).unwrap();
        let time_bins = Bins::from_left_edges(vec![0.1, 0.35, 0.6]).unwrap();
        let energy_bins = Bins::from_left_edges(vec![5.0, 6.0]).unwrap();
        let table = fluence_table(&series, &time_bins, &energy_bins, KPC).unwrap();

        let per_lum = fluence_row(
            &BinSlice {
                time: vec![0.0, 1.0],
                samples: vec![PerFlavor::from_fn(|_| Moments { lum: 1.0, avg: 10.0, rms: 12.0 }); 2],
            },
            &energy_bins,
            KPC,
        )
        .unwrap();

        for i in 0..3 {
            let (l, r) = time_bins.edges(i);
            let lum_integral = 1e50 * ((r - l) + (r * r - l * l) / 2.0);
            for e in 0..2 {
                assert_relative_eq!(
                    table.get(Flavor::AntiElectron, i, e),
                    per_lum[Flavor::AntiElectron][e] * lum_integral,
                    max_relative = 1e-10
                );
            }
        }
    }

    #[test]
    fn bin_outside_simulation_fails() {
        let m = Moments { lum: 1e51, avg: 10.0, rms: 12.0 };
        let series = constant_series(&[0.0, 1.0], m);
        let time_bins = Bins::from_left_edges(vec![0.0, 0.75]).unwrap();
        let energy_bins = Bins::with_width(vec![5.0], 1.0).unwrap();
        assert!(fluence_table(&series, &time_bins, &energy_bins, KPC).is_err());
    }
}
