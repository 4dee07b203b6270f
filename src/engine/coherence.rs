//! Boxcar coherence estimation
//!
//! `γ = |Σ m·s*| / sqrt(Σ|m|² · Σ|s|²)` over a window of `win_az` lines by
//! `win_rg` samples centred on each pixel. Windows are clipped at the raster
//! edge. Sums come from summed-area tables so the cost does not depend on
//! the window size.

use crate::core::operators::CoherenceParams;
use crate::core::product::SwathGeometry;
use crate::types::{SarError, SarResult};
use ndarray::{Array2, ArrayView2, Zip};
use num_complex::Complex64;
use std::ops::{Add, Sub};

/// Azimuth and range window sizes actually used
///
/// With `square_pixel` the azimuth window follows from the range window so
/// that both cover about the same ground distance.
pub fn effective_windows(params: &CoherenceParams, geometry: Option<&SwathGeometry>) -> (usize, usize) {
    let win_rg = params.coh_win_rg.max(1) as usize;
    if !params.square_pixel {
        return (params.coh_win_az.max(1) as usize, win_rg);
    }
    match geometry {
        Some(g) if g.azimuth_pixel_spacing > 0.0 => {
            let ground_range = g.ground_range_spacing();
            let win_az = (win_rg as f64 * ground_range / g.azimuth_pixel_spacing).round();
            ((win_az as usize).max(1), win_rg)
        }
        _ => {
            log::warn!("No pixel spacing available; using cohWinAz={} as given", params.coh_win_az);
            (params.coh_win_az.max(1) as usize, win_rg)
        }
    }
}

/// Summed-area table with a leading zero row and column
struct Integral<T> {
    table: Array2<T>,
}

impl<T> Integral<T>
where
    T: Copy + Default + Add<Output = T> + Sub<Output = T>,
{
    fn new(height: usize, width: usize, value: impl Fn(usize, usize) -> T) -> Self {
        let mut table = Array2::from_elem((height + 1, width + 1), T::default());
        for r in 0..height {
            let mut row_sum = T::default();
            for c in 0..width {
                row_sum = row_sum + value(r, c);
                table[[r + 1, c + 1]] = table[[r, c + 1]] + row_sum;
            }
        }
        Self { table }
    }

    /// Sum over rows `r0..r1` and columns `c0..c1`
    fn sum(&self, r0: usize, r1: usize, c0: usize, c1: usize) -> T {
        self.table[[r1, c1]] - self.table[[r0, c1]] - self.table[[r1, c0]] + self.table[[r0, c0]]
    }
}

/// Complex coherence magnitude of two co-registered complex rasters
pub fn estimate_coherence(
    primary: (ArrayView2<f32>, ArrayView2<f32>),
    secondary: (ArrayView2<f32>, ArrayView2<f32>),
    win_az: usize,
    win_rg: usize,
) -> SarResult<Array2<f32>> {
    let (m_re, m_im) = primary;
    let (s_re, s_im) = secondary;
    let dim = m_re.dim();
    if m_im.dim() != dim || s_re.dim() != dim || s_im.dim() != dim {
        return Err(SarError::Engine(format!(
            "Coherence inputs differ in shape: {:?} {:?} {:?} {:?}",
            m_re.dim(),
            m_im.dim(),
            s_re.dim(),
            s_im.dim()
        )));
    }
    if win_az == 0 || win_rg == 0 {
        return Err(SarError::InvalidParameter(format!(
            "Coherence window must be positive, got {}x{}",
            win_az, win_rg
        )));
    }
    let (height, width) = dim;

    let value = |v: f32| if v.is_finite() { v as f64 } else { 0.0 };
    let sample = |re: &ArrayView2<f32>, im: &ArrayView2<f32>, r: usize, c: usize| {
        Complex64::new(value(re[[r, c]]), value(im[[r, c]]))
    };
    let cross = Integral::new(height, width, |r, c| {
        sample(&m_re, &m_im, r, c) * sample(&s_re, &s_im, r, c).conj()
    });
    let power_m = Integral::new(height, width, |r, c| sample(&m_re, &m_im, r, c).norm_sqr());
    let power_s = Integral::new(height, width, |r, c| sample(&s_re, &s_im, r, c).norm_sqr());

    let half_az = win_az / 2;
    let half_rg = win_rg / 2;
    let pixel = |r: usize, c: usize| -> f32 {
        let r0 = r.saturating_sub(half_az);
        let r1 = (r0 + win_az).min(height);
        let c0 = c.saturating_sub(half_rg);
        let c1 = (c0 + win_rg).min(width);

        let numerator = cross.sum(r0, r1, c0, c1).norm();
        let denom = (power_m.sum(r0, r1, c0, c1) * power_s.sum(r0, r1, c0, c1)).sqrt();
        if denom <= f64::EPSILON {
            0.0
        } else {
            (numerator / denom).clamp(0.0, 1.0) as f32
        }
    };

    let mut coherence = Array2::<f32>::zeros((height, width));
    #[cfg(feature = "parallel")]
    Zip::indexed(&mut coherence).par_for_each(|(r, c), out| *out = pixel(r, c));
    #[cfg(not(feature = "parallel"))]
    Zip::indexed(&mut coherence).for_each(|(r, c), out| *out = pixel(r, c));

    Ok(coherence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;
    use approx::assert_relative_eq;

    fn geometry() -> SwathGeometry {
        SwathGeometry {
            width: 10,
            height: 10,
            burst_count: 1,
            geo_transform: GeoTransform {
                top_left_x: 0.0,
                pixel_width: 1.0,
                rotation_x: 0.0,
                top_left_y: 0.0,
                rotation_y: 0.0,
                pixel_height: -1.0,
            },
            range_pixel_spacing: 2.329562,
            azimuth_pixel_spacing: 13.93056,
            incidence_near: 30.0,
            incidence_far: 46.0,
        }
    }

    #[test]
    fn test_square_pixel_window() {
        let params = CoherenceParams::default();
        assert_eq!(effective_windows(&params, Some(&geometry())), (3, 10));
        let rectangular = CoherenceParams { coh_win_az: 5, coh_win_rg: 20, square_pixel: false };
        assert_eq!(effective_windows(&rectangular, Some(&geometry())), (5, 20));
        assert_eq!(effective_windows(&params, None), (3, 10));
    }

    #[test]
    fn test_identical_signals_are_coherent() {
        let re = Array2::from_shape_fn((8, 12), |(r, c)| ((r * 7 + c * 3) % 5) as f32 - 2.0);
        let im = Array2::from_shape_fn((8, 12), |(r, c)| ((r + c * 2) % 3) as f32 - 1.0);
        let coh = estimate_coherence((re.view(), im.view()), (re.view(), im.view()), 3, 5).unwrap();
        for value in coh.iter() {
            // Windows with no energy report zero
            assert!(*value == 0.0 || (*value - 1.0).abs() < 1e-5);
        }
        assert_relative_eq!(coh[[4, 6]], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_constant_phase_offset_keeps_coherence() {
        let amplitude = Array2::from_shape_fn((6, 6), |(r, c)| 1.0 + (r * 6 + c) as f32 * 0.1);
        let zeros = Array2::<f32>::zeros((6, 6));
        // Secondary rotated by 90 degrees: i·m
        let coh = estimate_coherence(
            (amplitude.view(), zeros.view()),
            (zeros.view(), amplitude.view()),
            3,
            3,
        )
        .unwrap();
        assert!(coh.iter().all(|v| (*v - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_zero_energy_and_bounds() {
        let a = Array2::from_shape_fn((5, 5), |(r, c)| if (r + c) % 2 == 0 { 1.0 } else { -1.0 });
        let b = Array2::from_shape_fn((5, 5), |(r, _)| if r % 2 == 0 { 1.0 } else { -1.0 });
        let zeros = Array2::<f32>::zeros((5, 5));
        let coh = estimate_coherence((a.view(), zeros.view()), (b.view(), zeros.view()), 3, 3).unwrap();
        assert!(coh.iter().all(|v| (0.0..=1.0).contains(v)));

        let empty = estimate_coherence((zeros.view(), zeros.view()), (a.view(), zeros.view()), 3, 3).unwrap();
        assert!(empty.iter().all(|v| *v == 0.0));

        assert!(estimate_coherence((a.view(), zeros.view()), (b.view(), zeros.view()), 0, 3).is_err());
    }
}
