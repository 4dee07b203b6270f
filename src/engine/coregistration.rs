//! Resampling of secondary rasters onto the primary pixel grid

use crate::core::operators::ResamplingMethod;
use crate::types::{GeoTransform, SarError, SarResult};
use ndarray::{Array2, Zip};

const EDGE_TOLERANCE: f64 = 1e-6;

/// Affine map from target pixel (col, row) to source pixel (col, row)
#[derive(Debug, Clone, Copy)]
pub struct PixelMapping {
    origin: (f64, f64),
    per_col: (f64, f64),
    per_row: (f64, f64),
}

impl PixelMapping {
    pub fn between(target: &GeoTransform, source: &GeoTransform) -> SarResult<Self> {
        let map = |c: f64, r: f64| {
            let (lon, lat) = target.pixel_to_geo(c, r);
            source.geo_to_pixel(lon, lat)
        };
        let origin = map(0.0, 0.0)?;
        let col = map(1.0, 0.0)?;
        let row = map(0.0, 1.0)?;
        Ok(Self {
            origin,
            per_col: (col.0 - origin.0, col.1 - origin.1),
            per_row: (row.0 - origin.0, row.1 - origin.1),
        })
    }

    pub fn source_pixel(&self, col: usize, row: usize) -> (f64, f64) {
        let (c, r) = (col as f64, row as f64);
        (
            self.origin.0 + c * self.per_col.0 + r * self.per_row.0,
            self.origin.1 + c * self.per_col.1 + r * self.per_row.1,
        )
    }
}

fn sample(source: &Array2<f32>, col: f64, row: f64, method: ResamplingMethod) -> Option<f32> {
    let (height, width) = source.dim();
    let last_col = width as f64 - 1.0;
    let last_row = height as f64 - 1.0;
    if col < -EDGE_TOLERANCE || row < -EDGE_TOLERANCE || col > last_col + EDGE_TOLERANCE || row > last_row + EDGE_TOLERANCE {
        return None;
    }
    let col = col.clamp(0.0, last_col.max(0.0));
    let row = row.clamp(0.0, last_row.max(0.0));

    match method {
        ResamplingMethod::NearestNeighbour => Some(source[[row.round() as usize, col.round() as usize]]),
        ResamplingMethod::BilinearInterpolation | ResamplingMethod::CubicConvolution => {
            let c0 = col.floor() as usize;
            let r0 = row.floor() as usize;
            let c1 = (c0 + 1).min(width - 1);
            let r1 = (r0 + 1).min(height - 1);
            let fc = (col - c0 as f64) as f32;
            let fr = (row - r0 as f64) as f32;
            let top = source[[r0, c0]] * (1.0 - fc) + source[[r0, c1]] * fc;
            let bottom = source[[r1, c0]] * (1.0 - fc) + source[[r1, c1]] * fc;
            Some(top * (1.0 - fr) + bottom * fr)
        }
    }
}

/// Resample `source` onto a `shape` raster; target pixels outside the source become 0
///
/// Returns the resampled raster and the number of covered pixels.
pub fn resample(
    source: &Array2<f32>,
    mapping: &PixelMapping,
    shape: (usize, usize),
    method: ResamplingMethod,
) -> SarResult<(Array2<f32>, usize)> {
    if method == ResamplingMethod::CubicConvolution {
        return Err(SarError::Engine(
            "CUBIC_CONVOLUTION resampling is only available through the SNAP engine".to_string(),
        ));
    }
    if source.is_empty() {
        return Err(SarError::Engine("Cannot resample an empty raster".to_string()));
    }

    let mut covered = Array2::<u8>::zeros(shape);
    let mut output = Array2::<f32>::zeros(shape);
    let fill = |(r, c): (usize, usize), out: &mut f32, hit: &mut u8| {
        let (sc, sr) = mapping.source_pixel(c, r);
        if let Some(value) = sample(source, sc, sr, method) {
            *out = value;
            *hit = 1;
        }
    };
    #[cfg(feature = "parallel")]
    Zip::indexed(&mut output).and(&mut covered).par_for_each(fill);
    #[cfg(not(feature = "parallel"))]
    Zip::indexed(&mut output).and(&mut covered).for_each(fill);

    let count = covered.iter().filter(|v| **v == 1).count();
    Ok((output, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(x: f64, y: f64) -> GeoTransform {
        GeoTransform { top_left_x: x, pixel_width: 0.001, rotation_x: 0.0, top_left_y: y, rotation_y: 0.0, pixel_height: -0.001 }
    }

    #[test]
    fn test_integer_shift() {
        let source = Array2::from_shape_fn((4, 6), |(r, c)| (r * 10 + c) as f32);
        // Target starts two columns further east
        let mapping = PixelMapping::between(&grid(10.002, 50.0), &grid(10.0, 50.0)).unwrap();
        let (out, covered) =
            resample(&source, &mapping, (4, 6), ResamplingMethod::BilinearInterpolation).unwrap();
        assert_relative_eq!(out[[1, 0]], 12.0, epsilon = 1e-3);
        assert_relative_eq!(out[[3, 3]], 35.0, epsilon = 1e-3);
        assert_eq!(out[[0, 5]], 0.0);
        assert_eq!(covered, 4 * 4);
    }

    #[test]
    fn test_half_pixel_bilinear() {
        let source = Array2::from_shape_fn((2, 2), |(_, c)| c as f32);
        let mapping = PixelMapping::between(&grid(10.0005, 50.0), &grid(10.0, 50.0)).unwrap();
        let (out, _) = resample(&source, &mapping, (2, 1), ResamplingMethod::BilinearInterpolation).unwrap();
        assert_relative_eq!(out[[0, 0]], 0.5, epsilon = 1e-3);

        let (nearest, _) = resample(&source, &mapping, (2, 1), ResamplingMethod::NearestNeighbour).unwrap();
        assert!(nearest[[0, 0]] == 0.0 || nearest[[0, 0]] == 1.0);
    }

    #[test]
    fn test_cubic_is_unsupported() {
        let source = Array2::<f32>::zeros((2, 2));
        let mapping = PixelMapping::between(&grid(0.0, 0.0), &grid(0.0, 0.0)).unwrap();
        assert!(matches!(
            resample(&source, &mapping, (2, 2), ResamplingMethod::CubicConvolution),
            Err(SarError::Engine(_))
        ));
    }
}
