use crate::engine::config::{ConfigError, KernelWidth};
use tracing::debug;

/// Padding applied to the resolution range of the evenly spaced sampling grid.
const GRID_LOW_PADDING: f64 = 0.99;
const GRID_HIGH_PADDING: f64 = 1.01;

/// Kernel width in d*³ units that places roughly `free_per_bin` free reflections
/// in each resolution bin.
///
/// The free-reflection target is scaled up by `n_total / n_free` to a total count
/// per bin; the full d*³ range is then divided into `n_total / per_bin` bins
/// (integer division, at least one).
pub fn kernel_width_d_star_cubed(
    n_free: usize,
    n_total: usize,
    d_star_cubed_range: (f64, f64),
    free_per_bin: usize,
) -> Result<f64, ConfigError> {
    if free_per_bin == 0 {
        return Err(ConfigError::InvalidParameter {
            name: "kernel_width_free_reflections",
            reason: "must be greater than zero".to_string(),
        });
    }
    let mut per_bin = free_per_bin as f64;
    if n_free > 0 {
        per_bin *= n_total as f64 / n_free as f64;
    }
    let per_bin = (per_bin.round() as usize).min(n_total);
    let n_bins = (n_total / per_bin.max(1)).max(1);
    let (low, high) = d_star_cubed_range;
    let width = (high - low) / n_bins as f64;
    debug!(per_bin, n_bins, width, "Resolved kernel width from free-reflection count.");
    Ok(width)
}

pub fn resolve_kernel_width(
    kernel_width: KernelWidth,
    n_free: usize,
    n_total: usize,
    d_star_cubed_range: (f64, f64),
) -> Result<f64, ConfigError> {
    match kernel_width {
        KernelWidth::DStarCubed(width) => Ok(width),
        KernelWidth::FreeReflectionsPerBin(per_bin) => {
            kernel_width_d_star_cubed(n_free, n_total, d_star_cubed_range, per_bin)
        }
    }
}

/// Resolution points (d*³) at which sigmaA is sampled, together with the domain
/// the smoothed curve is fitted over.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingGrid {
    pub points: Vec<f64>,
    pub low: f64,
    pub high: f64,
}

/// With `bin_centers` the points sit in the middle of `n` equal bins spanning
/// `[low, high]` and the domain is `[low, high]`. Otherwise the domain is padded
/// by 1% on both sides and the points are evenly spaced over it, ends included.
pub fn sampling_grid(low: f64, high: f64, n: usize, bin_centers: bool) -> SamplingGrid {
    if bin_centers {
        let span = high - low;
        let points = (0..n)
            .map(|i| (2 * i + 1) as f64 * span / (2 * n) as f64 + low)
            .collect();
        return SamplingGrid { points, low, high };
    }

    let start = low * GRID_LOW_PADDING;
    let end = high * GRID_HIGH_PADDING;
    let points = match n {
        0 => Vec::new(),
        1 => vec![0.5 * (start + end)],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    };
    SamplingGrid {
        points,
        low: start,
        high: end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn width_from_free_fraction() {
        // 200 free per bin at a 10% free fraction is 2000 reflections per bin: two bins.
        let width = kernel_width_d_star_cubed(500, 5000, (0.0, 0.3), 200).unwrap();
        assert!(f64_approx_equal(width, 0.15));
    }

    #[test]
    fn per_bin_count_is_capped_at_total() {
        let width = kernel_width_d_star_cubed(10, 100, (0.1, 0.5), 50).unwrap();
        assert!(f64_approx_equal(width, 0.4));
    }

    #[test]
    fn zero_free_reflections_skip_ratio_scaling() {
        let width = kernel_width_d_star_cubed(0, 1000, (0.0, 1.0), 100).unwrap();
        assert!(f64_approx_equal(width, 0.1));
    }

    #[test]
    fn bin_count_uses_integer_division() {
        // 1000 / 300 = 3 bins.
        let width = kernel_width_d_star_cubed(1000, 1000, (0.0, 0.9), 300).unwrap();
        assert!(f64_approx_equal(width, 0.3));
    }

    #[test]
    fn zero_target_is_rejected() {
        assert!(matches!(
            kernel_width_d_star_cubed(10, 100, (0.0, 1.0), 0),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn explicit_width_is_used_as_is() {
        let width = resolve_kernel_width(KernelWidth::DStarCubed(0.02), 1, 10, (0.0, 1.0)).unwrap();
        assert_eq!(width, 0.02);
    }

    #[test]
    fn padded_grid_spans_range() {
        let grid = sampling_grid(0.1, 0.5, 5, false);
        assert_eq!(grid.points.len(), 5);
        assert!(f64_approx_equal(grid.points[0], 0.099));
        assert!(f64_approx_equal(grid.points[4], 0.505));
        assert!(grid.points.windows(2).all(|w| w[1] > w[0]));
        assert!(f64_approx_equal(grid.low, 0.099));
        assert!(f64_approx_equal(grid.high, 0.505));
    }

    #[test]
    fn bin_center_grid_is_unpadded() {
        let grid = sampling_grid(0.0, 1.0, 4, true);
        assert_eq!((grid.low, grid.high), (0.0, 1.0));
        let expected = [0.125, 0.375, 0.625, 0.875];
        for (g, e) in grid.points.iter().zip(expected) {
            assert!(f64_approx_equal(*g, e));
        }
    }
}
