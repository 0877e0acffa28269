//! Nearest grid point lookup.

use std::collections::HashMap;

use signals_common::{GeoPoint, Variable};

/// Per-dimension indices selecting one horizontal grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointIndex {
    picks: Vec<(String, usize)>,
}

impl PointIndex {
    pub fn dims(&self) -> impl Iterator<Item = &str> {
        self.picks.iter().map(|(d, _)| d.as_str())
    }

    pub fn index(&self, dim: &str) -> Option<usize> {
        self.picks.iter().find(|(d, _)| d == dim).map(|(_, i)| *i)
    }

    /// Selection map understood by [`Variable::select`].
    pub fn to_picks(&self) -> HashMap<String, Vec<usize>> {
        self.picks
            .iter()
            .map(|(d, i)| (d.clone(), vec![*i]))
            .collect()
    }
}

/// Find the grid cell closest to `target`.
///
/// Independent 1-D axes are searched separately by absolute difference.
/// 2-D (curvilinear) coordinates, or 1-D coordinates sharing one dimension,
/// are searched jointly by squared Euclidean distance in degrees. NaN cells
/// are never chosen. Returns `None` when the shapes don't line up or every
/// cell is NaN.
pub fn nearest_point(lat: &Variable, lon: &Variable, target: GeoPoint) -> Option<PointIndex> {
    match (lat.ndim(), lon.ndim()) {
        (1, 1) if lat.dims() != lon.dims() => {
            let i = nearest_1d(lat.data(), target.lat)?;
            let j = nearest_1d(lon.data(), target.lon)?;
            Some(PointIndex {
                picks: vec![(lat.dims()[0].clone(), i), (lon.dims()[0].clone(), j)],
            })
        }
        (n, m) if n == m && lat.shape() == lon.shape() && n > 0 => {
            let flat = nearest_joint(lat.data(), lon.data(), target)?;
            let picks = unravel(flat, lat.shape())
                .into_iter()
                .zip(lat.dims())
                .map(|(i, d)| (d.clone(), i))
                .collect();
            Some(PointIndex { picks })
        }
        _ => None,
    }
}

/// Index of the value closest to `target`, ignoring NaN.
pub fn nearest_1d(values: &[f64], target: f64) -> Option<usize> {
    argmin(values.iter().map(|v| (v - target).abs()))
}

fn nearest_joint(lats: &[f64], lons: &[f64], target: GeoPoint) -> Option<usize> {
    argmin(
        lats.iter()
            .zip(lons)
            .map(|(la, lo)| (la - target.lat).powi(2) + (lo - target.lon).powi(2)),
    )
}

// First minimum wins on ties.
fn argmin(distances: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, d) in distances.enumerate() {
        if d.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| d < b) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut out = vec![0; shape.len()];
    for (axis, &len) in shape.iter().enumerate().rev() {
        if len == 0 {
            continue;
        }
        out[axis] = flat % len;
        flat /= len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid2d(dims: [&str; 2], shape: [usize; 2], data: Vec<f64>) -> Variable {
        Variable::new(
            dims.iter().map(|d| d.to_string()).collect(),
            shape.to_vec(),
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_1d_axes_independent() {
        let lat = Variable::axis("lat", vec![10.0, 20.0, 30.0]);
        let lon = Variable::axis("lon", vec![0.0, 1.0, 2.0, 3.0]);
        let idx = nearest_point(&lat, &lon, GeoPoint::new(21.0, 2.6)).unwrap();
        assert_eq!(idx.index("lat"), Some(1));
        assert_eq!(idx.index("lon"), Some(3));
    }

    #[test]
    fn test_1d_ignores_nan() {
        assert_eq!(nearest_1d(&[f64::NAN, 5.0, 9.0], 0.0), Some(1));
        assert_eq!(nearest_1d(&[f64::NAN], 0.0), None);
        assert_eq!(nearest_1d(&[], 0.0), None);
    }

    #[test]
    fn test_ties_pick_first() {
        assert_eq!(nearest_1d(&[10.0, 20.0], 15.0), Some(0));
    }

    #[test]
    fn test_curvilinear_grid_unravels_on_lat_dims() {
        // 2 rows (y) x 3 columns (x)
        let lat = grid2d(["y", "x"], [2, 3], vec![52.0, 52.1, 52.2, 51.0, 51.1, 51.2]);
        let lon = grid2d(["y", "x"], [2, 3], vec![4.0, 5.0, 6.0, 4.1, 5.1, 6.1]);

        let idx = nearest_point(&lat, &lon, GeoPoint::new(51.1, 5.0)).unwrap();
        assert_eq!(idx.index("y"), Some(1));
        assert_eq!(idx.index("x"), Some(1));
        assert_eq!(idx.dims().collect::<Vec<_>>(), vec!["y", "x"]);
    }

    #[test]
    fn test_curvilinear_skips_nan_cells() {
        let lat = grid2d(["y", "x"], [1, 2], vec![f64::NAN, 40.0]);
        let lon = grid2d(["y", "x"], [1, 2], vec![f64::NAN, 10.0]);
        let idx = nearest_point(&lat, &lon, GeoPoint::new(0.0, 0.0)).unwrap();
        assert_eq!(idx.index("x"), Some(1));
    }

    #[test]
    fn test_station_list_shares_dimension() {
        let lat = Variable::axis("station", vec![52.0, 51.0, 53.0]);
        let lon = Variable::axis("station", vec![5.0, 4.0, 6.0]);
        let idx = nearest_point(&lat, &lon, GeoPoint::new(51.2, 4.1)).unwrap();
        assert_eq!(idx.to_picks().get("station"), Some(&vec![1]));
    }

    #[test]
    fn test_mismatched_shapes_rejected() {
        let lat = Variable::axis("lat", vec![1.0, 2.0]);
        let lon = grid2d(["y", "x"], [1, 2], vec![1.0, 2.0]);
        assert!(nearest_point(&lat, &lon, GeoPoint::new(1.0, 1.0)).is_none());
    }
}
