//! Tilting a flat-filled lake down towards its outlet.
use std::collections::BTreeSet;

use tracing::debug;

use crate::grid::RasterGrid;
use super::margins::drainage_direction_changed;

/// `base[node] + slope * distance(node, outlet)` for each node of
/// `lake_nodes`, in the same order.
pub fn tilted_elevations(
    grid: &RasterGrid,
    base: &[f64],
    lake_nodes: &[usize],
    outlet: usize,
    slope: f64,
) -> Vec<f64> {
    let dists = grid.distances_to_point(grid.coordinates(outlet), lake_nodes);
    lake_nodes
        .iter()
        .zip(dists)
        .map(|(&node, d)| base[node] + slope * d)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum TiltOutcome {
    /// `elevations` runs parallel to the lake nodes passed in.
    Accepted { slope: f64, elevations: Vec<f64> },
    /// No slope above the floor left the margin relations intact.
    Unstable { smallest_slope: f64 },
}

/// Applies and validates per-lake tilts.
#[derive(Debug, Clone, Copy)]
pub struct SlopeApplier {
    reduction: f64,
    min_slope: f64,
}

impl SlopeApplier {
    pub fn new(reduction: f64, min_slope: f64) -> Self {
        Self { reduction, min_slope }
    }

    /// Tilt one lake, reducing the slope until drainage at the lake margin
    /// is unchanged from `elevation`.
    ///
    /// Subsidiary lakes (created by an earlier tilt) take the first tilt
    /// unchecked. A tilt that no longer moves any node has underflowed and
    /// ends the search as [`TiltOutcome::Unstable`], as does dropping below
    /// the slope floor.
    pub fn apply_to_lake(
        &self,
        grid: &RasterGrid,
        elevation: &[f64],
        slope: f64,
        outlet: usize,
        lake_nodes: &[usize],
        subsidiary: bool,
    ) -> TiltOutcome {
        if lake_nodes.is_empty() {
            return TiltOutcome::Accepted { slope, elevations: Vec::new() };
        }
        let lake: BTreeSet<usize> = lake_nodes.iter().copied().collect();
        let exempt = BTreeSet::from([outlet]);
        let mut candidate = elevation.to_vec();
        let mut slope = slope;

        loop {
            let tilted = tilted_elevations(grid, elevation, lake_nodes, outlet, slope);
            if subsidiary {
                return TiltOutcome::Accepted { slope, elevations: tilted };
            }

            for (&node, &z) in lake_nodes.iter().zip(&tilted) {
                candidate[node] = z;
            }
            let moved = lake_nodes.iter().any(|&n| candidate[n] != elevation[n]);
            if !moved {
                debug!(outlet, slope, "tilt vanished below floating-point resolution");
                return TiltOutcome::Unstable { smallest_slope: slope };
            }
            if !drainage_direction_changed(grid, &lake, &exempt, elevation, &candidate) {
                return TiltOutcome::Accepted { slope, elevations: tilted };
            }

            let next = slope * self.reduction;
            if next < self.min_slope {
                debug!(outlet, slope, "slope floor reached");
                return TiltOutcome::Unstable { smallest_slope: slope };
            }
            debug!(outlet, from = slope, to = next, "tilt reverses margin drainage; reducing slope");
            slope = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn applier() -> SlopeApplier {
        SlopeApplier::new(0.1, 1e-30)
    }

    /// 5×5 grid at `rim` with a flat 3×3 lake at 4 and outlet (2, 0) at 4.
    fn flat_lake(rim: f64) -> (RasterGrid, Vec<f64>, Vec<usize>, usize) {
        let grid = RasterGrid::new(5, 5, 1.0);
        let mut z = vec![rim; 25];
        let lake: Vec<usize> = (1..4).flat_map(|r| (1..4).map(move |c| r * 5 + c)).collect();
        for &n in &lake {
            z[n] = 4.0;
        }
        let outlet = grid.node_id(2, 0);
        z[outlet] = 4.0;
        (grid, z, lake, outlet)
    }

    #[test]
    fn tilt_grows_with_distance() {
        let (grid, z, lake, outlet) = flat_lake(10.0);
        let tilted = tilted_elevations(&grid, &z, &lake, outlet, 0.5);
        let near = lake.iter().position(|&n| n == grid.node_id(2, 1)).unwrap();
        let far = lake.iter().position(|&n| n == grid.node_id(1, 3)).unwrap();
        assert_abs_diff_eq!(tilted[near], 4.5, epsilon = 1e-12);
        assert_abs_diff_eq!(tilted[far], 4.0 + 0.5 * 10f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn gentle_slope_accepted_unchanged() {
        let (grid, z, lake, outlet) = flat_lake(10.0);
        match applier().apply_to_lake(&grid, &z, 1e-3, outlet, &lake, false) {
            TiltOutcome::Accepted { slope, elevations } => {
                assert_eq!(slope, 1e-3);
                assert_eq!(elevations.len(), lake.len());
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn steep_slope_is_reduced_until_rim_holds() {
        // Rim 4.05: slope 1 puts the far corner at 4 + √10 > rim; only
        // 0.01 keeps every lake node below 4.05.
        let (grid, z, lake, outlet) = flat_lake(4.05);
        match applier().apply_to_lake(&grid, &z, 1.0, outlet, &lake, false) {
            TiltOutcome::Accepted { slope, elevations } => {
                assert_abs_diff_eq!(slope, 1e-2, epsilon = 1e-15);
                assert!(elevations.iter().all(|&e| e < 4.05));
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn rim_level_with_outlet_is_unstable_at_every_slope() {
        let (grid, mut z, lake, outlet) = flat_lake(10.0);
        z[grid.node_id(0, 2)] = 4.0;
        let outcome = applier().apply_to_lake(&grid, &z, 1e-3, outlet, &lake, false);
        assert!(matches!(outcome, TiltOutcome::Unstable { .. }));
    }

    #[test]
    fn slope_floor_stops_the_search() {
        let (grid, mut z, lake, outlet) = flat_lake(10.0);
        z[grid.node_id(0, 2)] = 4.0;
        let outcome = SlopeApplier::new(0.1, 5e-6).apply_to_lake(&grid, &z, 1e-3, outlet, &lake, false);
        match outcome {
            TiltOutcome::Unstable { smallest_slope } => {
                assert_abs_diff_eq!(smallest_slope, 1e-5, epsilon = 1e-18);
            }
            other => panic!("expected floor, got {other:?}"),
        }
    }

    #[test]
    fn subsidiary_lakes_skip_the_margin_check() {
        let (grid, mut z, lake, outlet) = flat_lake(10.0);
        z[grid.node_id(0, 2)] = 4.0;
        let outcome = applier().apply_to_lake(&grid, &z, 1e-3, outlet, &lake, true);
        assert!(matches!(outcome, TiltOutcome::Accepted { slope, .. } if slope == 1e-3));
    }
}
