//! Lake margins and the drainage-direction test that guards every tilt.
use std::collections::BTreeSet;

use crate::grid::RasterGrid;

/// D8 neighbours of `lake_nodes` that are not themselves in the lake.
pub fn external_margin(grid: &RasterGrid, lake_nodes: &BTreeSet<usize>) -> BTreeSet<usize> {
    let mut around = grid.neighbors_of(lake_nodes);
    around.extend(grid.diagonals_of(lake_nodes));
    around.difference(lake_nodes).copied().collect()
}

/// Lake nodes that touch (D8) the external margin.
pub fn internal_margin(
    grid: &RasterGrid,
    lake_nodes: &BTreeSet<usize>,
    external: &BTreeSet<usize>,
) -> BTreeSet<usize> {
    let mut around = grid.neighbors_of(external);
    around.extend(grid.diagonals_of(external));
    around.intersection(lake_nodes).copied().collect()
}

/// True if, for any external-margin node `e` not in `exempt` and any
/// orthogonal neighbour `n` of `e`, the relation `z[e] >= z[n]` differs
/// between `old` and `new`.
///
/// `exempt` holds the outlets: a lake is meant to spill into its outlet once
/// tilted, so the outlet's relations are allowed to change.
/// Comparisons are exact.
pub fn drainage_direction_changed(
    grid: &RasterGrid,
    lake_nodes: &BTreeSet<usize>,
    exempt: &BTreeSet<usize>,
    old: &[f64],
    new: &[f64],
) -> bool {
    external_margin(grid, lake_nodes)
        .difference(exempt)
        .any(|&e| {
            grid.neighbors(e)
                .any(|n| (old[e] >= old[n]) != (new[e] >= new[n]))
        })
}
