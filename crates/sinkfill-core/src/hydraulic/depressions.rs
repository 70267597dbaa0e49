//! Depression mapping: which nodes are flooded, how deep, and through which
//! outlet each lake drains.
//!
//! The default mapper is a priority flood from the open boundary. Every
//! node's spill level is the lowest elevation at which water standing on it
//! could escape the domain; nodes whose spill level exceeds their elevation
//! are flooded. Flooded nodes that touch (D8) at the same level form one lake.
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, VecDeque};

use ordered_float::OrderedFloat;

use crate::error::FieldError;
use crate::grid::{NodeField, RasterGrid};
use super::flow_routing::RECEIVER_NODE_FIELD;

pub const DEPRESSION_DEPTH_FIELD: &str = "depression__depth";
pub const DEPRESSION_OUTLET_FIELD: &str = "depression__outlet_node";
pub const FLOOD_STATUS_FIELD: &str = "flood_status_code";

/// Outlet value of nodes that belong to no lake.
pub const NO_OUTLET: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodStatus {
    Unflooded,
    /// Flooded node that was also one of the supplied pits.
    Pit,
    Flooded,
}

impl FloodStatus {
    pub fn code(self) -> usize {
        match self {
            FloodStatus::Unflooded => 0,
            FloodStatus::Pit => 1,
            FloodStatus::Flooded => 3,
        }
    }

    pub fn is_flooded(self) -> bool {
        !matches!(self, FloodStatus::Unflooded)
    }
}

/// Result of one mapping pass.
#[derive(Debug, Clone)]
pub struct DepressionMap {
    /// Depth to raise each node to its lake's outlet level (0 outside lakes).
    pub depth: Vec<f64>,
    /// Outlet of the lake each node belongs to, or [`NO_OUTLET`].
    pub outlet: Vec<usize>,
    pub status: Vec<FloodStatus>,
    /// Distinct outlets, ascending.
    pub lake_outlets: Vec<usize>,
}

impl DepressionMap {
    /// Every node draining through `outlet`.
    pub fn lake_nodes(&self, outlet: usize) -> Vec<usize> {
        self.outlet
            .iter()
            .enumerate()
            .filter(|&(_, &o)| o == outlet)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn flooded_nodes(&self) -> Vec<usize> {
        self.status
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_flooded())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lake_outlets.is_empty()
    }
}

/// Partitions flooded nodes into lakes and assigns their outlets.
pub trait DepressionMapper {
    /// Node fields written by [`map_depressions`](DepressionMapper::map_depressions).
    fn output_fields(&self) -> &[&'static str];

    /// Map depressions on the current `elevation_field`.
    ///
    /// With `pits = Some(..)` only lakes containing at least one of those
    /// nodes are reported; with `None` every lake on the surface is.
    /// `reroute_flow` rewrites the receivers of lake nodes so they drain
    /// towards their outlet.
    fn map_depressions(
        &mut self,
        grid: &mut RasterGrid,
        elevation_field: &str,
        pits: Option<&[usize]>,
        reroute_flow: bool,
    ) -> Result<DepressionMap, FieldError>;
}

// ── Priority flood ───────────────────────────────────────────────────────────

/// Min-heap key: lowest level first, then discovery order.
type FloodEntry = Reverse<(OrderedFloat<f64>, u64, usize)>;

/// Spill level, flood parent and discovery order of every node.
struct Flood {
    level: Vec<f64>,
    parent: Vec<usize>,
    order: Vec<u64>,
}

fn priority_flood(grid: &RasterGrid, elevation: &[f64]) -> Flood {
    let n = grid.number_of_nodes();
    let mut level = elevation.to_vec();
    let mut parent = vec![NO_OUTLET; n];
    let mut order = vec![u64::MAX; n];
    let mut visited = vec![false; n];
    let mut heap: BinaryHeap<FloodEntry> = BinaryHeap::new();
    let mut seq = 0u64;

    for b in grid.boundary_nodes() {
        visited[b] = true;
        order[b] = seq;
        heap.push(Reverse((OrderedFloat(elevation[b]), seq, b)));
        seq += 1;
    }

    while let Some(Reverse((OrderedFloat(spill), _, node))) = heap.pop() {
        for (nb, _) in grid.d8_neighbors(node) {
            if visited[nb] {
                continue;
            }
            visited[nb] = true;
            level[nb] = elevation[nb].max(spill);
            parent[nb] = node;
            order[nb] = seq;
            heap.push(Reverse((OrderedFloat(level[nb]), seq, nb)));
            seq += 1;
        }
    }

    Flood { level, parent, order }
}

/// Depth that lifts `z` to at least `level` under floating-point addition.
fn depth_to_level(z: f64, level: f64) -> f64 {
    let mut d = level - z;
    while z + d < level {
        d = f64::from_bits(d.to_bits() + 1);
    }
    d
}

/// The default [`DepressionMapper`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityFloodMapper;

impl PriorityFloodMapper {
    /// Pure mapping of `elevation`; also returns the flood parents used for
    /// rerouting.
    pub(crate) fn compute(
        grid: &RasterGrid,
        elevation: &[f64],
        pits: Option<&[usize]>,
    ) -> (DepressionMap, Vec<usize>) {
        let n = grid.number_of_nodes();
        let flood = priority_flood(grid, elevation);
        let is_flooded = |i: usize| flood.level[i] > elevation[i];
        let pit_set: Option<BTreeSet<usize>> = pits.map(|p| p.iter().copied().collect());

        let mut by_discovery: Vec<usize> = (0..n).filter(|&i| is_flooded(i)).collect();
        by_discovery.sort_unstable_by_key(|&i| flood.order[i]);

        let mut depth = vec![0.0; n];
        let mut outlet = vec![NO_OUTLET; n];
        let mut status = vec![FloodStatus::Unflooded; n];
        let mut labelled = vec![false; n];
        let mut lake_outlets = BTreeSet::new();

        for &start in &by_discovery {
            if labelled[start] {
                continue;
            }
            // First-discovered member of a lake: its flood parent is dry and
            // sits exactly at the lake level.
            let lake_level = flood.level[start];
            let lake_outlet = flood.parent[start];
            let mut members = vec![start];
            let mut queue = VecDeque::from([start]);
            labelled[start] = true;
            while let Some(node) = queue.pop_front() {
                for (nb, _) in grid.d8_neighbors(node) {
                    if !labelled[nb] && is_flooded(nb) && flood.level[nb] == lake_level {
                        labelled[nb] = true;
                        members.push(nb);
                        queue.push_back(nb);
                    }
                }
            }

            if let Some(pit_set) = &pit_set {
                if !members.iter().any(|m| pit_set.contains(m)) {
                    continue;
                }
            }

            lake_outlets.insert(lake_outlet);
            for &m in &members {
                depth[m] = depth_to_level(elevation[m], lake_level);
                outlet[m] = lake_outlet;
                status[m] = match &pit_set {
                    Some(p) if p.contains(&m) => FloodStatus::Pit,
                    _ => FloodStatus::Flooded,
                };
            }
        }

        let map = DepressionMap {
            depth,
            outlet,
            status,
            lake_outlets: lake_outlets.into_iter().collect(),
        };
        (map, flood.parent)
    }
}

impl DepressionMapper for PriorityFloodMapper {
    fn output_fields(&self) -> &[&'static str] {
        &[DEPRESSION_DEPTH_FIELD, DEPRESSION_OUTLET_FIELD, FLOOD_STATUS_FIELD]
    }

    fn map_depressions(
        &mut self,
        grid: &mut RasterGrid,
        elevation_field: &str,
        pits: Option<&[usize]>,
        reroute_flow: bool,
    ) -> Result<DepressionMap, FieldError> {
        let (map, parent) = Self::compute(grid, grid.float(elevation_field)?, pits);

        if reroute_flow {
            let receiver = grid.index_mut(RECEIVER_NODE_FIELD)?;
            for (i, &o) in map.outlet.iter().enumerate() {
                if o != NO_OUTLET {
                    receiver[i] = parent[i];
                }
            }
        }

        let codes = map.status.iter().map(|s| s.code()).collect();
        grid.set_field(DEPRESSION_DEPTH_FIELD, NodeField::Float(map.depth.clone()))?;
        grid.set_field(DEPRESSION_OUTLET_FIELD, NodeField::Index(map.outlet.clone()))?;
        grid.set_field(FLOOD_STATUS_FIELD, NodeField::Index(codes))?;
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::{HeightField, ELEVATION_FIELD};
    use crate::hydraulic::flow_routing::{D8Router, FlowRouter};

    /// 5×5 grid at `rim` with a 3×3 basin at `floor` and one low rim node.
    fn make_basin(rim: f64, floor: f64, spill: f64) -> RasterGrid {
        let mut hf = HeightField::new(5, 5, 1.0, rim);
        for r in 1..4 {
            for c in 1..4 {
                hf.set(r, c, floor);
            }
        }
        hf.set(2, 0, spill);
        hf.into_grid().unwrap()
    }

    #[test]
    fn basin_floods_to_spill_level_through_single_outlet() {
        let mut grid = make_basin(10.0, 1.0, 4.0);
        let map = PriorityFloodMapper
            .map_depressions(&mut grid, ELEVATION_FIELD, None, false)
            .unwrap();
        let outlet = grid.node_id(2, 0);
        assert_eq!(map.lake_outlets, vec![outlet]);
        let lake = map.lake_nodes(outlet);
        assert_eq!(lake.len(), 9);
        for &n in &lake {
            assert_eq!(map.depth[n], 3.0);
        }
        assert_eq!(map.flooded_nodes(), lake);
        assert_eq!(grid.float(DEPRESSION_DEPTH_FIELD).unwrap()[grid.node_id(2, 2)], 3.0);
        assert_eq!(grid.index(FLOOD_STATUS_FIELD).unwrap()[grid.node_id(2, 2)], 3);
    }

    #[test]
    fn pit_filter_ignores_lakes_without_pits() {
        let mut grid = make_basin(10.0, 1.0, 4.0);
        let corner = [grid.node_id(0, 0)];
        let map = PriorityFloodMapper
            .map_depressions(&mut grid, ELEVATION_FIELD, Some(&corner[..]), false)
            .unwrap();
        assert!(map.is_empty());
        assert!(map.depth.iter().all(|&d| d == 0.0));

        let centre = grid.node_id(2, 2);
        let pits = [centre];
        let map = PriorityFloodMapper
            .map_depressions(&mut grid, ELEVATION_FIELD, Some(&pits[..]), false)
            .unwrap();
        assert_eq!(map.lake_outlets.len(), 1);
        assert_eq!(map.status[centre], FloodStatus::Pit);
        assert_eq!(map.status[grid.node_id(1, 1)], FloodStatus::Flooded);
    }

    #[test]
    fn separate_basins_get_separate_outlets() {
        // Two single-cell pits divided by a ridge, each spilling to a
        // different boundary node.
        let mut hf = HeightField::new(6, 3, 1.0, 9.0);
        hf.set(1, 1, 0.0);
        hf.set(1, 4, 0.0);
        hf.set(0, 1, 3.0);
        hf.set(2, 4, 5.0);
        let mut grid = hf.into_grid().unwrap();
        let map = PriorityFloodMapper
            .map_depressions(&mut grid, ELEVATION_FIELD, None, false)
            .unwrap();
        assert_eq!(map.lake_outlets, vec![grid.node_id(0, 1), grid.node_id(2, 4)]);
        assert_eq!(map.depth[grid.node_id(1, 1)], 3.0);
        assert_eq!(map.depth[grid.node_id(1, 4)], 5.0);
    }

    #[test]
    fn filled_surface_has_no_lakes() {
        let mut grid = make_basin(10.0, 4.0, 4.0);
        let map = PriorityFloodMapper
            .map_depressions(&mut grid, ELEVATION_FIELD, None, false)
            .unwrap();
        assert!(map.is_empty());
        assert!(map.flooded_nodes().is_empty());
    }

    #[test]
    fn flood_queue_pops_lowest_level_then_oldest() {
        let mut heap: BinaryHeap<FloodEntry> = BinaryHeap::new();
        let pushes = [(2.0, 10), (1.0, 11), (1.0, 12), (-0.5, 13), (1.0, 14)];
        for (seq, &(level, node)) in pushes.iter().enumerate() {
            heap.push(Reverse((OrderedFloat(level), seq as u64, node)));
        }
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse((_, _, node))| node)
            .collect();
        assert_eq!(order, vec![13, 11, 12, 14, 10]);
    }

    #[test]
    fn depth_always_reaches_level() {
        for &(z, level) in &[(0.1, 0.3), (1e-9, 7.7), (123.456, 123.4567), (-2.5, 0.1)] {
            let d = depth_to_level(z, level);
            assert!(z + d >= level, "{z} + {d} < {level}");
            assert!(d >= 0.0);
        }
    }

    #[test]
    fn reroute_points_lake_nodes_towards_outlet() {
        let mut grid = make_basin(10.0, 1.0, 4.0);
        D8Router.route_flow(&mut grid, ELEVATION_FIELD).unwrap();
        let map = PriorityFloodMapper
            .map_depressions(&mut grid, ELEVATION_FIELD, None, true)
            .unwrap();
        let outlet = map.lake_outlets[0];
        let receiver = grid.index(RECEIVER_NODE_FIELD).unwrap().to_vec();
        for node in map.lake_nodes(outlet) {
            // Follow receivers; every lake node must reach the outlet.
            let mut cur = node;
            for _ in 0..grid.number_of_nodes() {
                if cur == outlet {
                    break;
                }
                cur = receiver[cur];
            }
            assert_eq!(cur, outlet, "node {node} does not drain to the outlet");
        }
    }
}
