//! D8 steepest-descent flow directions and pit detection.
use crate::error::FieldError;
use crate::grid::{NodeField, RasterGrid};

pub const RECEIVER_NODE_FIELD: &str = "flow__receiver_node";
pub const STEEPEST_SLOPE_FIELD: &str = "topographic__steepest_slope";
pub const SINK_FLAG_FIELD: &str = "flow__sink_flag";

/// Computes flow directions on a grid and reports pits.
pub trait FlowRouter {
    /// Node fields written by [`route_flow`](FlowRouter::route_flow).
    fn output_fields(&self) -> &[&'static str];

    /// Route flow over `elevation_field`, publish the direction fields on
    /// `grid`, and return the core nodes that have no downhill neighbour.
    fn route_flow(
        &mut self,
        grid: &mut RasterGrid,
        elevation_field: &str,
    ) -> Result<Vec<usize>, FieldError>;
}

pub struct FlowField {
    /// D8 receiver of each node; a node that receives itself is a sink.
    pub receiver: Vec<usize>,
    /// Drop per unit distance towards the receiver (0 for sinks).
    pub steepest_slope: Vec<f64>,
}

impl FlowField {
    /// Core nodes that drain to themselves.
    pub fn pits(&self, grid: &RasterGrid) -> Vec<usize> {
        grid.core_nodes()
            .filter(|&n| self.receiver[n] == n)
            .collect()
    }
}

/// Steepest strictly-downhill D8 receiver of every node. Boundary nodes are
/// outlets of the domain and always receive themselves.
pub fn compute_d8_flow(grid: &RasterGrid, elevation: &[f64]) -> FlowField {
    let n = grid.number_of_nodes();
    let mut receiver: Vec<usize> = (0..n).collect();
    let mut steepest_slope = vec![0.0; n];

    for node in grid.core_nodes() {
        let z0 = elevation[node];
        for (nb, dist) in grid.d8_neighbors(node) {
            let drop = (z0 - elevation[nb]) / dist;
            if drop > steepest_slope[node] {
                steepest_slope[node] = drop;
                receiver[node] = nb;
            }
        }
    }

    FlowField { receiver, steepest_slope }
}

/// The default [`FlowRouter`]: D8 steepest descent.
#[derive(Debug, Default, Clone, Copy)]
pub struct D8Router;

impl FlowRouter for D8Router {
    fn output_fields(&self) -> &[&'static str] {
        &[RECEIVER_NODE_FIELD, STEEPEST_SLOPE_FIELD, SINK_FLAG_FIELD]
    }

    fn route_flow(
        &mut self,
        grid: &mut RasterGrid,
        elevation_field: &str,
    ) -> Result<Vec<usize>, FieldError> {
        let flow = compute_d8_flow(grid, grid.float(elevation_field)?);
        let pits = flow.pits(grid);

        let mut sink_flag = vec![0usize; grid.number_of_nodes()];
        for &p in &pits {
            sink_flag[p] = 1;
        }
        grid.set_field(RECEIVER_NODE_FIELD, NodeField::Index(flow.receiver))?;
        grid.set_field(STEEPEST_SLOPE_FIELD, NodeField::Float(flow.steepest_slope))?;
        grid.set_field(SINK_FLAG_FIELD, NodeField::Index(sink_flag))?;
        Ok(pits)
    }
}
