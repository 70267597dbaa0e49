//! Routing collaborators used by the filler: D8 flow directions and
//! depression mapping.
pub mod depressions;
pub mod flow_routing;

pub use depressions::{DepressionMap, DepressionMapper, FloodStatus, PriorityFloodMapper};
pub use flow_routing::{compute_d8_flow, D8Router, FlowField, FlowRouter};
