//! Depression filling for raster elevation grids.
//!
//! [`HoleFiller`] raises every closed depression to the level of its outlet
//! so that each node has a downhill path off the grid, optionally leaving a
//! small gradient down towards the outlet. Flow directions and depression
//! membership come from the [`FlowRouter`] and [`DepressionMapper`]
//! collaborators in [`hydraulic`].
pub mod config;
pub mod error;
pub mod fill;
pub mod grid;
pub mod heightfield;
pub mod hydraulic;

pub use config::FillConfig;
pub use error::{FieldError, FillError};
pub use fill::{FillReport, HoleFiller, SEDIMENT_FILL_DEPTH_FIELD};
pub use grid::{NodeField, RasterGrid};
pub use heightfield::{HeightField, ELEVATION_FIELD};
pub use hydraulic::{DepressionMapper, FlowRouter};
