use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::grid::{NodeField, RasterGrid};

/// Default node field holding surface elevation.
pub const ELEVATION_FIELD: &str = "topographic__elevation";

/// A 2D heightfield storing elevation in metres, row-major.
/// This is the on-disk form of a grid's elevation field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightField {
    /// Row-major elevation values in metres.
    pub data: Vec<f64>,
    pub width: usize,
    pub height: usize,
    /// Node spacing in metres.
    #[serde(default = "default_spacing")]
    pub spacing: f64,
}

fn default_spacing() -> f64 {
    1.0
}

impl HeightField {
    /// Create a new HeightField filled with the given value.
    pub fn new(width: usize, height: usize, spacing: f64, fill: f64) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            spacing,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f64) {
        self.data[row * self.width + col] = val;
    }

    pub fn min_elevation(&self) -> f64 {
        self.data.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max_elevation(&self) -> f64 {
        self.data.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Build a grid whose `topographic__elevation` field holds `data`.
    pub fn into_grid(self) -> Result<RasterGrid, FieldError> {
        let mut grid = RasterGrid::new(self.height, self.width, self.spacing);
        grid.set_field(ELEVATION_FIELD, NodeField::Float(self.data))?;
        Ok(grid)
    }

    /// Copy float field `name` out of `grid`.
    pub fn from_field(grid: &RasterGrid, name: &str) -> Result<Self, FieldError> {
        Ok(Self {
            data: grid.float(name)?.to_vec(),
            width: grid.cols,
            height: grid.rows,
            spacing: grid.spacing,
        })
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_round_trip_keeps_layout() {
        let mut hf = HeightField::new(3, 2, 5.0, 1.0);
        hf.set(1, 2, 7.5);
        let grid = hf.clone().into_grid().unwrap();
        assert_eq!(grid.rows, 2);
        assert_eq!(grid.cols, 3);
        assert_eq!(grid.float(ELEVATION_FIELD).unwrap()[grid.node_id(1, 2)], 7.5);
        let back = HeightField::from_field(&grid, ELEVATION_FIELD).unwrap();
        assert_eq!(back, hf);
    }

    #[test]
    fn json_without_spacing_defaults_to_unit_cells() {
        let hf = HeightField::from_json(r#"{"data":[1,2,3,4],"width":2,"height":2}"#).unwrap();
        assert_eq!(hf.spacing, 1.0);
        assert_eq!(hf.min_elevation(), 1.0);
        assert_eq!(hf.max_elevation(), 4.0);
    }

    #[test]
    fn mismatched_data_length_is_rejected() {
        let hf = HeightField {
            data: vec![0.0; 5],
            width: 2,
            height: 2,
            spacing: 1.0,
        };
        assert!(matches!(hf.into_grid(), Err(FieldError::Shape { actual: 5, .. })));
    }
}
