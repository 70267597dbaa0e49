//! Regular raster grid with named per-node fields.
//!
//! Nodes are numbered row-major; node `r * cols + c` sits at
//! `(c * spacing, r * spacing)`. Perimeter nodes are open boundaries: flow
//! leaves the domain through them, so they are never pits and never flooded.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// (d_row, d_col) of the four orthogonal neighbours: E, N, W, S.
pub const ORTHOGONAL_OFFSETS: [(isize, isize); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
/// (d_row, d_col) of the four diagonal neighbours: NE, NW, SW, SE.
pub const DIAGONAL_OFFSETS: [(isize, isize); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

/// Values of one node field. Scalars are `f64`; node references are `usize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum NodeField {
    Float(Vec<f64>),
    Index(Vec<usize>),
}

impl NodeField {
    pub fn len(&self) -> usize {
        match self {
            NodeField::Float(v) => v.len(),
            NodeField::Index(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterGrid {
    pub rows: usize,
    pub cols: usize,
    /// Node spacing in both directions.
    pub spacing: f64,
    at_node: BTreeMap<String, NodeField>,
}

impl RasterGrid {
    pub fn new(rows: usize, cols: usize, spacing: f64) -> Self {
        Self {
            rows,
            cols,
            spacing,
            at_node: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn number_of_nodes(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub fn node_id(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn row_col(&self, node: usize) -> (usize, usize) {
        (node / self.cols, node % self.cols)
    }

    pub fn is_boundary(&self, node: usize) -> bool {
        let (r, c) = self.row_col(node);
        r == 0 || c == 0 || r + 1 == self.rows || c + 1 == self.cols
    }

    pub fn boundary_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.number_of_nodes()).filter(move |&n| self.is_boundary(n))
    }

    pub fn core_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.number_of_nodes()).filter(move |&n| !self.is_boundary(n))
    }

    #[inline]
    pub fn coordinates(&self, node: usize) -> (f64, f64) {
        let (r, c) = self.row_col(node);
        (c as f64 * self.spacing, r as f64 * self.spacing)
    }

    fn offset(&self, node: usize, (dr, dc): (isize, isize)) -> Option<usize> {
        let (r, c) = self.row_col(node);
        let nr = r as isize + dr;
        let nc = c as isize + dc;
        if nr < 0 || nc < 0 || nr >= self.rows as isize || nc >= self.cols as isize {
            return None;
        }
        Some(nr as usize * self.cols + nc as usize)
    }

    /// In-bounds orthogonal neighbours of `node`.
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        ORTHOGONAL_OFFSETS
            .iter()
            .filter_map(move |&o| self.offset(node, o))
    }

    /// In-bounds diagonal neighbours of `node`.
    pub fn diagonal_neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        DIAGONAL_OFFSETS
            .iter()
            .filter_map(move |&o| self.offset(node, o))
    }

    /// In-bounds D8 neighbours paired with their distance from `node`.
    pub fn d8_neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let diagonal = self.spacing * std::f64::consts::SQRT_2;
        self.neighbors(node)
            .map(move |n| (n, self.spacing))
            .chain(self.diagonal_neighbors(node).map(move |n| (n, diagonal)))
    }

    /// Union of the orthogonal neighbours of every node in `nodes`.
    pub fn neighbors_of<'a>(&self, nodes: impl IntoIterator<Item = &'a usize>) -> BTreeSet<usize> {
        nodes
            .into_iter()
            .flat_map(|&n| self.neighbors(n))
            .collect()
    }

    /// Union of the diagonal neighbours of every node in `nodes`.
    pub fn diagonals_of<'a>(&self, nodes: impl IntoIterator<Item = &'a usize>) -> BTreeSet<usize> {
        nodes
            .into_iter()
            .flat_map(|&n| self.diagonal_neighbors(n))
            .collect()
    }

    /// Planar distance from `point` to each node of `nodes`, in order.
    pub fn distances_to_point(&self, point: (f64, f64), nodes: &[usize]) -> Vec<f64> {
        nodes
            .iter()
            .map(|&n| {
                let (x, y) = self.coordinates(n);
                (x - point.0).hypot(y - point.1)
            })
            .collect()
    }

    // ── Node fields ──────────────────────────────────────────────────────────

    pub fn has_field(&self, name: &str) -> bool {
        self.at_node.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.at_node.keys().map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Result<&NodeField, FieldError> {
        self.at_node
            .get(name)
            .ok_or_else(|| FieldError::NotFound(name.to_string()))
    }

    pub fn float(&self, name: &str) -> Result<&[f64], FieldError> {
        match self.field(name)? {
            NodeField::Float(v) => Ok(v),
            NodeField::Index(_) => Err(FieldError::WrongKind {
                name: name.to_string(),
                expected: "float",
            }),
        }
    }

    pub fn float_mut(&mut self, name: &str) -> Result<&mut [f64], FieldError> {
        match self.at_node.get_mut(name) {
            Some(NodeField::Float(v)) => Ok(v),
            Some(NodeField::Index(_)) => Err(FieldError::WrongKind {
                name: name.to_string(),
                expected: "float",
            }),
            None => Err(FieldError::NotFound(name.to_string())),
        }
    }

    pub fn index(&self, name: &str) -> Result<&[usize], FieldError> {
        match self.field(name)? {
            NodeField::Index(v) => Ok(v),
            NodeField::Float(_) => Err(FieldError::WrongKind {
                name: name.to_string(),
                expected: "index",
            }),
        }
    }

    pub fn index_mut(&mut self, name: &str) -> Result<&mut [usize], FieldError> {
        match self.at_node.get_mut(name) {
            Some(NodeField::Index(v)) => Ok(v),
            Some(NodeField::Float(_)) => Err(FieldError::WrongKind {
                name: name.to_string(),
                expected: "index",
            }),
            None => Err(FieldError::NotFound(name.to_string())),
        }
    }

    /// Insert or replace a field, returning the previous values if any.
    pub fn set_field(
        &mut self,
        name: &str,
        values: NodeField,
    ) -> Result<Option<NodeField>, FieldError> {
        if values.len() != self.number_of_nodes() {
            return Err(FieldError::Shape {
                name: name.to_string(),
                expected: self.number_of_nodes(),
                actual: values.len(),
            });
        }
        Ok(self.at_node.insert(name.to_string(), values))
    }

    /// Create (or reset) a float field of zeros.
    pub fn add_zeros(&mut self, name: &str) {
        let n = self.number_of_nodes();
        self.at_node
            .insert(name.to_string(), NodeField::Float(vec![0.0; n]));
    }

    pub fn delete_field(&mut self, name: &str) -> Result<NodeField, FieldError> {
        self.at_node
            .remove(name)
            .ok_or_else(|| FieldError::NotFound(name.to_string()))
    }
}
