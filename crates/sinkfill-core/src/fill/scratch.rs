//! Scoped ownership of the collaborators' working fields on a grid.
//!
//! [`ScratchFields::open`] records which of the named fields already exist
//! and copies their values. Closing (or dropping) the guard deletes the
//! fields that were created inside the scope and puts the saved ones back.
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::error::{FillError, Result};
use crate::grid::{NodeField, RasterGrid};

pub struct ScratchFields<'g> {
    grid: &'g mut RasterGrid,
    saved: BTreeMap<String, NodeField>,
    created: BTreeSet<String>,
    closed: bool,
}

impl<'g> ScratchFields<'g> {
    pub fn open<'n>(grid: &'g mut RasterGrid, names: impl IntoIterator<Item = &'n str>) -> Self {
        let mut saved = BTreeMap::new();
        let mut created = BTreeSet::new();
        for name in names {
            match grid.field(name) {
                Ok(values) => {
                    saved.insert(name.to_string(), values.clone());
                }
                Err(_) => {
                    created.insert(name.to_string());
                }
            }
        }
        Self { grid, saved, created, closed: false }
    }

    /// Restore the grid, reporting any field that went missing or changed
    /// shape inside the scope.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.restore(true)
    }

    fn restore(&mut self, strict: bool) -> Result<()> {
        let mut first_error = None;
        let expected = self.grid.number_of_nodes();

        for name in std::mem::take(&mut self.created) {
            if self.grid.delete_field(&name).is_err() && strict {
                first_error.get_or_insert(FillError::FieldBookkeeping {
                    name,
                    problem: "was never created".to_string(),
                });
            }
        }

        for (name, values) in std::mem::take(&mut self.saved) {
            let problem = match self.grid.field(&name) {
                Err(_) => Some("went missing".to_string()),
                Ok(current) if current.len() != expected => {
                    Some(format!("has {} values, expected {expected}", current.len()))
                }
                Ok(_) => None,
            };
            if let Err(e) = self.grid.set_field(&name, values) {
                first_error.get_or_insert(FillError::Field(e));
            }
            match problem {
                Some(problem) if strict => {
                    first_error.get_or_insert(FillError::FieldBookkeeping { name, problem });
                }
                _ => {}
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Deref for ScratchFields<'_> {
    type Target = RasterGrid;

    fn deref(&self) -> &RasterGrid {
        &*self.grid
    }
}

impl DerefMut for ScratchFields<'_> {
    fn deref_mut(&mut self) -> &mut RasterGrid {
        &mut *self.grid
    }
}

impl Drop for ScratchFields<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.restore(false) {
                warn!("scratch field cleanup failed: {e}");
            }
        }
    }
}
