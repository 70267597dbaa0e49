//! Pit filling: raise every closed depression to the level of its outlet,
//! optionally tilting the filled surface down towards the outlet.
//!
//! A sloped fill is only kept if drainage direction at the margins of every
//! filled lake is the same as on the original surface. Otherwise the slope
//! is reduced tenfold and the tilt is redone from the flat fill, up to
//! `max_stability_retries` times.
pub mod margins;
pub mod scratch;
pub mod slope;

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{resolve_slope, FillConfig};
use crate::error::{FillError, Result};
use crate::grid::{NodeField, RasterGrid};
use crate::heightfield::ELEVATION_FIELD;
use crate::hydraulic::{D8Router, DepressionMap, DepressionMapper, FlowRouter, PriorityFloodMapper};
use margins::drainage_direction_changed;
use scratch::ScratchFields;
use slope::{SlopeApplier, TiltOutcome};

/// Output field: elevation added at each node by the last fill.
pub const SEDIMENT_FILL_DEPTH_FIELD: &str = "sediment_fill__depth";

/// Summary of one successful [`HoleFiller::fill_pits`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillReport {
    pub pits: usize,
    pub lakes: usize,
    /// Slope passed to `fill_pits`; `None` for a flat fill.
    pub requested_slope: Option<f64>,
    /// Gentlest slope any lake was tilted with, after global retries and
    /// per-lake reductions. `None` when no lake was tilted: a flat fill, or
    /// a sloped request on a surface with nothing to fill.
    pub applied_slope: Option<f64>,
    pub stability_retries: u32,
    pub subsidiary_rounds: u32,
    pub max_fill_depth: f64,
}

struct SlopedFill {
    slope: f64,
    retries: u32,
    subsidiary_rounds: u32,
}

/// Lakes tilted during one attempt, and the outlets they drain through.
struct TiltedLakes {
    nodes: BTreeSet<usize>,
    outlets: BTreeSet<usize>,
    subsidiary_rounds: u32,
    gentlest_slope: f64,
}

pub struct HoleFiller<R = D8Router, M = PriorityFloodMapper> {
    elevation_field: String,
    config: FillConfig,
    router: R,
    mapper: M,
}

impl HoleFiller {
    /// Filler with the default D8 router and priority-flood mapper.
    pub fn new(grid: &mut RasterGrid, config: FillConfig) -> Result<Self> {
        Self::with_collaborators(grid, config, D8Router, PriorityFloodMapper)
    }
}

impl<R: FlowRouter, M: DepressionMapper> HoleFiller<R, M> {
    /// Resolve the elevation field and create the zeroed
    /// `sediment_fill__depth` output field.
    pub fn with_collaborators(
        grid: &mut RasterGrid,
        config: FillConfig,
        router: R,
        mapper: M,
    ) -> Result<Self> {
        config.validate()?;
        let elevation_field = resolve_elevation_field(grid, &config)?;
        grid.add_zeros(SEDIMENT_FILL_DEPTH_FIELD);
        Ok(Self {
            elevation_field,
            config,
            router,
            mapper,
        })
    }

    pub fn elevation_field(&self) -> &str {
        &self.elevation_field
    }

    pub fn config(&self) -> &FillConfig {
        &self.config
    }

    /// Fill every depression on `grid`.
    ///
    /// With `apply_slope` set, filled lakes are tilted by that gradient
    /// towards their outlets (reduced as needed to keep drainage at the
    /// lake margins unchanged). On [`FillError::StabilityFailure`] the
    /// elevation field is restored to its state before the call.
    /// Routing fields created on the grid during the call are removed and
    /// pre-existing ones restored on every path.
    pub fn fill_pits(&mut self, grid: &mut RasterGrid, apply_slope: Option<f64>) -> Result<FillReport> {
        let apply_slope = resolve_slope(apply_slope)?;
        info!(field = %self.elevation_field, slope = ?apply_slope, "filling depressions");
        let original = grid.float(&self.elevation_field)?.to_vec();

        let working: Vec<&'static str> = self
            .router
            .output_fields()
            .iter()
            .chain(self.mapper.output_fields())
            .copied()
            .collect();
        let mut scratch = ScratchFields::open(grid, working);

        let pits = self.router.route_flow(&mut scratch, &self.elevation_field)?;
        let primary =
            self.mapper
                .map_depressions(&mut scratch, &self.elevation_field, Some(pits.as_slice()), false)?;
        add_depths(scratch.float_mut(&self.elevation_field)?, &primary.depth);
        debug!(pits = pits.len(), lakes = primary.lake_outlets.len(), "flat fill applied");

        let sloped = match apply_slope {
            Some(slope) if !primary.is_empty() => {
                let outcome = self.sloped_fill(&mut scratch, &original, &primary, slope);
                if outcome.is_err() {
                    scratch
                        .float_mut(&self.elevation_field)?
                        .copy_from_slice(&original);
                }
                Some(outcome)
            }
            _ => None,
        };
        scratch.close()?;
        let sloped = sloped.transpose()?;

        let filled = grid.float(&self.elevation_field)?;
        let fill_depth: Vec<f64> = filled
            .iter()
            .zip(&original)
            .map(|(z, z0)| z - z0)
            .collect();
        let max_fill_depth = fill_depth.iter().copied().fold(0.0, f64::max);
        grid.set_field(SEDIMENT_FILL_DEPTH_FIELD, NodeField::Float(fill_depth))?;

        let report = FillReport {
            pits: pits.len(),
            lakes: primary.lake_outlets.len(),
            requested_slope: apply_slope,
            applied_slope: sloped.as_ref().map(|s| s.slope),
            stability_retries: sloped.as_ref().map_or(0, |s| s.retries),
            subsidiary_rounds: sloped.as_ref().map_or(0, |s| s.subsidiary_rounds),
            max_fill_depth,
        };
        info!(
            pits = report.pits,
            lakes = report.lakes,
            slope = ?report.applied_slope,
            retries = report.stability_retries,
            max_fill_depth,
            "depressions filled"
        );
        Ok(report)
    }

    /// Tilt the flat-filled lakes, retrying with smaller slopes until the
    /// margins of every tilted lake drain as they did on `original`.
    fn sloped_fill(
        &mut self,
        grid: &mut RasterGrid,
        original: &[f64],
        primary: &DepressionMap,
        initial_slope: f64,
    ) -> Result<SlopedFill> {
        let flat = grid.float(&self.elevation_field)?.to_vec();
        let applier = SlopeApplier::new(self.config.slope_reduction, self.config.min_slope);
        let mut slope = initial_slope;
        let mut retries = 0;

        loop {
            if let Some(tilted) = self.tilt_lakes(grid, primary, &applier, slope)? {
                let current = grid.float(&self.elevation_field)?;
                if !drainage_direction_changed(grid, &tilted.nodes, &tilted.outlets, original, current) {
                    return Ok(SlopedFill {
                        slope: tilted.gentlest_slope,
                        retries,
                        subsidiary_rounds: tilted.subsidiary_rounds,
                    });
                }
            }

            retries += 1;
            warn!(slope, retries, "sloped fill reverses drainage at a lake margin");
            if retries >= self.config.max_stability_retries {
                return Err(FillError::StabilityFailure {
                    retries,
                    last_slope: slope,
                });
            }
            slope *= self.config.slope_reduction;
            grid.float_mut(&self.elevation_field)?.copy_from_slice(&flat);
        }
    }

    /// One attempt: tilt the primary lakes, then fill and tilt any lakes the
    /// tilting created until the surface has none. `None` means some lake
    /// could not be tilted stably.
    fn tilt_lakes(
        &mut self,
        grid: &mut RasterGrid,
        primary: &DepressionMap,
        applier: &SlopeApplier,
        slope: f64,
    ) -> Result<Option<TiltedLakes>> {
        let mut lakes = lakes_of(primary);
        let mut subsidiary = false;
        let mut tilted = TiltedLakes {
            nodes: BTreeSet::new(),
            outlets: BTreeSet::new(),
            subsidiary_rounds: 0,
            gentlest_slope: slope,
        };

        loop {
            for (outlet, nodes) in &lakes {
                let elevation = grid.float(&self.elevation_field)?;
                let lifted = match applier.apply_to_lake(grid, elevation, slope, *outlet, nodes, subsidiary) {
                    TiltOutcome::Accepted { slope: accepted, elevations } => {
                        tilted.gentlest_slope = tilted.gentlest_slope.min(accepted);
                        elevations
                    }
                    TiltOutcome::Unstable { smallest_slope } => {
                        debug!(outlet, smallest_slope, "no stable tilt for lake");
                        return Ok(None);
                    }
                };
                let elevation = grid.float_mut(&self.elevation_field)?;
                for (&node, z) in nodes.iter().zip(lifted) {
                    elevation[node] = z;
                }
                tilted.nodes.extend(nodes.iter().copied());
                tilted.outlets.insert(*outlet);
            }

            let remap = self
                .mapper
                .map_depressions(grid, &self.elevation_field, None, false)?;
            if remap.is_empty() {
                return Ok(Some(tilted));
            }
            if tilted.subsidiary_rounds >= self.config.max_subsidiary_rounds {
                warn!(
                    rounds = tilted.subsidiary_rounds,
                    "subsidiary lakes keep appearing; abandoning this slope"
                );
                return Ok(None);
            }
            tilted.subsidiary_rounds += 1;
            debug!(
                round = tilted.subsidiary_rounds,
                lakes = remap.lake_outlets.len(),
                "filling subsidiary lakes"
            );
            add_depths(grid.float_mut(&self.elevation_field)?, &remap.depth);
            lakes = lakes_of(&remap);
            subsidiary = true;
        }
    }
}

fn resolve_elevation_field(grid: &RasterGrid, config: &FillConfig) -> Result<String> {
    if grid.has_field(ELEVATION_FIELD) {
        return Ok(ELEVATION_FIELD.to_string());
    }
    match &config.elevation_field {
        None => Err(FillError::NoElevationField {
            default: ELEVATION_FIELD,
        }),
        Some(name) if grid.has_field(name) => Ok(name.clone()),
        Some(name) => Err(FillError::MissingElevationField(name.clone())),
    }
}

fn add_depths(elevation: &mut [f64], depth: &[f64]) {
    for (z, d) in elevation.iter_mut().zip(depth) {
        *z += d;
    }
}

fn lakes_of(map: &DepressionMap) -> Vec<(usize, Vec<usize>)> {
    map.lake_outlets
        .iter()
        .map(|&outlet| (outlet, map.lake_nodes(outlet)))
        .collect()
}
