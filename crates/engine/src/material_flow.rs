//! Material flow between machines.

use std::collections::{HashMap, HashSet};

use factory_layout_core::{distance, Error, FlowCost, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingArea, Machine};

/// One row of the material-flow table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlowEntry {
    /// Id of the sending machine.
    pub source: String,
    /// Id of the receiving machine.
    pub sink: String,
    /// Transport intensity.
    pub intensity: f64,
}

impl FlowEntry {
    /// Creates an entry.
    pub fn new(source: impl Into<String>, sink: impl Into<String>, intensity: f64) -> Self {
        Self {
            source: source.into(),
            sink: sink.into(),
            intensity,
        }
    }
}

/// Aggregated flow between an ordered machine pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialFlowEdge {
    /// Machine the material leaves.
    pub source: String,
    /// Machine the material arrives at.
    pub sink: String,
    /// Sum of the intensities of all entries for this pair.
    pub intensity_sum: f64,
    /// `intensity_sum` divided by the largest sum; 0 when that is 0.
    pub intensity_norm: f64,
    /// Distance between the machine centroids.
    pub distance: f64,
    /// Normalized distance times normalized intensity.
    pub cost: f64,
}

/// Validated material-flow table.
#[derive(Debug, Clone, Default)]
pub struct MaterialFlow {
    entries: Vec<FlowEntry>,
}

impl MaterialFlow {
    /// Validates `entries` against the machine registry.
    ///
    /// Unknown endpoints fail with [`Error::UnknownMachine`], negative or
    /// non-finite intensities with [`Error::InvalidInput`].
    pub fn new(entries: Vec<FlowEntry>, machines: &[Machine]) -> Result<Self> {
        let ids: HashSet<&str> = machines.iter().map(Machine::id).collect();
        for entry in &entries {
            for id in [&entry.source, &entry.sink] {
                if !ids.contains(id.as_str()) {
                    return Err(Error::UnknownMachine(id.clone()));
                }
            }
            if !entry.intensity.is_finite() || entry.intensity < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "intensity {} of flow {} -> {}",
                    entry.intensity, entry.source, entry.sink
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Raw entries.
    pub fn entries(&self) -> &[FlowEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregates duplicate pairs and measures them on the current layout.
    ///
    /// Edges are returned in order of the first entry of each pair.
    pub fn edges(&self, machines: &[Machine], bounding: &BoundingArea) -> Vec<MaterialFlowEdge> {
        let mut sums: Vec<(&str, &str, f64)> = Vec::new();
        let mut slots: HashMap<(&str, &str), usize> = HashMap::new();
        for entry in &self.entries {
            let key = (entry.source.as_str(), entry.sink.as_str());
            match slots.get(&key) {
                Some(&i) => sums[i].2 += entry.intensity,
                None => {
                    slots.insert(key, sums.len());
                    sums.push((key.0, key.1, entry.intensity));
                }
            }
        }

        let max_sum = sums.iter().map(|s| s.2).fold(0.0, f64::max);
        let scale = bounding.width().max(bounding.height());
        let centers: HashMap<&str, (f64, f64)> = machines
            .iter()
            .filter_map(|m| m.center().map(|c| (m.id(), (c.x(), c.y()))))
            .collect();

        sums.into_iter()
            .filter_map(|(source, sink, intensity_sum)| {
                let d = distance(*centers.get(source)?, *centers.get(sink)?);
                let intensity_norm = if max_sum > 0.0 { intensity_sum / max_sum } else { 0.0 };
                let distance_norm = if scale > 0.0 { d / scale } else { 0.0 };
                Some(MaterialFlowEdge {
                    source: source.to_string(),
                    sink: sink.to_string(),
                    intensity_sum,
                    intensity_norm,
                    distance: d,
                    cost: distance_norm * intensity_norm,
                })
            })
            .collect()
    }

    /// Scoring inputs for the current layout.
    pub fn costs(&self, machines: &[Machine], bounding: &BoundingArea) -> Vec<FlowCost> {
        let scale = bounding.width().max(bounding.height());
        self.edges(machines, bounding)
            .into_iter()
            .map(|e| FlowCost {
                intensity_norm: e.intensity_norm,
                distance_norm: if scale > 0.0 { e.distance / scale } else { 0.0 },
            })
            .collect()
    }
}
