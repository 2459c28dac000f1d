//! Recipes: pure descriptions of networks
//!
//! A recipe answers, per gid, what the cell looks like and which connections
//! terminate on it. Recipes are side-effect-free and may be queried from any
//! thread, so model construction can interrogate them group by group.
//!
//! The built-in recipes mirror the classic benchmark networks: a ring, a
//! complete graph and a fixed-in-degree random graph, all over ball-and-stick
//! cells.

use crate::backend::Value;
use crate::cell::{Cell, Location, MechanismDesc};
use crate::error::Result;
use crate::types::{CellGid, CellLocalIndex, CellMember, TimeMs};

/// One incoming connection reported by a recipe.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionInfo {
    /// Source detector on the presynaptic cell
    pub source: CellMember,
    /// Target synapse index on the queried cell
    pub target_index: CellLocalIndex,
    /// Synaptic weight
    pub weight: Value,
    /// Conduction delay (ms)
    pub delay: TimeMs,
}

/// Pure, concurrently queryable network description.
pub trait Recipe: Sync {
    /// Total number of cells in the model.
    fn num_cells(&self) -> CellGid;

    /// Description of the cell with the given gid.
    fn cell_description(&self, gid: CellGid) -> Result<Cell>;

    /// Connections terminating on the given gid.
    fn connections_on(&self, gid: CellGid) -> Result<Vec<ConnectionInfo>>;
}

/// Shared parameters of the built-in recipes.
#[derive(Debug, Clone)]
pub struct BasicRecipeParam {
    /// Compartments per dendrite segment
    pub num_compartments: u32,
    /// Synapses per cell (fan-in); the complete graph overrides this
    pub num_synapses: usize,
    /// Synapse mechanism, `expsyn` or `exp2syn`
    pub synapse_type: String,
    /// Uniform conduction delay; also the network's minimum delay (ms)
    pub min_delay: TimeMs,
    /// Uniform synaptic weight (µS)
    pub weight: Value,
}

impl Default for BasicRecipeParam {
    fn default() -> Self {
        Self {
            num_compartments: 100,
            num_synapses: 500,
            synapse_type: "expsyn".into(),
            min_delay: 20.0,
            weight: 1e-4,
        }
    }
}

/// Which cells carry voltage probes, and where.
#[derive(Debug, Clone, Copy)]
pub struct ProbeDistribution {
    /// Fraction of cells probed, in [0, 1]
    pub proportion: f64,
    /// Probe the dendrite as well as the soma
    pub all_segments: bool,
}

impl Default for ProbeDistribution {
    fn default() -> Self {
        Self {
            proportion: 0.0,
            all_segments: true,
        }
    }
}

impl ProbeDistribution {
    // spread floor(n * proportion) probed cells evenly over the gid space
    fn is_probed(&self, gid: CellGid) -> bool {
        let lo = (gid as f64 * self.proportion).floor();
        let hi = ((gid + 1) as f64 * self.proportion).floor();
        hi > lo
    }
}

// the shared ball-and-stick cell of the benchmark networks: HH soma with a
// detector, passive dendrite carrying the synapses spread along its length
fn make_basic_cell(
    param: &BasicRecipeParam,
    pdist: &ProbeDistribution,
    gid: CellGid,
    num_synapses: usize,
) -> Cell {
    let mut cell = Cell::new(6.30785);
    cell.add_mechanism(0, MechanismDesc::new("hh"));
    let dend = cell.add_cable(0, 0.5, 200.0, param.num_compartments);
    cell.add_mechanism(dend, MechanismDesc::new("pas"));

    cell.add_detector(Location::new(0, 0.0), 20.0);

    for i in 0..num_synapses {
        let position = (i + 1) as f64 / (num_synapses + 1) as f64;
        cell.add_synapse(
            Location::new(dend, position),
            MechanismDesc::new(param.synapse_type.clone()),
        );
    }

    if pdist.is_probed(gid) {
        cell.add_probe(Location::new(0, 0.5));
        if pdist.all_segments {
            cell.add_probe(Location::new(dend, 0.5));
        }
    }
    cell
}

/// Ring network: cell `k` listens to cell `k - 1` (mod n).
#[derive(Debug, Clone)]
pub struct RingRecipe {
    num_cells: CellGid,
    param: BasicRecipeParam,
    pdist: ProbeDistribution,
}

impl RingRecipe {
    /// Create a ring of `num_cells` cells.
    pub fn new(num_cells: CellGid, param: BasicRecipeParam, pdist: ProbeDistribution) -> Self {
        Self {
            num_cells,
            param,
            pdist,
        }
    }
}

impl Recipe for RingRecipe {
    fn num_cells(&self) -> CellGid {
        self.num_cells
    }

    fn cell_description(&self, gid: CellGid) -> Result<Cell> {
        Ok(make_basic_cell(&self.param, &self.pdist, gid, 1))
    }

    fn connections_on(&self, gid: CellGid) -> Result<Vec<ConnectionInfo>> {
        let source = (gid + self.num_cells - 1) % self.num_cells;
        Ok(vec![ConnectionInfo {
            source: CellMember::new(source, 0),
            target_index: 0,
            weight: self.param.weight,
            delay: self.param.min_delay,
        }])
    }
}

/// Complete graph: every ordered pair of distinct cells is connected.
#[derive(Debug, Clone)]
pub struct CompleteGraphRecipe {
    num_cells: CellGid,
    param: BasicRecipeParam,
    pdist: ProbeDistribution,
}

impl CompleteGraphRecipe {
    /// Create an all-to-all network of `num_cells` cells.
    pub fn new(num_cells: CellGid, param: BasicRecipeParam, pdist: ProbeDistribution) -> Self {
        Self {
            num_cells,
            param,
            pdist,
        }
    }
}

impl Recipe for CompleteGraphRecipe {
    fn num_cells(&self) -> CellGid {
        self.num_cells
    }

    fn cell_description(&self, gid: CellGid) -> Result<Cell> {
        let fan_in = self.num_cells.saturating_sub(1) as usize;
        Ok(make_basic_cell(&self.param, &self.pdist, gid, fan_in))
    }

    fn connections_on(&self, gid: CellGid) -> Result<Vec<ConnectionInfo>> {
        Ok((0..self.num_cells)
            .filter(|&src| src != gid)
            .enumerate()
            .map(|(i, src)| ConnectionInfo {
                source: CellMember::new(src, 0),
                target_index: i as CellLocalIndex,
                weight: self.param.weight,
                delay: self.param.min_delay,
            })
            .collect())
    }
}

/// Random graph with fixed in-degree; sources are drawn from a deterministic
/// per-gid stream, so repeated queries agree and construction can run
/// concurrently.
#[derive(Debug, Clone)]
pub struct RandomGraphRecipe {
    num_cells: CellGid,
    param: BasicRecipeParam,
    pdist: ProbeDistribution,
}

impl RandomGraphRecipe {
    /// Create a random network of `num_cells` cells with
    /// `param.num_synapses` incoming connections each.
    pub fn new(num_cells: CellGid, param: BasicRecipeParam, pdist: ProbeDistribution) -> Self {
        Self {
            num_cells,
            param,
            pdist,
        }
    }
}

impl Recipe for RandomGraphRecipe {
    fn num_cells(&self) -> CellGid {
        self.num_cells
    }

    fn cell_description(&self, gid: CellGid) -> Result<Cell> {
        Ok(make_basic_cell(
            &self.param,
            &self.pdist,
            gid,
            self.param.num_synapses,
        ))
    }

    fn connections_on(&self, gid: CellGid) -> Result<Vec<ConnectionInfo>> {
        // simple LCG keyed by gid for reproducibility
        let mut state = gid.wrapping_mul(2654435761).wrapping_add(12345);
        let mut next = move || {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            state >> 16
        };
        let mut infos = Vec::with_capacity(self.param.num_synapses);
        for i in 0..self.param.num_synapses {
            let source = loop {
                let candidate = next() % self.num_cells;
                if candidate != gid || self.num_cells == 1 {
                    break candidate;
                }
            };
            infos.push(ConnectionInfo {
                source: CellMember::new(source, 0),
                target_index: i as CellLocalIndex,
                weight: self.param.weight,
                delay: self.param.min_delay,
            });
        }
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_wraps_around() {
        let recipe = RingRecipe::new(
            4,
            BasicRecipeParam::default(),
            ProbeDistribution::default(),
        );
        assert_eq!(recipe.connections_on(0).unwrap()[0].source.gid, 3);
        assert_eq!(recipe.connections_on(2).unwrap()[0].source.gid, 1);

        let cell = recipe.cell_description(0).unwrap();
        assert_eq!(cell.synapses.len(), 1);
        assert_eq!(cell.detectors.len(), 1);
    }

    #[test]
    fn complete_graph_has_full_fan_in() {
        let recipe = CompleteGraphRecipe::new(
            5,
            BasicRecipeParam::default(),
            ProbeDistribution::default(),
        );
        let cons = recipe.connections_on(2).unwrap();
        assert_eq!(cons.len(), 4);
        assert!(cons.iter().all(|c| c.source.gid != 2));
        // target indices are dense
        let targets: Vec<u32> = cons.iter().map(|c| c.target_index).collect();
        assert_eq!(targets, vec![0, 1, 2, 3]);
    }

    #[test]
    fn random_graph_is_deterministic() {
        let param = BasicRecipeParam {
            num_synapses: 10,
            ..Default::default()
        };
        let recipe = RandomGraphRecipe::new(20, param, ProbeDistribution::default());
        let a = recipe.connections_on(7).unwrap();
        let b = recipe.connections_on(7).unwrap();
        let sources_a: Vec<u64> = a.iter().map(|c| c.source.gid).collect();
        let sources_b: Vec<u64> = b.iter().map(|c| c.source.gid).collect();
        assert_eq!(sources_a, sources_b);
        assert!(sources_a.iter().all(|&s| s != 7 && s < 20));
    }

    #[test]
    fn probe_distribution_counts() {
        let pdist = ProbeDistribution {
            proportion: 0.25,
            all_segments: false,
        };
        let probed = (0..100).filter(|&g| pdist.is_probed(g)).count();
        assert_eq!(probed, 25);

        let none = ProbeDistribution {
            proportion: 0.0,
            all_segments: false,
        };
        assert_eq!((0..100).filter(|&g| none.is_probed(g)).count(), 0);
    }
}
