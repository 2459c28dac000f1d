//! Finite-volume lowering of cell descriptions onto backend storage
//!
//! `FvmCells` turns a batch of cell descriptions into the flat solver state a
//! group steps over: packed parent index and coefficients for the Hines
//! matrix, voltage and current arrays, mechanism instances grouped by name
//! and parameter set, shared ion state, detector and probe compartment maps,
//! and the synapse-target table events are delivered through.
//!
//! Unit system throughout: mV, ms, nA, µS, nF, µm.

use crate::backend::{Backend, Index, Value};
use crate::cell::{Cell, Location, SegmentGeometry, CM_DEFAULT, RL_DEFAULT, V_INIT};
use crate::error::{CoreError, Result};
use crate::matrix::HinesMatrix;
use crate::mechanism::{
    IonKind, IonState, Mechanism, MechanismRegistry, MechanismSiting, ParamMap,
};
use crate::types::{CellGid, CellLocalIndex, CellMember, TimeMs};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// A spike detector lowered to a compartment.
#[derive(Debug, Clone, Copy)]
pub struct DetectorHandle {
    /// Source id the detector emits under
    pub member: CellMember,
    /// Upward crossing threshold (mV)
    pub threshold: Value,
}

/// A voltage probe lowered to a compartment.
#[derive(Debug, Clone, Copy)]
pub struct ProbeHandle {
    /// Probe id `(gid, probe index)`
    pub member: CellMember,
    /// Compartment sampled by the probe
    pub compartment: Index,
}

// canonical form of a parameter map, usable as a BTreeMap key
type ParamKey = Vec<(String, u64)>;

fn param_key(params: &ParamMap) -> ParamKey {
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_bits()))
        .collect()
}

#[derive(Default)]
struct DensityGroup {
    node_index: Vec<Index>,
    node_area: Vec<Value>,
}

#[derive(Default)]
struct PointGroup {
    node_index: Vec<Index>,
}

/// The lowered state of one batch of cells.
#[derive(Debug)]
pub struct FvmCells<B: Backend> {
    backend: B,
    first_gid: CellGid,
    matrix: HinesMatrix<B>,
    voltage: B::Array,
    current: B::Array,
    mechanisms: Vec<Mechanism>,
    ions: Vec<(IonKind, IonState)>,
    /// per cell slot, per cell-local synapse index: (mechanism, instance)
    targets: Vec<Vec<(usize, usize)>>,
    detectors: Vec<DetectorHandle>,
    detector_index: Vec<Index>,
    probes: Vec<ProbeHandle>,
    /// first compartment of each cell, plus the total as sentinel
    cell_divisions: Vec<usize>,
}

impl<B: Backend> FvmCells<B> {
    /// Lower a batch of cells whose gids start at `first_gid`.
    pub fn new(first_gid: CellGid, cells: &[Cell], registry: &MechanismRegistry) -> Result<Self> {
        let backend = B::default();

        let mut parent_index: Vec<Index> = Vec::new();
        let mut cv_capacitance: Vec<Value> = Vec::new();
        let mut face_conductance: Vec<Value> = Vec::new();
        let mut cv_area: Vec<Value> = Vec::new();
        let mut cell_divisions: Vec<usize> = Vec::new();

        let mut density: BTreeMap<(String, ParamKey), DensityGroup> = BTreeMap::new();
        let mut point: BTreeMap<(String, ParamKey), PointGroup> = BTreeMap::new();
        // per cell slot, per synapse: key into `point` plus instance index
        let mut raw_targets: Vec<Vec<((String, ParamKey), usize)>> = Vec::new();

        let mut detectors: Vec<DetectorHandle> = Vec::new();
        let mut detector_index: Vec<Index> = Vec::new();
        let mut probes: Vec<ProbeHandle> = Vec::new();

        for (slot, cell) in cells.iter().enumerate() {
            let gid = first_gid + slot as CellGid;
            cell.validate().map_err(|e| {
                CoreError::model_description(format!("cell {}", gid), e.to_string())
            })?;

            cell_divisions.push(parent_index.len());

            // discretise segments into compartments
            let mut seg_first: Vec<usize> = Vec::with_capacity(cell.segments.len());
            for seg in &cell.segments {
                match seg.geometry {
                    SegmentGeometry::Sphere { radius } => {
                        let comp = parent_index.len();
                        seg_first.push(comp);
                        parent_index.push(comp as Index);
                        let area = 4.0 * PI * radius * radius;
                        cv_area.push(area);
                        // F/m² × µm² → nF
                        cv_capacitance.push(1e-3 * CM_DEFAULT * area);
                        face_conductance.push(0.0);
                    }
                    SegmentGeometry::Cable { radius, length } => {
                        let n = seg.num_compartments as usize;
                        let h = length / n as f64;
                        // conductance between compartment centres one h apart
                        let g_face = 100.0 * PI * radius * radius / (RL_DEFAULT * h);
                        let attach = {
                            let p = seg.parent;
                            seg_first[p] + cell.segments[p].num_compartments as usize - 1
                        };
                        seg_first.push(parent_index.len());
                        for j in 0..n {
                            let comp = parent_index.len();
                            let parent = if j == 0 { attach } else { comp - 1 };
                            parent_index.push(parent as Index);
                            let area = 2.0 * PI * radius * h;
                            cv_area.push(area);
                            cv_capacitance.push(1e-3 * CM_DEFAULT * area);
                            // the proximal face spans only half a compartment
                            face_conductance.push(if j == 0 { 2.0 * g_face } else { g_face });
                        }
                    }
                }
            }

            let locate = |loc: Location| -> Index {
                let n = cell.segments[loc.segment].num_compartments as usize;
                let j = ((loc.position * n as f64).floor() as usize).min(n - 1);
                (seg_first[loc.segment] + j) as Index
            };

            // density mechanisms painted per segment
            for (si, seg) in cell.segments.iter().enumerate() {
                for desc in &seg.mechanisms {
                    let group = density
                        .entry((desc.name.clone(), param_key(&desc.params)))
                        .or_default();
                    for j in 0..seg.num_compartments as usize {
                        let comp = seg_first[si] + j;
                        group.node_index.push(comp as Index);
                        group.node_area.push(cv_area[comp]);
                    }
                }
            }

            // synapse point processes, in cell-local target order
            let mut cell_targets = Vec::with_capacity(cell.synapses.len());
            for syn in &cell.synapses {
                let key = (syn.mechanism.name.clone(), param_key(&syn.mechanism.params));
                let group = point.entry(key.clone()).or_default();
                let instance = group.node_index.len();
                group.node_index.push(locate(syn.location));
                cell_targets.push((key, instance));
            }
            raw_targets.push(cell_targets);

            // stimuli become iclamp point instances
            for stim in &cell.stimuli {
                let mut params = ParamMap::new();
                params.insert("delay".into(), stim.delay);
                params.insert("duration".into(), stim.duration);
                params.insert("amplitude".into(), stim.amplitude);
                let group = point
                    .entry(("iclamp".into(), param_key(&params)))
                    .or_default();
                group.node_index.push(locate(stim.location));
            }

            for (di, det) in cell.detectors.iter().enumerate() {
                detectors.push(DetectorHandle {
                    member: CellMember::new(gid, di as CellLocalIndex),
                    threshold: det.threshold,
                });
                detector_index.push(locate(det.location));
            }

            for (pi, probe) in cell.probes.iter().enumerate() {
                probes.push(ProbeHandle {
                    member: CellMember::new(gid, pi as CellLocalIndex),
                    compartment: locate(probe.location),
                });
            }
        }
        let num_compartments = parent_index.len();
        cell_divisions.push(num_compartments);

        // instantiate mechanisms in deterministic order: density groups
        // first, then point groups
        let mut mechanisms = Vec::with_capacity(density.len() + point.len());
        let mut point_offset: BTreeMap<(String, ParamKey), usize> = BTreeMap::new();
        for ((name, key), group) in density {
            let params = params_from_key(&key);
            mechanisms.push(registry.build(
                &name,
                MechanismSiting::Density {
                    node_index: group.node_index,
                    node_area: group.node_area,
                },
                &params,
            )?);
        }
        for ((name, key), group) in point {
            let params = params_from_key(&key);
            point_offset.insert((name.clone(), key.clone()), mechanisms.len());
            mechanisms.push(registry.build(
                &name,
                MechanismSiting::Point {
                    node_index: group.node_index,
                },
                &params,
            )?);
        }

        let targets = raw_targets
            .into_iter()
            .map(|cell_targets| {
                cell_targets
                    .into_iter()
                    .map(|(key, instance)| (point_offset[&key], instance))
                    .collect()
            })
            .collect();

        // materialise ion state for every species some mechanism reads
        let mut ions = Vec::new();
        for kind in IonKind::ALL {
            if mechanisms.iter().any(|m| m.uses_ion(kind)) {
                let state = IonState::new(kind, num_compartments);
                for m in mechanisms.iter_mut().filter(|m| m.uses_ion(kind)) {
                    m.set_ion(kind, &state);
                }
                ions.push((kind, state));
            }
        }

        let matrix = HinesMatrix::with_coefficients(parent_index, cv_capacitance, face_conductance)?;
        let voltage = backend.alloc(num_compartments);
        let current = backend.alloc(num_compartments);

        let mut lowered = Self {
            backend,
            first_gid,
            matrix,
            voltage,
            current,
            mechanisms,
            ions,
            targets,
            detectors,
            detector_index,
            probes,
            cell_divisions,
        };
        lowered.init();
        Ok(lowered)
    }

    /// Reset voltages and mechanism state to the initial condition.
    pub fn init(&mut self) {
        self.backend.fill(self.voltage.as_mut(), V_INIT);
        self.backend.fill(self.current.as_mut(), 0.0);
        for m in self.mechanisms.iter_mut() {
            m.init(self.voltage.as_ref());
        }
    }

    /// One integration step of length `dt` starting at time `t`: mechanism
    /// currents, matrix assembly and solve, voltage update, gating state.
    pub fn step(&mut self, t: TimeMs, dt: TimeMs) -> Result<()> {
        self.backend.fill(self.current.as_mut(), 0.0);
        for m in self.mechanisms.iter_mut() {
            m.current(t, self.voltage.as_ref(), self.current.as_mut());
        }

        self.matrix
            .assemble(dt, self.voltage.as_ref(), self.current.as_ref());
        self.matrix.solve();
        self.backend.copy(self.matrix.rhs(), self.voltage.as_mut());

        if let Some(i) = self
            .voltage
            .as_ref()
            .iter()
            .position(|v| !v.is_finite())
        {
            return Err(CoreError::numerical(
                self.gid_of_compartment(i),
                t,
                "non-finite voltage after matrix solve",
            ));
        }

        for m in self.mechanisms.iter_mut() {
            m.state(dt, self.voltage.as_ref());
        }
        Ok(())
    }

    /// Deliver a synaptic event to a cell-local target.
    pub fn deliver(&mut self, slot: usize, target: CellLocalIndex, weight: Value) -> Result<()> {
        let (mech, instance) = *self
            .targets
            .get(slot)
            .and_then(|t| t.get(target as usize))
            .ok_or_else(|| {
                CoreError::model_description(
                    format!("cell {}", self.first_gid + slot as CellGid),
                    format!("no synapse target with index {}", target),
                )
            })?;
        self.mechanisms[mech].net_receive(instance, weight);
        Ok(())
    }

    /// Gather the detector voltages into `out` (one entry per detector).
    pub fn detector_voltages(&self, out: &mut [Value]) {
        self.backend
            .gather(self.voltage.as_ref(), &self.detector_index, out);
    }

    /// Detectors in lexicographic source order.
    pub fn detectors(&self) -> &[DetectorHandle] {
        &self.detectors
    }

    /// Probes in lexicographic id order.
    pub fn probes(&self) -> &[ProbeHandle] {
        &self.probes
    }

    /// Voltage of one compartment.
    pub fn voltage_at(&self, compartment: Index) -> Value {
        self.voltage.as_ref()[compartment as usize]
    }

    /// Shared ion state for a species, present when some mechanism reads it.
    pub fn ion_state(&self, kind: IonKind) -> Option<&IonState> {
        self.ions
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, state)| state)
    }

    /// Total compartment count.
    pub fn num_compartments(&self) -> usize {
        self.cell_divisions[self.cell_divisions.len() - 1]
    }

    /// Number of cells in the batch.
    pub fn num_cells(&self) -> usize {
        self.cell_divisions.len() - 1
    }

    fn gid_of_compartment(&self, comp: usize) -> CellGid {
        let slot = self.cell_divisions.partition_point(|&b| b <= comp) - 1;
        self.first_gid + slot as CellGid
    }
}

fn params_from_key(key: &ParamKey) -> ParamMap {
    key.iter()
        .map(|(k, bits)| (k.clone(), f64::from_bits(*bits)))
        .collect()
}
