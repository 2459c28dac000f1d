//! Morphological cell description
//!
//! A cell is a tree of segments: one spherical soma at index 0 and cables
//! that each name an earlier segment as parent, so the tree is expressed as
//! an indexed parent array rather than owned pointers. Segments carry their
//! compartment count and density mechanisms; synapses, stimuli, detectors and
//! probes sit at `(segment, relative position)` locations. The description is
//! declarative; lowering to solver state happens in the FVM layer.

use crate::mechanism::ParamMap;
use crate::error::{CoreError, Result};
use crate::types::CellLocalIndex;

/// Resting potential used to initialise every compartment (mV).
pub const V_INIT: f64 = -65.0;

/// Default membrane capacitance (F/m²).
pub const CM_DEFAULT: f64 = 0.01;

/// Default axial resistivity (Ω·cm).
pub const RL_DEFAULT: f64 = 100.0;

/// A point on a cell: segment index and relative position along it in
/// `[0, 1]` (0 = proximal end).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Segment index
    pub segment: usize,
    /// Relative position along the segment
    pub position: f64,
}

impl Location {
    /// Create a location.
    pub const fn new(segment: usize, position: f64) -> Self {
        Self { segment, position }
    }
}

/// Geometry of one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentGeometry {
    /// Spherical soma
    Sphere {
        /// Radius (µm)
        radius: f64,
    },
    /// Unbranched cylindrical cable
    Cable {
        /// Radius (µm)
        radius: f64,
        /// Length (µm)
        length: f64,
    },
}

/// A named density mechanism with parameter overrides.
#[derive(Debug, Clone)]
pub struct MechanismDesc {
    /// Registered mechanism name
    pub name: String,
    /// Parameter overrides
    pub params: ParamMap,
}

impl MechanismDesc {
    /// Mechanism with default parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: ParamMap::new(),
        }
    }

    /// Set one parameter.
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// One segment of the tree.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Geometry of this segment
    pub geometry: SegmentGeometry,
    /// Parent segment index; equals the own index only at the soma
    pub parent: usize,
    /// Number of compartments this segment is discretised into
    pub num_compartments: u32,
    /// Density mechanisms painted on this segment
    pub mechanisms: Vec<MechanismDesc>,
}

/// A synapse target on the cell.
#[derive(Debug, Clone)]
pub struct SynapseSpec {
    /// Placement
    pub location: Location,
    /// Point mechanism realising the synapse
    pub mechanism: MechanismDesc,
}

/// A current-clamp stimulus.
#[derive(Debug, Clone, Copy)]
pub struct StimulusSpec {
    /// Placement
    pub location: Location,
    /// Onset (ms)
    pub delay: f64,
    /// Pulse width (ms)
    pub duration: f64,
    /// Injected current (nA)
    pub amplitude: f64,
}

/// A spike detector.
#[derive(Debug, Clone, Copy)]
pub struct DetectorSpec {
    /// Placement
    pub location: Location,
    /// Upward crossing threshold (mV)
    pub threshold: f64,
}

/// A voltage probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSpec {
    /// Placement
    pub location: Location,
}

/// Complete description of one cell.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Segments; index 0 is the soma
    pub segments: Vec<Segment>,
    /// Synapse targets in local-index order
    pub synapses: Vec<SynapseSpec>,
    /// Current clamps
    pub stimuli: Vec<StimulusSpec>,
    /// Spike detectors in local-index order
    pub detectors: Vec<DetectorSpec>,
    /// Voltage probes in local-index order
    pub probes: Vec<ProbeSpec>,
}

impl Cell {
    /// Create a cell with a spherical soma of the given radius (µm).
    pub fn new(soma_radius: f64) -> Self {
        Self {
            segments: vec![Segment {
                geometry: SegmentGeometry::Sphere {
                    radius: soma_radius,
                },
                parent: 0,
                num_compartments: 1,
                mechanisms: Vec::new(),
            }],
            synapses: Vec::new(),
            stimuli: Vec::new(),
            detectors: Vec::new(),
            probes: Vec::new(),
        }
    }

    /// Attach a cable to `parent`; returns the new segment index.
    pub fn add_cable(
        &mut self,
        parent: usize,
        radius: f64,
        length: f64,
        num_compartments: u32,
    ) -> usize {
        let index = self.segments.len();
        self.segments.push(Segment {
            geometry: SegmentGeometry::Cable { radius, length },
            parent,
            num_compartments,
            mechanisms: Vec::new(),
        });
        index
    }

    /// Paint a density mechanism on a segment.
    pub fn add_mechanism(&mut self, segment: usize, mechanism: MechanismDesc) {
        self.segments[segment].mechanisms.push(mechanism);
    }

    /// Add a synapse; returns its cell-local target index.
    pub fn add_synapse(&mut self, location: Location, mechanism: MechanismDesc) -> CellLocalIndex {
        let index = self.synapses.len() as CellLocalIndex;
        self.synapses.push(SynapseSpec {
            location,
            mechanism,
        });
        index
    }

    /// Add a current clamp.
    pub fn add_stimulus(&mut self, location: Location, delay: f64, duration: f64, amplitude: f64) {
        self.stimuli.push(StimulusSpec {
            location,
            delay,
            duration,
            amplitude,
        });
    }

    /// Add a spike detector; returns its cell-local source index.
    pub fn add_detector(&mut self, location: Location, threshold: f64) -> CellLocalIndex {
        let index = self.detectors.len() as CellLocalIndex;
        self.detectors.push(DetectorSpec {
            location,
            threshold,
        });
        index
    }

    /// Add a voltage probe; returns its cell-local probe index.
    pub fn add_probe(&mut self, location: Location) -> CellLocalIndex {
        let index = self.probes.len() as CellLocalIndex;
        self.probes.push(ProbeSpec { location });
        index
    }

    /// Total compartment count over all segments.
    pub fn num_compartments(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.num_compartments as usize)
            .sum()
    }

    /// Check structural invariants: a spherical soma at index 0, cable
    /// parents strictly earlier in the list, at least one compartment per
    /// segment, positive geometry, locations inside their segment.
    pub fn validate(&self) -> Result<()> {
        let soma = self.segments.first().ok_or_else(|| {
            CoreError::model_description("cell", "no segments")
        })?;
        if !matches!(soma.geometry, SegmentGeometry::Sphere { .. }) || soma.parent != 0 {
            return Err(CoreError::model_description(
                "cell",
                "segment 0 must be a spherical soma rooting the tree",
            ));
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.num_compartments < 1 {
                return Err(CoreError::model_description(
                    format!("segment {}", i),
                    "at least one compartment required",
                ));
            }
            match seg.geometry {
                SegmentGeometry::Sphere { radius } => {
                    if radius <= 0.0 {
                        return Err(CoreError::invalid_parameter(
                            format!("segment {}.radius", i),
                            radius,
                            "> 0",
                        ));
                    }
                }
                SegmentGeometry::Cable { radius, length } => {
                    if radius <= 0.0 || length <= 0.0 {
                        return Err(CoreError::model_description(
                            format!("segment {}", i),
                            "cable radius and length must be positive",
                        ));
                    }
                    if seg.parent >= i {
                        return Err(CoreError::model_description(
                            format!("segment {}", i),
                            format!("parent {} does not precede it", seg.parent),
                        ));
                    }
                }
            }
        }
        let locations = self
            .synapses
            .iter()
            .map(|s| s.location)
            .chain(self.stimuli.iter().map(|s| s.location))
            .chain(self.detectors.iter().map(|d| d.location))
            .chain(self.probes.iter().map(|p| p.location));
        for loc in locations {
            if loc.segment >= self.segments.len() {
                return Err(CoreError::model_description(
                    "cell",
                    format!("location references segment {} of {}", loc.segment, self.segments.len()),
                ));
            }
            if !(0.0..=1.0).contains(&loc.position) {
                return Err(CoreError::invalid_parameter(
                    "location.position",
                    loc.position,
                    "in [0, 1]",
                ));
            }
        }
        Ok(())
    }
}

/// The standard ball-and-stick test cell: an HH soma of ~500 µm² membrane
/// with a 200 µm passive dendrite.
pub fn make_ball_and_stick(dendrite_compartments: u32) -> Cell {
    let mut cell = Cell::new(6.30785);
    cell.add_mechanism(0, MechanismDesc::new("hh"));
    let dend = cell.add_cable(0, 0.5, 200.0, dendrite_compartments);
    cell.add_mechanism(dend, MechanismDesc::new("pas"));
    cell.add_stimulus(Location::new(dend, 1.0), 5.0, 80.0, 0.3);
    cell
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ball_and_stick_is_valid() {
        let mut cell = make_ball_and_stick(100);
        cell.add_detector(Location::new(0, 0.0), 0.0);
        assert!(cell.validate().is_ok());
        assert_eq!(cell.num_compartments(), 101);
        assert_eq!(cell.detectors.len(), 1);
    }

    #[test]
    fn rejects_zero_compartments() {
        let mut cell = Cell::new(6.0);
        cell.add_cable(0, 0.5, 100.0, 0);
        assert!(cell.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_position() {
        let mut cell = Cell::new(6.0);
        cell.add_detector(Location::new(0, 1.5), 0.0);
        assert!(cell.validate().is_err());
    }

    #[test]
    fn synapse_indices_are_dense() {
        let mut cell = Cell::new(6.0);
        let a = cell.add_synapse(Location::new(0, 0.5), MechanismDesc::new("expsyn"));
        let b = cell.add_synapse(Location::new(0, 0.5), MechanismDesc::new("exp2syn"));
        assert_eq!((a, b), (0, 1));
    }
}
