//! Ion-channel and synapse kinetics
//!
//! A mechanism is a named, stateful contributor to compartment currents and,
//! optionally, to gating state. The engine dispatches over a closed set of
//! variants through a single enum, so the per-step hot loops are direct calls
//! with no trait-object indirection. A registry maps mechanism names from
//! cell descriptions onto constructors.
//!
//! Mechanisms acquire all storage at construction; `current` and `state`
//! never allocate.

mod exp2syn;
mod expsyn;
mod hh;
mod iclamp;
mod pas;
mod registry;

pub use exp2syn::Exp2Syn;
pub use expsyn::ExpSyn;
pub use hh::Hh;
pub use iclamp::IClamp;
pub use pas::Pas;
pub use registry::{MechanismRegistry, MechanismSiting};

use crate::backend::{Index, Value};
use crate::error::{CoreError, Result};
use crate::types::TimeMs;
use std::collections::BTreeMap;

/// Free-form mechanism parameter assignment, keyed by parameter name.
pub type ParamMap = BTreeMap<String, Value>;

/// Placement class of a mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismKind {
    /// Distributed over compartment membrane, conductances scale with area
    Density,
    /// Attached at single compartments, addressed by `net_receive`
    Point,
}

/// Ion species a mechanism may read reversal potentials for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IonKind {
    /// Sodium
    Na,
    /// Potassium
    K,
    /// Calcium
    Ca,
}

impl IonKind {
    /// All species, in a fixed order.
    pub const ALL: [IonKind; 3] = [IonKind::Na, IonKind::K, IonKind::Ca];

    /// Short species name as used in mechanism descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            IonKind::Na => "na",
            IonKind::K => "k",
            IonKind::Ca => "ca",
        }
    }

    /// Default reversal potential (mV).
    pub fn default_reversal_potential(&self) -> Value {
        match self {
            IonKind::Na => 50.0,
            IonKind::K => -77.0,
            IonKind::Ca => 132.5,
        }
    }
}

/// Per-species state shared by all mechanisms of a cell group: one reversal
/// potential per compartment.
#[derive(Debug, Clone)]
pub struct IonState {
    /// Reversal potential per compartment (mV)
    pub reversal_potential: Vec<Value>,
}

impl IonState {
    /// Create ion state for `n` compartments at the species default.
    pub fn new(kind: IonKind, n: usize) -> Self {
        Self {
            reversal_potential: vec![kind.default_reversal_potential(); n],
        }
    }
}

/// A mechanism instance bound to a set of compartments of one cell group.
#[derive(Debug, Clone)]
pub enum Mechanism {
    /// Hodgkin-Huxley sodium/potassium/leak channels
    Hh(Hh),
    /// Passive leak
    Pas(Pas),
    /// Single-exponential synapse
    ExpSyn(ExpSyn),
    /// Double-exponential synapse
    Exp2Syn(Exp2Syn),
    /// Square-pulse current clamp
    IClamp(IClamp),
}

impl Mechanism {
    /// Mechanism name as registered.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hh(_) => "hh",
            Self::Pas(_) => "pas",
            Self::ExpSyn(_) => "expsyn",
            Self::Exp2Syn(_) => "exp2syn",
            Self::IClamp(_) => "iclamp",
        }
    }

    /// Placement class.
    pub fn kind(&self) -> MechanismKind {
        match self {
            Self::Hh(_) | Self::Pas(_) => MechanismKind::Density,
            Self::ExpSyn(_) | Self::Exp2Syn(_) | Self::IClamp(_) => MechanismKind::Point,
        }
    }

    /// Number of bound instances (compartments for density kinds, points
    /// otherwise).
    pub fn size(&self) -> usize {
        self.node_index().len()
    }

    /// Compartment index of every bound instance.
    pub fn node_index(&self) -> &[Index] {
        match self {
            Self::Hh(m) => &m.node_index,
            Self::Pas(m) => &m.node_index,
            Self::ExpSyn(m) => &m.node_index,
            Self::Exp2Syn(m) => &m.node_index,
            Self::IClamp(m) => &m.node_index,
        }
    }

    /// Initialise state to steady state for the given voltages.
    pub fn init(&mut self, voltage: &[Value]) {
        match self {
            Self::Hh(m) => m.init(voltage),
            Self::ExpSyn(m) => m.init(),
            Self::Exp2Syn(m) => m.init(),
            Self::Pas(_) | Self::IClamp(_) => {}
        }
    }

    /// Add this mechanism's contribution to the compartment current vector
    /// (nA, positive outward).
    pub fn current(&mut self, t: TimeMs, voltage: &[Value], current: &mut [Value]) {
        match self {
            Self::Hh(m) => m.current(voltage, current),
            Self::Pas(m) => m.current(voltage, current),
            Self::ExpSyn(m) => m.current(voltage, current),
            Self::Exp2Syn(m) => m.current(voltage, current),
            Self::IClamp(m) => m.current(t, current),
        }
    }

    /// Advance gating state by `dt`, using the solver appropriate to the
    /// kinetics.
    pub fn state(&mut self, dt: TimeMs, voltage: &[Value]) {
        match self {
            Self::Hh(m) => m.state(dt, voltage),
            Self::ExpSyn(m) => m.state(dt),
            Self::Exp2Syn(m) => m.state(dt),
            Self::Pas(_) | Self::IClamp(_) => {}
        }
    }

    /// Deliver a synaptic event of the given weight to the instance at
    /// `index`. Only point mechanisms respond.
    pub fn net_receive(&mut self, index: usize, weight: Value) {
        match self {
            Self::ExpSyn(m) => m.net_receive(index, weight),
            Self::Exp2Syn(m) => m.net_receive(index, weight),
            Self::Hh(_) | Self::Pas(_) | Self::IClamp(_) => {}
        }
    }

    /// Does this mechanism read the given ion species?
    pub fn uses_ion(&self, kind: IonKind) -> bool {
        match self {
            Self::Hh(_) => matches!(kind, IonKind::Na | IonKind::K),
            _ => false,
        }
    }

    /// Wire the mechanism to shared ion state, resolving per-instance
    /// reversal potentials through the mechanism's own node index map.
    pub fn set_ion(&mut self, kind: IonKind, ion: &IonState) {
        if let Self::Hh(m) = self {
            m.set_ion(kind, ion);
        }
    }
}

/// Reject parameter assignments for names a mechanism does not declare.
pub(crate) fn check_param_names(
    mechanism: &str,
    params: &ParamMap,
    allowed: &[&str],
) -> Result<()> {
    for key in params.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(CoreError::model_description(
                mechanism,
                format!("unknown parameter {}", key),
            ));
        }
    }
    Ok(())
}

/// Look up a parameter with a default, enforcing its permitted range.
pub(crate) fn param(
    mechanism: &str,
    params: &ParamMap,
    key: &str,
    default: Value,
    range: (Value, Value),
) -> Result<Value> {
    let value = params.get(key).copied().unwrap_or(default);
    if value < range.0 || value > range.1 {
        return Err(CoreError::invalid_parameter(
            format!("{}.{}", mechanism, key),
            value,
            format!("in [{}, {}]", range.0, range.1),
        ));
    }
    Ok(value)
}
