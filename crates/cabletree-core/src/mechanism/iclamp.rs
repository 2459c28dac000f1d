//! Square-pulse current clamp

use super::{check_param_names, param, ParamMap};
use crate::backend::{Index, Value};
use crate::error::Result;
use crate::types::TimeMs;

/// Injects a constant current at its compartments while `t` lies within
/// `[delay, delay + duration)`.
#[derive(Debug, Clone)]
pub struct IClamp {
    pub(super) node_index: Vec<Index>,
    /// Onset (ms)
    delay: TimeMs,
    /// Pulse width (ms)
    duration: TimeMs,
    /// Injected current (nA)
    amplitude: Value,
}

impl IClamp {
    /// Parameter names this mechanism accepts.
    pub const PARAMS: [&'static str; 3] = ["delay", "duration", "amplitude"];

    /// Build a clamp at the given compartments.
    pub fn new(node_index: Vec<Index>, params: &ParamMap) -> Result<Self> {
        check_param_names("iclamp", params, &Self::PARAMS)?;
        Ok(Self {
            node_index,
            delay: param("iclamp", params, "delay", 0.0, (0.0, 1e9))?,
            duration: param("iclamp", params, "duration", 0.0, (0.0, 1e9))?,
            amplitude: param("iclamp", params, "amplitude", 0.0, (-1e9, 1e9))?,
        })
    }

    /// Subtract the injected current (injection is inward, membrane current
    /// is positive outward).
    pub fn current(&mut self, t: TimeMs, current: &mut [Value]) {
        if t >= self.delay && t < self.delay + self.duration {
            for &ci in &self.node_index {
                current[ci as usize] -= self.amplitude;
            }
        }
    }
}
