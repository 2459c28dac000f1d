//! Passive leak conductance

use super::{check_param_names, param, ParamMap};
use crate::backend::{Index, Value};
use crate::error::Result;

/// Ohmic leak, `i = g (v - e)`, stateless.
#[derive(Debug, Clone)]
pub struct Pas {
    pub(super) node_index: Vec<Index>,
    /// Scaled conductance (µS per compartment)
    g: Vec<Value>,
    /// Reversal potential (mV)
    e: Value,
}

impl Pas {
    /// Parameter names this mechanism accepts.
    pub const PARAMS: [&'static str; 2] = ["g", "e"];

    /// Build an instance over the given compartments with their membrane
    /// areas (µm²).
    pub fn new(node_index: Vec<Index>, node_area: &[Value], params: &ParamMap) -> Result<Self> {
        check_param_names("pas", params, &Self::PARAMS)?;
        let g = param("pas", params, "g", 0.001, (0.0, 1e9))?;
        let e = param("pas", params, "e", -70.0, (-1e9, 1e9))?;
        Ok(Self {
            node_index,
            g: node_area.iter().map(|a| g * a * 1e-2).collect(),
            e,
        })
    }

    /// Add the leak current into the current vector.
    pub fn current(&mut self, voltage: &[Value], current: &mut [Value]) {
        for (k, &ci) in self.node_index.iter().enumerate() {
            let ci = ci as usize;
            current[ci] += self.g[k] * (voltage[ci] - self.e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_vanishes_at_reversal() {
        let mut params = ParamMap::new();
        params.insert("e".into(), -65.0);
        let mut pas = Pas::new(vec![0], &[100.0], &params).unwrap();
        let mut i = [0.0];
        pas.current(&[-65.0], &mut i);
        assert_eq!(i[0], 0.0);

        pas.current(&[-55.0], &mut i);
        // g = 0.001 S/cm² × 100 µm² = 1e-3 µS; 10 mV above e → 0.01 nA outward
        assert!((i[0] - 0.01).abs() < 1e-12);
    }
}
