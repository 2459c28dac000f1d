//! Hodgkin-Huxley sodium, potassium and leak channels
//!
//! The classic squid-axon kinetics at 6.3 °C. Conductance densities are given
//! in S/cm² and scaled by compartment area to µS at construction; the leak
//! reversal is a mechanism parameter while the sodium and potassium reversal
//! potentials are wired from the group's shared ion state.

use super::{check_param_names, param, IonKind, IonState, ParamMap};
use crate::backend::{Index, Value};
use crate::error::Result;
use crate::types::TimeMs;

/// HH channel instance over a set of compartments.
#[derive(Debug, Clone)]
pub struct Hh {
    pub(super) node_index: Vec<Index>,
    /// Scaled maximal conductances (µS per compartment)
    gna: Vec<Value>,
    gk: Vec<Value>,
    gl: Vec<Value>,
    /// Leak reversal (mV)
    el: Value,
    /// Ion reversal potentials per compartment (mV), set through `set_ion`
    ena: Vec<Value>,
    ek: Vec<Value>,
    /// Gating state
    m: Vec<Value>,
    h: Vec<Value>,
    n: Vec<Value>,
}

impl Hh {
    /// Parameter names this mechanism accepts.
    pub const PARAMS: [&'static str; 4] = ["gnabar", "gkbar", "gl", "el"];

    /// Build an instance over the given compartments with their membrane
    /// areas (µm²).
    pub fn new(node_index: Vec<Index>, node_area: &[Value], params: &ParamMap) -> Result<Self> {
        check_param_names("hh", params, &Self::PARAMS)?;
        let gnabar = param("hh", params, "gnabar", 0.12, (0.0, 1e9))?;
        let gkbar = param("hh", params, "gkbar", 0.036, (0.0, 1e9))?;
        let glbar = param("hh", params, "gl", 0.0003, (0.0, 1e9))?;
        let el = param("hh", params, "el", -54.3, (-1e9, 1e9))?;

        let n = node_index.len();
        // S/cm² × µm² → µS
        let scale = |g: Value| node_area.iter().map(|a| g * a * 1e-2).collect::<Vec<_>>();
        Ok(Self {
            node_index,
            gna: scale(gnabar),
            gk: scale(gkbar),
            gl: scale(glbar),
            el,
            ena: vec![IonKind::Na.default_reversal_potential(); n],
            ek: vec![IonKind::K.default_reversal_potential(); n],
            m: vec![0.0; n],
            h: vec![0.0; n],
            n: vec![0.0; n],
        })
    }

    /// Set gates to their steady state at the current voltage.
    pub fn init(&mut self, voltage: &[Value]) {
        for (k, &ci) in self.node_index.iter().enumerate() {
            let v = voltage[ci as usize];
            let (am, bm) = m_rates(v);
            let (ah, bh) = h_rates(v);
            let (an, bn) = n_rates(v);
            self.m[k] = am / (am + bm);
            self.h[k] = ah / (ah + bh);
            self.n[k] = an / (an + bn);
        }
    }

    /// Add i_na + i_k + i_leak into the current vector.
    pub fn current(&mut self, voltage: &[Value], current: &mut [Value]) {
        for (k, &ci) in self.node_index.iter().enumerate() {
            let ci = ci as usize;
            let v = voltage[ci];
            let m3 = self.m[k] * self.m[k] * self.m[k];
            let n4 = {
                let n2 = self.n[k] * self.n[k];
                n2 * n2
            };
            let i_na = self.gna[k] * m3 * self.h[k] * (v - self.ena[k]);
            let i_k = self.gk[k] * n4 * (v - self.ek[k]);
            let i_l = self.gl[k] * (v - self.el);
            current[ci] += i_na + i_k + i_l;
        }
    }

    /// Advance gates by one step with the exponential update appropriate to
    /// first-order voltage-dependent kinetics.
    pub fn state(&mut self, dt: TimeMs, voltage: &[Value]) {
        for (k, &ci) in self.node_index.iter().enumerate() {
            let v = voltage[ci as usize];
            let (am, bm) = m_rates(v);
            let (ah, bh) = h_rates(v);
            let (an, bn) = n_rates(v);
            self.m[k] = gate_update(self.m[k], am, bm, dt);
            self.h[k] = gate_update(self.h[k], ah, bh, dt);
            self.n[k] = gate_update(self.n[k], an, bn, dt);
        }
    }

    /// Copy reversal potentials from the shared ion state through this
    /// instance's node index map.
    pub fn set_ion(&mut self, kind: IonKind, ion: &IonState) {
        let dst = match kind {
            IonKind::Na => &mut self.ena,
            IonKind::K => &mut self.ek,
            IonKind::Ca => return,
        };
        for (k, &ci) in self.node_index.iter().enumerate() {
            dst[k] = ion.reversal_potential[ci as usize];
        }
    }
}

fn gate_update(x: Value, alpha: Value, beta: Value, dt: TimeMs) -> Value {
    let rate = alpha + beta;
    let xinf = alpha / rate;
    x + (1.0 - (-dt * rate).exp()) * (xinf - x)
}

// x / (exp(x/y) - 1) with the removable singularity at x = 0 handled
fn vtrap(x: Value, y: Value) -> Value {
    if (x / y).abs() < 1e-6 {
        y * (1.0 - x / y / 2.0)
    } else {
        x / ((x / y).exp() - 1.0)
    }
}

fn m_rates(v: Value) -> (Value, Value) {
    let alpha = 0.1 * vtrap(-(v + 40.0), 10.0);
    let beta = 4.0 * (-(v + 65.0) / 18.0).exp();
    (alpha, beta)
}

fn h_rates(v: Value) -> (Value, Value) {
    let alpha = 0.07 * (-(v + 65.0) / 20.0).exp();
    let beta = 1.0 / ((-(v + 35.0) / 10.0).exp() + 1.0);
    (alpha, beta)
}

fn n_rates(v: Value) -> (Value, Value) {
    let alpha = 0.01 * vtrap(-(v + 55.0), 10.0);
    let beta = 0.125 * (-(v + 65.0) / 80.0).exp();
    (alpha, beta)
}
