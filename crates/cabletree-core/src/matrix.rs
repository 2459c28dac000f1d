//! Hines matrix assembly and solve
//!
//! The finite-volume discretisation of the cable equation yields, per cell, a
//! symmetric tree-structured tridiagonal system. All cells of a group are
//! packed into one linear layout described by a parent index `p` with
//! `p[i] <= i` and `p[i] == i` exactly at cell roots, so the backward and
//! forward sweeps are sequential within a cell but independent across cells.

use crate::backend::{Backend, Index, Value};
use crate::error::{CoreError, Result};

/// Packed tridiagonal systems for one cell group.
///
/// `d`, `u` and `rhs` all have one entry per compartment; after `solve` the
/// right-hand side holds the solution. The coefficient arrays
/// (`cv_capacitance` in nF, `face_conductance` in µS) are fixed at
/// construction; `assemble` rebuilds `d`, `u` and `rhs` from them each step.
#[derive(Debug, Clone)]
pub struct HinesMatrix<B: Backend> {
    backend: B,
    parent_index: Vec<Index>,
    cell_index: Vec<Index>,
    cv_capacitance: Vec<Value>,
    face_conductance: Vec<Value>,
    d: B::Array,
    u: B::Array,
    rhs: B::Array,
}

impl<B: Backend> HinesMatrix<B> {
    /// Build a matrix from a parent index alone, with zero coefficients.
    ///
    /// Cell boundaries are derived from the roots (`p[i] == i`). Used by
    /// tests and by callers that fill `d`/`u`/`rhs` directly.
    pub fn from_parent_index(parent_index: Vec<Index>) -> Result<Self> {
        let n = parent_index.len();
        Self::with_coefficients(parent_index, vec![0.0; n], vec![0.0; n])
    }

    /// Build a matrix from a parent index and per-compartment coefficients.
    pub fn with_coefficients(
        parent_index: Vec<Index>,
        cv_capacitance: Vec<Value>,
        face_conductance: Vec<Value>,
    ) -> Result<Self> {
        let n = parent_index.len();
        if cv_capacitance.len() != n || face_conductance.len() != n {
            return Err(CoreError::model_description(
                "matrix",
                format!(
                    "coefficient lengths {}/{} do not match {} compartments",
                    cv_capacitance.len(),
                    face_conductance.len(),
                    n
                ),
            ));
        }

        let mut cell_index = Vec::new();
        for (i, &p) in parent_index.iter().enumerate() {
            let p = p as usize;
            if p > i {
                return Err(CoreError::model_description(
                    "matrix",
                    format!("parent index {} of compartment {} exceeds it", p, i),
                ));
            }
            if p == i {
                cell_index.push(i as Index);
            }
        }
        if cell_index.is_empty() {
            cell_index.push(0);
        }
        cell_index.push(n as Index);

        let backend = B::default();
        let d = backend.alloc(n);
        let u = backend.alloc(n);
        let rhs = backend.alloc(n);
        Ok(Self {
            backend,
            parent_index,
            cell_index,
            cv_capacitance,
            face_conductance,
            d,
            u,
            rhs,
        })
    }

    /// Total number of compartments across all cells.
    pub fn size(&self) -> usize {
        self.parent_index.len()
    }

    /// Number of cells packed into this matrix.
    pub fn num_cells(&self) -> usize {
        self.cell_index.len() - 1
    }

    /// The packed parent index.
    pub fn p(&self) -> &[Index] {
        &self.parent_index
    }

    /// Diagonal, valid after `assemble` (consumed by `solve`).
    pub fn d(&self) -> &[Value] {
        self.d.as_ref()
    }

    /// Mutable diagonal, for callers assembling by hand.
    pub fn d_mut(&mut self) -> &mut [Value] {
        self.d.as_mut()
    }

    /// Upper off-diagonal.
    pub fn u(&self) -> &[Value] {
        self.u.as_ref()
    }

    /// Mutable upper off-diagonal.
    pub fn u_mut(&mut self) -> &mut [Value] {
        self.u.as_mut()
    }

    /// Right-hand side; holds the solution after `solve`.
    pub fn rhs(&self) -> &[Value] {
        self.rhs.as_ref()
    }

    /// Mutable right-hand side.
    pub fn rhs_mut(&mut self) -> &mut [Value] {
        self.rhs.as_mut()
    }

    /// Assemble `d`, `u` and `rhs` for one implicit step of length `dt` from
    /// the current voltage and the aggregated membrane current (nA, positive
    /// outward).
    ///
    /// `d[i] = c_i/dt + Σ face conductances`, `u[i] = -g_face(i)`,
    /// `rhs[i] = c_i/dt · v_i − i_m(i)`.
    pub fn assemble(&mut self, dt: Value, voltage: &[Value], current: &[Value]) {
        let n = self.size();
        debug_assert_eq!(voltage.len(), n);
        debug_assert_eq!(current.len(), n);

        let oodt = 1.0 / dt;
        {
            let d = self.d.as_mut();
            let u = self.u.as_mut();
            let rhs = self.rhs.as_mut();
            for i in 0..n {
                let cv = self.cv_capacitance[i] * oodt;
                d[i] = cv + self.face_conductance[i];
                u[i] = -self.face_conductance[i];
                rhs[i] = cv * voltage[i] - current[i];
            }
        }
        // fold each face conductance into the parent diagonal as well
        self.backend.scatter_add(
            self.d.as_mut(),
            &self.parent_index,
            &self.face_conductance,
        );
    }

    /// Solve in place; afterwards `rhs` holds the new voltage.
    pub fn solve(&mut self) {
        self.backend.solve_hines(
            &self.parent_index,
            self.d.as_mut(),
            self.u.as_ref(),
            self.rhs.as_mut(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MulticoreBackend;

    type Matrix = HinesMatrix<MulticoreBackend>;

    fn fill(v: &mut [Value], x: Value) {
        v.iter_mut().for_each(|e| *e = x);
    }

    #[test]
    fn construct_from_parent_only() {
        let m = Matrix::from_parent_index(vec![0, 0, 1]).unwrap();
        assert_eq!(m.num_cells(), 1);
        assert_eq!(m.size(), 3);
        assert_eq!(m.p(), &[0, 0, 1]);
    }

    #[test]
    fn rejects_forward_parent() {
        assert!(Matrix::from_parent_index(vec![0, 2, 1]).is_err());
    }

    #[test]
    fn solve_trivial() {
        // 1x1 system: 2 x = 1
        let mut m = Matrix::from_parent_index(vec![0]).unwrap();
        fill(m.d_mut(), 2.0);
        fill(m.u_mut(), -1.0);
        fill(m.rhs_mut(), 1.0);

        m.solve();

        assert_eq!(m.rhs()[0], 0.5);
    }

    #[test]
    fn solve_chain_residuals() {
        // unbranched cables from 2x2 up to 1000x1000 with d=2, u=-1, rhs=1;
        // check the residual of the second-difference system
        for n in 2usize..=1000 {
            let mut p: Vec<Index> = vec![0];
            p.extend((0..n - 1).map(|i| i as Index));
            let mut m = Matrix::from_parent_index(p).unwrap();
            assert_eq!(m.size(), n);
            assert_eq!(m.num_cells(), 1);

            fill(m.d_mut(), 2.0);
            fill(m.u_mut(), -1.0);
            fill(m.rhs_mut(), 1.0);

            m.solve();

            let x = m.rhs();
            let mut err = (2.0 * x[0] - x[1] - 1.0).powi(2);
            for i in 1..n - 1 {
                err += (2.0 * x[i] - x[i - 1] - x[i + 1] - 1.0).powi(2);
            }
            err += (2.0 * x[n - 1] - x[n - 2] - 1.0).powi(2);

            assert!(
                err.sqrt() < 1e-8,
                "residual {} for n = {}",
                err.sqrt(),
                n
            );
        }
    }

    #[test]
    fn assemble_builds_expected_coefficients() {
        // two compartments, capacitance 1 nF each, one face of 0.5 µS
        let mut m =
            Matrix::with_coefficients(vec![0, 0], vec![1.0, 1.0], vec![0.0, 0.5]).unwrap();
        let v = [-65.0, -60.0];
        let i = [0.1, -0.2];
        m.assemble(0.5, &v, &i);

        // d = c/dt + faces; the face conductance appears on both sides
        assert_eq!(m.d(), &[2.5, 2.5]);
        assert_eq!(m.u(), &[0.0, -0.5]);
        assert_eq!(m.rhs(), &[2.0 * -65.0 - 0.1, 2.0 * -60.0 + 0.2]);
    }
}
