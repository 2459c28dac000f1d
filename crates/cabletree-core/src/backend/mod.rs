//! Storage and kernel backend contract
//!
//! A backend supplies the engine with owned array storage and the small set
//! of numerical kernels the time stepper is built from: elementwise fill and
//! copy, scatter-add through a compressed index, gather at detector
//! compartments, and the Hines tridiagonal solve. All operations are
//! observably complete on return; failure to allocate is fatal by way of the
//! global allocator.
//!
//! The engine is generic over the backend so that group storage lives where
//! the kernels run, but dispatch happens once per high-level operation, never
//! per compartment.

mod multicore;

pub use multicore::MulticoreBackend;

/// Scalar type carried by backend arrays (64-bit float per the numerical
/// policy of the engine).
pub type Value = f64;

/// Index type used for compressed index vectors and parent pointers.
pub type Index = u32;

/// Storage and kernel provider for one cell group.
pub trait Backend: Default + Send + Sync + 'static {
    /// Owned array storage; contents are reachable as contiguous slices.
    type Array: AsRef<[Value]> + AsMut<[Value]> + Clone + Send + Sync + std::fmt::Debug;

    /// Allocate a zero-filled array of length `n`.
    fn alloc(&self, n: usize) -> Self::Array;

    /// Set every element of `v` to `x`.
    fn fill(&self, v: &mut [Value], x: Value);

    /// Copy `from` into `to`; lengths must match.
    fn copy(&self, from: &[Value], to: &mut [Value]);

    /// `dst[index[k]] += src[k]` for every `k`.
    fn scatter_add(&self, dst: &mut [Value], index: &[Index], src: &[Value]);

    /// `out[k] = src[index[k]]` for every `k`.
    fn gather(&self, src: &[Value], index: &[Index], out: &mut [Value]);

    /// Solve the Hines-structured system in place, overwriting `rhs` with the
    /// solution.
    ///
    /// `p` is the packed parent index with `p[i] <= i` and `p[i] == i` exactly
    /// at cell roots; `d` is consumed by the elimination. The backward pass
    /// eliminates the upper off-diagonal into parents in descending index
    /// order, the forward pass substitutes in ascending order. Compartments of
    /// different cells never reference each other, so cells solve
    /// independently within the shared layout.
    fn solve_hines(&self, p: &[Index], d: &mut [Value], u: &[Value], rhs: &mut [Value]);
}
