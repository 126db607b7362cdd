//! The Aasen factorization of a Hermitian matrix $A$ is such that:
//! $$P^\top A P = L T L^H,$$
//! where $P$ is a permutation matrix, $L$ is a unit lower triangular matrix whose first block
//! column is the identity, and $T$ is a Hermitian block tridiagonal matrix whose sub-diagonal
//! blocks are upper triangular.
//!
//! The matrix is stored as a [`TileMatrix`](crate::tile::TileMatrix) and the factorization
//! proceeds one tile column at a time. For tile column `k`, the already computed part of `T` and
//! `L` is used to form `T(k, k)` and the column `L(k + 1.., k + 1)`, which is then factorized
//! with partial pivoting. The resulting row interchanges are propagated to the previously
//! computed columns of `L` and, symmetrically, to the trailing submatrix.

/// Computing the decomposition.
pub mod compute;
/// Cooperative LU factorization of tall panels.
pub mod panel;
/// Propagation of row interchanges.
pub mod pivot;
/// Reconstructing the original matrix from the decomposition.
pub mod reconstruct;
/// Pairwise reduction schedules.
pub mod reduction;
/// Workspace zones and partitioning.
pub mod workspace;

pub use workspace::UpdateStrategy;

/// This error signifies that the Aasen decomposition could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AasenError {
    /// A panel factorization found an exactly zero pivot. The position is the one-based index of
    /// the corresponding diagonal entry of `L`, in the global row/column numbering.
    Factorization {
        /// One-based global row of the zero pivot.
        row: usize,
        /// One-based global column of the zero pivot.
        col: usize,
    },
    /// The sequence had already failed before the factorization was started, so it was not
    /// performed.
    SequenceFlushed,
}

impl core::fmt::Display for AasenError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for AasenError {}

/// Aasen factorization tuning parameters.
#[derive(Default, Copy, Clone, Debug)]
#[non_exhaustive]
pub struct AasenParams {
    /// Number of `nb × nb` reduction slots in each of the two accumulation zones of the
    /// workspace. `0` selects `max(2·mt, threads)`.
    pub reduction_slots: usize,
    /// Number of threads cooperating on each panel factorization. `0` selects
    /// `min(threads, panel tile rows)`.
    pub panel_threads: usize,
}

/// Per tile column instrumentation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColumnStats {
    /// Tile column index.
    pub column: usize,
    /// Number of tasks whose body ran.
    pub tasks_executed: usize,
    /// Number of tasks that were skipped because the sequence had failed.
    pub tasks_skipped: usize,
    /// Strategy used for the update of `L(k + 1.., k + 1)`, if there was one.
    pub update: Option<UpdateStrategy>,
}

/// Information about the resulting Aasen factorization.
#[derive(Clone, Debug, Default)]
pub struct AasenInfo {
    /// Number of transpositions that were performed, can be used to compute the determinant of
    /// $P$.
    pub transposition_count: usize,
    /// Instrumentation for each tile column, in order.
    pub columns: Vec<ColumnStats>,
}
