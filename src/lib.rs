//! `faer-aasen` computes the Aasen factorization of Hermitian (real symmetric) indefinite
//! matrices stored as square tiles.
//!
//! Given a matrix $A$, the factorization computes a permutation $P$, a unit lower triangular
//! matrix $L$ whose first block column is the identity, and a Hermitian block tridiagonal matrix
//! $T$ whose sub-diagonal blocks are upper triangular, such that
//! $$P^\top A P = L T L^H.$$
//!
//! Tiles are [`faer`] matrices, and the tile kernels are built on faer's matrix multiplication
//! and triangular solves. The computation is organized column of tiles by column of tiles. Each
//! column is decomposed into small tile kernels (matrix products, triangular solves, copies)
//! whose data dependencies are declared up front, and the resulting task graph is executed on
//! the current rayon thread pool.
//!
//! # Example
//! ```
//! use faer_aasen::{
//!     linalg::aasen::{compute, reconstruct, AasenParams},
//!     tile::{BandMatrix, TileMatrix},
//!     Mat, Parallelism, Side,
//! };
//!
//! let n = 7;
//! let a = Mat::<f64>::from_fn(n, n, |i, j| {
//!     let (i, j) = (i.max(j) as f64, i.min(j) as f64);
//!     (i * 3.0 - j).sin() + if i == j { 0.5 - i } else { 0.0 }
//! });
//!
//! let mut tiles = TileMatrix::from_dense(a.as_ref(), 3);
//! let mut band = BandMatrix::zeros(n, 3);
//! let mut ipiv = vec![0usize; n];
//!
//! compute::factorize(
//!     Side::Lower,
//!     &mut tiles,
//!     &mut band,
//!     &mut ipiv,
//!     Parallelism::None,
//!     AasenParams::default(),
//! )
//! .unwrap();
//!
//! let (perm, _) = reconstruct::permutation(&ipiv);
//! let lhs = reconstruct::permute_symmetric(a.as_ref(), &perm);
//! let rhs = reconstruct::reconstruct(Side::Lower, &tiles, &band);
//! assert!((&lhs - &rhs).norm_max() < 1e-10);
//! ```

#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(non_snake_case)]
#![warn(missing_docs)]

use equator::{assert, debug_assert};

pub use faer::{Conj, Mat, MatMut, MatRef, Parallelism, Side};
pub use faer_entity::{ComplexField, Entity, RealField};
pub use num_complex::Complex;

/// Dataflow runtime: region declarations, task graphs and failure status.
pub mod dataflow;
/// Tile kernels and the Aasen factorization.
pub mod linalg;
/// Tiled matrix storage.
pub mod tile;

mod utils;

/// 64-bit complex floating point type.
#[allow(non_camel_case_types)]
pub type c64 = Complex<f64>;
/// 32-bit complex floating point type.
#[allow(non_camel_case_types)]
pub type c32 = Complex<f32>;
