//! Linear algebra module.
//!
//! Contains the tile kernels used by the factorization, and the factorization itself. Matrix
//! products and triangular solves are delegated to [`faer::linalg`].
//!
//! # Memory allocation
//! Algorithms that need temporary space for intermediate computations expose a function ending
//! in `_req` that returns their memory requirements as a [`dyn_stack::StackReq`]. The requirement
//! can be combined with others ([`dyn_stack::StackReq::try_all_of`]) and allocated once, for
//! example through [`dyn_stack::GlobalPodBuffer::new`].

pub use faer_entity as entity;

pub mod aasen;
pub mod kernels;
