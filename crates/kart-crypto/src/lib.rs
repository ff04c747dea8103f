//! Hashing primitives for Kart.
//!
//! Kart never invents its own content-addressing scheme: object identity is
//! whatever the underlying object store computes (see `kart-store`). This
//! crate only covers the two places Kart hashes things itself: spreading
//! sibling blobs across fan-out directories, and naming LFS objects by their
//! SHA-256 content hash.

pub mod hasher;

pub use hasher::{FanOutHasher, HasherError, Sha256Oid};
