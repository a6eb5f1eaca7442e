//! SRP-6a protocol math (RFC 5054).
//!
//! Pure functions over the fixed 2048-bit group-14 safe prime with
//! generator g = 2 and SHA-256 as the protocol hash. The stateful
//! client/server halves that drive these functions live in
//! [`crate::auth`].

mod group;
mod ops;

pub use group::{generator, modulus};
pub use ops::{
    compute_a_pub, compute_b_pub, compute_k, compute_m, compute_server_proof, compute_u,
    compute_verifier, compute_x, ensure_nonzero_u, premaster_client, premaster_server,
    session_hash,
};

/// Size of the private ephemeral values `a` and `b` in bytes (256 bits).
pub const EPHEMERAL_SIZE: usize = 32;

/// Size of the SRP proofs and shared secret hash in bytes (SHA-256).
pub const PROOF_SIZE: usize = 32;
