//! The SRP-6a computations.
//!
//! All big integers travel as minimal big-endian byte strings (the form
//! `BigUint::to_bytes_be` produces), and every hash is taken over exactly
//! the bytes that cross the wire, so both ends stay bit-compatible.
//! Hashing uses unpadded operands: `k = H(N ‖ g)` hashes g as the single
//! byte `0x02`.

use num_bigint_dig::BigUint;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::srp::group::{generator, modulus};
use crate::srp::PROOF_SIZE;

/// SHA-256 over the concatenation of the given byte sequences.
fn hash_parts(parts: &[&[u8]]) -> [u8; PROOF_SIZE] {
    let mut digest = Sha256::new();
    for part in parts {
        digest.update(part);
    }
    digest.finalize().into()
}

/// The multiplier parameter `k = H(N ‖ g)`.
pub fn compute_k() -> BigUint {
    let hash = hash_parts(&[&modulus().to_bytes_be(), &generator().to_bytes_be()]);
    BigUint::from_bytes_be(&hash)
}

/// The scrambling parameter `u = H(A ‖ B)` over the wire-form bytes.
pub fn compute_u(a_pub: &[u8], b_pub: &[u8]) -> BigUint {
    BigUint::from_bytes_be(&hash_parts(&[a_pub, b_pub]))
}

/// Reject a zero scrambling parameter, which would let the server forge
/// the session without the verifier.
pub fn ensure_nonzero_u(u: &BigUint) -> Result<()> {
    if *u == BigUint::default() {
        return Err(Error::Auth);
    }
    Ok(())
}

/// The private key `x = H(salt ‖ H(username ‖ ":" ‖ password))`.
pub fn compute_x(salt: &[u8], username: &str, password: &str) -> BigUint {
    let identity = hash_parts(&[username.as_bytes(), b":", password.as_bytes()]);
    BigUint::from_bytes_be(&hash_parts(&[salt, &identity]))
}

/// The password verifier `v = g^x mod N`.
pub fn compute_verifier(x: &BigUint) -> BigUint {
    generator().modpow(x, modulus())
}

/// The client's public ephemeral `A = g^a mod N`.
pub fn compute_a_pub(a: &BigUint) -> BigUint {
    generator().modpow(a, modulus())
}

/// The server's public ephemeral `B = (k·v + g^b) mod N`.
pub fn compute_b_pub(b: &BigUint, v: &BigUint) -> BigUint {
    let n = modulus();
    let kv = (compute_k() * v) % n;
    (kv + generator().modpow(b, n)) % n
}

/// The client-side premaster secret `S = (B − k·g^x)^(a + u·x) mod N`.
///
/// The base subtraction wraps modulo N: `(k·v + g^b) mod N` may be smaller
/// than `k·g^x` even for honest peers.
pub fn premaster_client(b_pub: &BigUint, x: &BigUint, a: &BigUint, u: &BigUint) -> BigUint {
    let n = modulus();
    let kgx = (compute_k() * generator().modpow(x, n)) % n;
    let base = if *b_pub > kgx {
        (b_pub - &kgx) % n
    } else {
        (n + b_pub - &kgx) % n
    };
    // u and x are 256-bit hashes, so u·x never reaches N and needs no
    // reduction; reducing it mod N would be wrong anyway (the exponent
    // lives mod the group order, not mod N).
    base.modpow(&(a + u * x), n)
}

/// The server-side premaster secret `S = (A · v^u)^b mod N`.
pub fn premaster_server(a_pub: &BigUint, v: &BigUint, u: &BigUint, b: &BigUint) -> BigUint {
    let n = modulus();
    let base = (a_pub * v.modpow(u, n)) % n;
    base.modpow(b, n)
}

/// The shared session secret `K = H(S)`.
pub fn session_hash(s: &BigUint) -> [u8; PROOF_SIZE] {
    hash_parts(&[&s.to_bytes_be()])
}

/// The client proof
/// `M = H((H(N) XOR H(g)) ‖ H(username) ‖ salt ‖ A ‖ B ‖ K)`.
pub fn compute_m(
    username: &str,
    salt: &[u8],
    a_pub: &[u8],
    b_pub: &[u8],
    key: &[u8],
) -> [u8; PROOF_SIZE] {
    let h_n = hash_parts(&[&modulus().to_bytes_be()]);
    let h_g = hash_parts(&[&generator().to_bytes_be()]);

    let mut h_n_xor_h_g = [0u8; PROOF_SIZE];
    for (out, (a, b)) in h_n_xor_h_g.iter_mut().zip(h_n.iter().zip(h_g.iter())) {
        *out = a ^ b;
    }

    let h_username = hash_parts(&[username.as_bytes()]);
    hash_parts(&[&h_n_xor_h_g, &h_username, salt, a_pub, b_pub, key])
}

/// The server proof `H_AMK = H(A ‖ M ‖ K)`.
pub fn compute_server_proof(a_pub: &[u8], m: &[u8], key: &[u8]) -> [u8; PROOF_SIZE] {
    hash_parts(&[a_pub, m, key])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecureRandom;
    use crate::srp::EPHEMERAL_SIZE;

    fn random_ephemeral() -> BigUint {
        BigUint::from_bytes_be(&SecureRandom::bytes::<EPHEMERAL_SIZE>())
    }

    #[test]
    fn test_k_is_stable_and_nonzero() {
        let k = compute_k();
        assert_ne!(k, BigUint::default());
        assert_eq!(k, compute_k());
    }

    #[test]
    fn test_verifier_matches_exponentiation() {
        let x = compute_x(b"0123456789abcdef", "alice", "sesame");
        let v = compute_verifier(&x);
        assert_eq!(v, generator().modpow(&x, modulus()));
        assert_ne!(v, BigUint::default());
    }

    #[test]
    fn test_both_sides_agree_on_premaster() {
        let salt = SecureRandom::bytes::<16>();
        let x = compute_x(&salt, "alice", "sesame");
        let v = compute_verifier(&x);

        let a = random_ephemeral();
        let b = random_ephemeral();

        let a_pub = compute_a_pub(&a);
        let b_pub = compute_b_pub(&b, &v);

        let u = compute_u(&a_pub.to_bytes_be(), &b_pub.to_bytes_be());
        ensure_nonzero_u(&u).unwrap();

        let client_s = premaster_client(&b_pub, &x, &a, &u);
        let server_s = premaster_server(&a_pub, &v, &u, &b);

        assert_eq!(client_s, server_s);
        assert_eq!(session_hash(&client_s), session_hash(&server_s));
    }

    #[test]
    fn test_wrong_password_diverges() {
        let salt = SecureRandom::bytes::<16>();
        let x = compute_x(&salt, "alice", "sesame");
        let v = compute_verifier(&x);

        let a = random_ephemeral();
        let b = random_ephemeral();

        let a_pub = compute_a_pub(&a);
        let b_pub = compute_b_pub(&b, &v);
        let u = compute_u(&a_pub.to_bytes_be(), &b_pub.to_bytes_be());

        // Client typed the wrong password, so its x (and hence S) differ.
        let x_bad = compute_x(&salt, "alice", "sesa me");
        let client_s = premaster_client(&b_pub, &x_bad, &a, &u);
        let server_s = premaster_server(&a_pub, &v, &u, &b);

        assert_ne!(client_s, server_s);
    }

    #[test]
    fn test_proofs_depend_on_every_input() {
        let salt = [7u8; 16];
        let key = [9u8; 32];
        let m = compute_m("alice", &salt, b"AAAA", b"BBBB", &key);

        assert_ne!(m, compute_m("alicf", &salt, b"AAAA", b"BBBB", &key));
        assert_ne!(m, compute_m("alice", &[8u8; 16], b"AAAA", b"BBBB", &key));
        assert_ne!(m, compute_m("alice", &salt, b"AAAB", b"BBBB", &key));
        assert_ne!(m, compute_m("alice", &salt, b"AAAA", b"BBBC", &key));
        assert_ne!(m, compute_m("alice", &salt, b"AAAA", b"BBBB", &[0u8; 32]));

        let proof = compute_server_proof(b"AAAA", &m, &key);
        assert_ne!(proof, compute_server_proof(b"AAAA", &m, &[0u8; 32]));
    }

    #[test]
    fn test_zero_u_is_rejected() {
        assert!(ensure_nonzero_u(&BigUint::default()).is_err());
        assert!(ensure_nonzero_u(&BigUint::from(1u32)).is_ok());
    }
}
