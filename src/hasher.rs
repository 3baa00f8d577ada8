//! Deterministic hash-to-scalar mappings.
//!
//! Every byte string that enters a committed vector does so through blake2b-256
//! followed by reduction into the BN254 scalar field. Values and child
//! commitments use the same mapping so that prover and verifier derive
//! identical vector entries from the wire representation alone.
use ark_bn254::{Fr, G1Projective};
use ark_ff::{PrimeField, Zero};
use ark_serialize::CanonicalSerialize;
use blake2::{digest::consts::U32, Blake2b, Digest};

use crate::constant::G1_BYTES;

/// blake2b with a 256-bit digest.
pub type Blake2b256 = Blake2b<U32>;

/// Computes blake2b-256 of `data`.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Maps arbitrary bytes into a scalar: blake2b-256, then reduce.
pub fn value_scalar(data: &[u8]) -> Fr {
    Fr::from_le_bytes_mod_order(&blake2b_256(data))
}

/// Canonical compressed bytes of a G1 point.
pub fn point_bytes(point: &G1Projective) -> [u8; G1_BYTES] {
    let mut out = [0u8; G1_BYTES];
    point
        .serialize_compressed(&mut out[..])
        .expect("G1 compressed serialization is infallible for a fixed-size buffer");
    out
}

/// Maps an optional child commitment into its vector entry.
///
/// An absent child is the zero scalar. A present child hashes its compressed
/// bytes, so even the identity point maps to a nonzero scalar; absence and a
/// stored identity commitment are distinguishable in the committed vector.
pub fn point_scalar(point: Option<&G1Projective>) -> Fr {
    match point {
        None => Fr::zero(),
        Some(p) => Fr::from_le_bytes_mod_order(&blake2b_256(&point_bytes(p))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::Group;

    #[test]
    fn value_scalar_is_deterministic() {
        assert_eq!(value_scalar(b"abc"), value_scalar(b"abc"));
        assert_ne!(value_scalar(b"abc"), value_scalar(b"abd"));
    }

    #[test]
    fn absent_point_maps_to_zero() {
        assert_eq!(point_scalar(None), Fr::zero());
    }

    /// The identity point is a valid stored commitment and must not collide
    /// with the absent-child encoding.
    #[test]
    fn identity_point_maps_to_nonzero() {
        let zero_point = G1Projective::zero();
        assert_ne!(point_scalar(Some(&zero_point)), Fr::zero());
    }

    #[test]
    fn point_scalar_matches_hash_of_compressed_bytes() {
        let g = G1Projective::generator();
        let expected = Fr::from_le_bytes_mod_order(&blake2b_256(&point_bytes(&g)));
        assert_eq!(point_scalar(Some(&g)), expected);
    }
}
