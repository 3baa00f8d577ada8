//! This module defines the constants that determine the shape of the trie and
//! of the serialized formats.
use ark_bn254::Fr;
use ark_ff::MontFp;

/// Size of the KZG evaluation domain, and hence of the committed vector of a
/// trie node: 256 child slots plus the terminal slot. Every serialized format
/// still carries its own `d: u16` so the domain size is not baked into the
/// wire layout.
pub const DOMAIN_SIZE: usize = 257;
/// Branch factor of the trie. Child indices are path bytes, 0..=255.
pub const NUM_CHILDREN: usize = 256;
/// Index of the terminal-value slot in a node's committed vector.
pub const TERMINAL_INDEX: usize = 256;

/// Canonical compressed width of a BN254 scalar.
pub const SCALAR_BYTES: usize = 32;
/// Canonical compressed width of a BN254 G1 point.
pub const G1_BYTES: usize = 32;
/// Canonical compressed width of a BN254 G2 point.
pub const G2_BYTES: usize = 64;

/// Key prefix of the partition holding raw user values, keyed by user key.
pub const PREFIX_VALUES: u8 = b'v';
/// Key prefix of the partition holding serialized trie nodes, keyed by trie path.
pub const PREFIX_TRIE: u8 = b't';
/// Key prefix of the partition holding the root commitment blob at the empty key.
pub const PREFIX_ROOT: u8 = b'r';

/// Serialized size of a trusted setup with domain size `d`:
/// `u16` domain size, omega, `d` G1 Lagrange basis points, `d` G2 divisor points.
pub const fn setup_byte_len(d: usize) -> usize {
    2 + SCALAR_BYTES + d * (G1_BYTES + G2_BYTES)
}

/// A quasi-primitive 257th root of unity in the BN254 scalar field.
///
/// 257 does not divide r-1, so no element of order exactly 257 exists. This
/// element has multiplicative order 261 = 9 * 29, the smallest divisor of r-1
/// that is >= 257; its powers `omega^0 .. omega^256` are therefore pairwise
/// distinct, which is the only property the evaluation domain requires. It is
/// `g^((r-1)/261)` for the multiplicative generator g = 5.
pub const QUASI_ROOT_OF_UNITY_257: Fr =
    MontFp!("13965639963592672158851766578475517059824231030368800879860780919410369788993");

/// Multiplicative order of [`QUASI_ROOT_OF_UNITY_257`].
pub const QUASI_ROOT_OF_UNITY_257_ORDER: u64 = 261;

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{Field, One};

    /// The hardcoded root of unity must have order exactly 261, with all powers
    /// up to the domain size distinct from one.
    #[test]
    fn quasi_root_of_unity_has_order_261() {
        let omega = QUASI_ROOT_OF_UNITY_257;
        let mut pow = Fr::one();
        for i in 1..=QUASI_ROOT_OF_UNITY_257_ORDER {
            pow *= omega;
            if i < DOMAIN_SIZE as u64 {
                assert_ne!(pow, Fr::one(), "omega^{i} == 1 inside the domain");
            }
        }
        assert_eq!(pow, Fr::one(), "omega^261 != 1");
        // Order divides 261 = 9 * 29; rule out the proper divisors.
        for d in [3u64, 9, 29, 87] {
            assert_ne!(omega.pow([d]), Fr::one(), "order divides {d}");
        }
    }

    #[test]
    fn setup_byte_len_for_standard_domain() {
        assert_eq!(setup_byte_len(DOMAIN_SIZE), 24_706);
    }
}
