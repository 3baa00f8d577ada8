//! Trusted setup: generation, serialization, and the precomputed
//! barycentric tables used by the prover.
use ark_bn254::{Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{CurveGroup, Group};
use ark_ff::{batch_inversion, Field, One, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rayon::prelude::*;
use std::path::Path;

use crate::{
    constant::{setup_byte_len, QUASI_ROOT_OF_UNITY_257},
    hasher::blake2b_256,
    kzg::KzgError,
};

/// Public parameters for KZG commitments to length-`d` scalar vectors.
///
/// Persistent fields are `d`, `omega`, the G1 Lagrange basis and the G2
/// divisor points; everything else is recomputed deterministically on
/// deserialization. `omega == 0` is the sentinel for the natural evaluation
/// domain `0, 1, .., d-1`; any other value selects the power domain
/// `omega^0, .., omega^(d-1)`.
///
/// Generation consumes the secret evaluation point and overwrites the caller's
/// copy before returning; the setup itself is a public value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedSetup {
    /// Domain size. 257 everywhere in this system, but carried by the format.
    pub d: u16,
    /// Domain selector: zero for the natural domain, else the domain generator.
    pub omega: Fr,
    /// `L_i = [l_i(s)]1` where `l_i` is the Lagrange interpolant of domain
    /// point i and s is the destroyed secret.
    pub lagrange_basis: Vec<G1Affine>,
    /// `Diff2_i = [s - domain_i]2`, the divisor commitments used by `verify`.
    pub diff2: Vec<G2Affine>,
    /// The evaluation domain itself. Derived, not serialized.
    pub domain: Vec<Fr>,
    /// `A'(domain_m) = prod_{i != m} (domain_m - domain_i)`. Derived.
    pub aprime_domain: Vec<Fr>,
    /// Natural-domain-only lookup tables for the barycentric quotient formula.
    precomputed: Option<Precomputed>,
}

/// Lookup tables valid only for the natural domain, where `domain_m - domain_j`
/// depends on `m - j` alone.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Precomputed {
    /// `1/(m - j)` at index `d - 1 + m - j`. The `m == j` slot is unused.
    invsub: Vec<Fr>,
    /// `ta[m][j] = (A'(m) / A'(j)) * 1/(m - j)`. The diagonal is unused.
    ta: Vec<Vec<Fr>>,
    /// `tk[m] = sum_{j != m} ta[m][j]`.
    tk: Vec<Fr>,
}

/// Returns a quasi-primitive d-th root of unity for the supported domain size.
///
/// 257 does not divide r-1 in the BN254 scalar field, so no element has order
/// exactly 257; the returned element has order 261, the smallest divisor of
/// r-1 that is >= 257, making its first 257 powers pairwise distinct. Other
/// domain sizes are not supported.
pub fn quasi_primitive_root_of_unity(d: u16) -> Result<Fr, KzgError> {
    match d {
        257 => Ok(QUASI_ROOT_OF_UNITY_257),
        _ => Err(KzgError::UnsupportedDomain(d)),
    }
}

impl TrustedSetup {
    /// Generates a setup over the power domain `omega^0 .. omega^(d-1)`.
    ///
    /// Rejects trivial secrets, a secret colliding with a domain point, and an
    /// omega whose order is below `d` (the domain would repeat). The caller's
    /// secret is overwritten with zero before this function returns, on every
    /// path.
    pub fn generate_from_secret_powers(
        d: u16,
        omega: Fr,
        secret: &mut Fr,
    ) -> Result<Self, KzgError> {
        Self::generate(d, Some(omega), secret)
    }

    /// Generates a setup over the natural domain `0 .. d-1` and populates the
    /// precomputed barycentric tables. Same secret hygiene as
    /// [`Self::generate_from_secret_powers`].
    pub fn generate_from_secret_natural_domain(d: u16, secret: &mut Fr) -> Result<Self, KzgError> {
        Self::generate(d, None, secret)
    }

    /// Derives a natural-domain setup from a seed: secret =
    /// blake2b-256(seed) reduced into the field.
    ///
    /// The seed is as sensitive as the secret itself; this constructor exists
    /// for tests and tooling where the seed is public by design.
    pub fn from_seed(d: u16, seed: &[u8]) -> Result<Self, KzgError> {
        let mut secret = Fr::from_le_bytes_mod_order(&blake2b_256(seed));
        Self::generate(d, None, &mut secret)
    }

    fn generate(d: u16, omega: Option<Fr>, secret: &mut Fr) -> Result<Self, KzgError> {
        // Move the secret to a local and scrub the caller's copy first, so
        // every return path below leaves nothing behind.
        let s = *secret;
        *secret = Fr::zero();

        if s.is_zero() || s.is_one() {
            return Err(KzgError::WrongSecret);
        }

        let d_usize = d as usize;
        let (omega, domain) = match omega {
            Some(omega) => {
                if omega.is_zero() {
                    // Zero is the natural-domain sentinel, not a generator.
                    return Err(KzgError::NotRootOfUnity { power: 0 });
                }
                let mut domain = Vec::with_capacity(d_usize);
                let mut pow = Fr::one();
                for i in 0..d_usize {
                    if i > 0 {
                        pow *= omega;
                        if pow.is_one() {
                            return Err(KzgError::WrongRootOfUnity { power: i });
                        }
                    }
                    if pow == s {
                        return Err(KzgError::WrongSecret);
                    }
                    domain.push(pow);
                }
                (omega, domain)
            }
            None => (Fr::zero(), natural_domain(d_usize)),
        };

        let aprime_domain = aprime(&domain);

        // l_i(s) = prod_{j != i} (s - domain_j) / A'(domain_i), with the
        // numerators assembled from prefix/suffix products of (s - domain_j).
        let diffs: Vec<Fr> = domain.iter().map(|x| s - x).collect();
        let mut prefix = vec![Fr::one(); d_usize + 1];
        for i in 0..d_usize {
            prefix[i + 1] = prefix[i] * diffs[i];
        }
        let mut suffix = vec![Fr::one(); d_usize + 1];
        for i in (0..d_usize).rev() {
            suffix[i] = suffix[i + 1] * diffs[i];
        }
        let mut aprime_inv = aprime_domain.clone();
        batch_inversion(&mut aprime_inv);

        let g1 = G1Projective::generator();
        let lagrange_basis = G1Projective::normalize_batch(
            &(0..d_usize)
                .into_par_iter()
                .map(|i| g1 * (prefix[i] * suffix[i + 1] * aprime_inv[i]))
                .collect::<Vec<_>>(),
        );

        let g2 = G2Projective::generator();
        let diff2 = G2Projective::normalize_batch(
            &domain
                .par_iter()
                .map(|x| g2 * (s - x))
                .collect::<Vec<_>>(),
        );

        let mut setup = Self {
            d,
            omega,
            lagrange_basis,
            diff2,
            domain,
            aprime_domain,
            precomputed: None,
        };
        if setup.omega.is_zero() {
            setup.precompute();
        }
        Ok(setup)
    }

    /// Serializes the persistent fields: little-endian `u16` domain size,
    /// omega, the Lagrange basis, the divisor points. No length prefixes; the
    /// leading `d` fixes every subsequent size.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(setup_byte_len(self.d as usize));
        out.extend_from_slice(&self.d.to_le_bytes());
        self.omega
            .serialize_compressed(&mut out)
            .expect("serialization into a Vec cannot fail");
        for p in &self.lagrange_basis {
            p.serialize_compressed(&mut out)
                .expect("serialization into a Vec cannot fail");
        }
        for p in &self.diff2 {
            p.serialize_compressed(&mut out)
                .expect("serialization into a Vec cannot fail");
        }
        out
    }

    /// Deserializes a setup and recomputes the derived fields.
    ///
    /// Domain and `A'` values are rebuilt from `omega` and `d`; in natural
    /// mode the precomputed tables are rebuilt as well, so a round trip
    /// restores the setup component-wise. Every point is validated.
    pub fn from_bytes(data: &[u8]) -> Result<Self, KzgError> {
        if data.len() < 2 {
            return Err(KzgError::Truncated {
                expected: 2,
                actual: data.len(),
            });
        }
        let d = u16::from_le_bytes([data[0], data[1]]);
        let d_usize = d as usize;
        let expected = setup_byte_len(d_usize);
        if data.len() != expected {
            return Err(KzgError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        let mut reader = &data[2..];
        let omega = Fr::deserialize_compressed(&mut reader)?;
        let mut lagrange_basis = Vec::with_capacity(d_usize);
        for _ in 0..d_usize {
            lagrange_basis.push(G1Affine::deserialize_compressed(&mut reader)?);
        }
        let mut diff2 = Vec::with_capacity(d_usize);
        for _ in 0..d_usize {
            diff2.push(G2Affine::deserialize_compressed(&mut reader)?);
        }

        let domain = if omega.is_zero() {
            natural_domain(d_usize)
        } else {
            let mut domain = Vec::with_capacity(d_usize);
            let mut pow = Fr::one();
            for i in 0..d_usize {
                if i > 0 {
                    pow *= omega;
                    if pow.is_one() {
                        return Err(KzgError::NotRootOfUnity { power: i });
                    }
                }
                domain.push(pow);
            }
            domain
        };
        let aprime_domain = aprime(&domain);

        let mut setup = Self {
            d,
            omega,
            lagrange_basis,
            diff2,
            domain,
            aprime_domain,
            precomputed: None,
        };
        if setup.omega.is_zero() {
            setup.precompute();
        }
        Ok(setup)
    }

    /// Reads a setup from a file produced by `kzg_setup` or [`Self::to_bytes`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KzgError> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// `1/(domain_m - domain_j)`, `m != j`. Table lookup when precomputed.
    pub fn inv_sub(&self, m: usize, j: usize) -> Fr {
        debug_assert_ne!(m, j);
        if let Some(pre) = &self.precomputed {
            return pre.invsub[self.d as usize - 1 + m - j];
        }
        (self.domain[m] - self.domain[j])
            .inverse()
            .expect("domain points are pairwise distinct")
    }

    /// `T_A(m, j) = (A'(domain_m) / A'(domain_j)) * 1/(domain_m - domain_j)`.
    pub fn t_a(&self, m: usize, j: usize) -> Fr {
        if let Some(pre) = &self.precomputed {
            return pre.ta[m][j];
        }
        self.inv_sub(m, j) * self.aprime_domain[m]
            * self
                .aprime_domain[j]
                .inverse()
                .expect("A' of a distinct domain is nonzero")
    }

    /// `T_K(m) = sum_{j != m} T_A(m, j)`.
    pub fn t_k(&self, m: usize) -> Fr {
        if let Some(pre) = &self.precomputed {
            return pre.tk[m];
        }
        (0..self.d as usize)
            .filter(|&j| j != m)
            .map(|j| self.t_a(m, j))
            .sum()
    }

    /// Builds the natural-domain lookup tables. Only valid when
    /// `domain_i == i`; generation and deserialization invoke it exactly then.
    fn precompute(&mut self) {
        let d = self.d as usize;

        // invsub[d - 1 + delta] = 1/delta for delta in -(d-1)..=(d-1), delta != 0.
        let mut pos = (1..d).map(|delta| Fr::from(delta as u64)).collect::<Vec<_>>();
        batch_inversion(&mut pos);
        let mut invsub = vec![Fr::zero(); 2 * d - 1];
        for (delta, inv) in (1..d).zip(pos) {
            invsub[d - 1 + delta] = inv;
            invsub[d - 1 - delta] = -inv;
        }

        let mut aprime_inv = self.aprime_domain.clone();
        batch_inversion(&mut aprime_inv);

        let mut ta = vec![vec![Fr::zero(); d]; d];
        let mut tk = vec![Fr::zero(); d];
        for m in 0..d {
            let mut acc = Fr::zero();
            for j in 0..d {
                if j == m {
                    continue;
                }
                let t = self.aprime_domain[m] * aprime_inv[j] * invsub[d - 1 + m - j];
                ta[m][j] = t;
                acc += t;
            }
            tk[m] = acc;
        }

        self.precomputed = Some(Precomputed { invsub, ta, tk });
    }
}

fn natural_domain(d: usize) -> Vec<Fr> {
    (0..d as u64).map(Fr::from).collect()
}

/// `A'(domain_m) = prod_{i != m} (domain_m - domain_i)` for every m.
fn aprime(domain: &[Fr]) -> Vec<Fr> {
    (0..domain.len())
        .map(|m| {
            domain
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != m)
                .map(|(_, x)| domain[m] - x)
                .product()
        })
        .collect()
}
