//! Commit / open / verify over the Lagrange basis.
//!
//! A length-d vector `V` determines the unique polynomial p of degree < d with
//! `p(domain_i) = V_i`. The commitment is `[p(s)]1`, assembled directly from
//! the basis; an opening at index m is the commitment to the quotient
//! `(p(X) - V_m) / (X - domain_m)`, built in evaluation form without ever
//! materializing coefficients.
use ark_bn254::{Bn254, Fr, G1Projective, G2Affine};
use ark_ec::{pairing::Pairing, AffineRepr, Group, VariableBaseMSM};
use ark_ff::Zero;

use super::TrustedSetup;

impl TrustedSetup {
    /// Commits to a length-d scalar vector: `C = sum V_i * L_i = [p(s)]1`.
    pub fn commit(&self, values: &[Fr]) -> G1Projective {
        assert_eq!(values.len(), self.d as usize, "vector length != domain size");
        G1Projective::msm_unchecked(&self.lagrange_basis, values)
    }

    /// Opens the vector at index m: the proof that `p(domain_m) = V_m`.
    ///
    /// The quotient is evaluated pointwise on the domain:
    /// `q_j = (V_j - V_m) * (-inv_sub(m, j))` away from the pole, and at the
    /// pole itself `q_m = sum_{j != m} T_A(m, j) * V_j - V_m * T_K(m)`.
    pub fn prove(&self, values: &[Fr], m: usize) -> G1Projective {
        let d = self.d as usize;
        assert_eq!(values.len(), d, "vector length != domain size");
        assert!(m < d, "opening index out of domain");

        let mut q = vec![Fr::zero(); d];
        let mut q_m = -values[m] * self.t_k(m);
        for j in 0..d {
            if j == m {
                continue;
            }
            q[j] = -(values[j] - values[m]) * self.inv_sub(m, j);
            q_m += self.t_a(m, j) * values[j];
        }
        q[m] = q_m;
        G1Projective::msm_unchecked(&self.lagrange_basis, &q)
    }

    /// Verifies an opening: `e(C - y*G1, G2) == e(pi, [s - domain_m]2)`.
    ///
    /// Pure check, no side effects. An out-of-domain index is simply an
    /// invalid opening; adversarial indices never panic.
    pub fn verify(&self, c: &G1Projective, proof: &G1Projective, value: Fr, m: usize) -> bool {
        if m >= self.d as usize {
            return false;
        }
        let lhs = *c - G1Projective::generator() * value;
        Bn254::pairing(lhs, G2Affine::generator()) == Bn254::pairing(*proof, self.diff2[m])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kzg::quasi_primitive_root_of_unity;
    use ark_ff::{Field, One, UniformRand};
    use once_cell::sync::Lazy;
    use rand::{rngs::StdRng, SeedableRng};

    const D: u16 = 17;

    /// Small natural-domain setup; cheap enough to share eagerly.
    static NATURAL: Lazy<TrustedSetup> =
        Lazy::new(|| TrustedSetup::from_seed(D, b"kzg commit test seed").unwrap());

    /// Full-width power-domain setup; generated once for the whole module.
    static POWERS: Lazy<TrustedSetup> = Lazy::new(|| {
        let omega = quasi_primitive_root_of_unity(257).unwrap();
        let mut secret = Fr::from(0xabcdef0123456789u64);
        TrustedSetup::generate_from_secret_powers(257, omega, &mut secret).unwrap()
    });

    fn random_vector(d: usize, rng: &mut StdRng) -> Vec<Fr> {
        (0..d).map(|_| Fr::rand(rng)).collect()
    }

    /// Interpolates the coefficients of the degree < d polynomial through
    /// `(domain_i, values_i)`. Quadratic, for cross-checking only.
    fn interpolate(domain: &[Fr], values: &[Fr]) -> Vec<Fr> {
        let d = domain.len();
        // A(X) = prod (X - domain_i), coefficient form.
        let mut a = vec![Fr::zero(); d + 1];
        a[0] = Fr::one();
        for (i, x) in domain.iter().enumerate() {
            // Multiply the accumulated product by (X - x).
            for k in (0..=i).rev() {
                let t = a[k];
                a[k + 1] += t;
                a[k] = -t * x;
            }
        }

        let mut coeffs = vec![Fr::zero(); d];
        for (i, x) in domain.iter().enumerate() {
            // l_i = A / (X - x) / A'(x), numerator by synthetic division.
            let quotient = divide_by_linear(&a, *x);
            let aprime_i: Fr = domain
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, y)| *x - y)
                .product();
            let scale = values[i] * aprime_i.inverse().unwrap();
            for (c, q) in coeffs.iter_mut().zip(&quotient) {
                *c += scale * q;
            }
        }
        coeffs
    }

    /// Divides a monic-friendly coefficient vector by `(X - x)`, dropping the
    /// (zero) remainder.
    fn divide_by_linear(coeffs: &[Fr], x: Fr) -> Vec<Fr> {
        let n = coeffs.len();
        let mut q = vec![Fr::zero(); n - 1];
        let mut carry = Fr::zero();
        for k in (0..n - 1).rev() {
            carry = coeffs[k + 1] + carry * x;
            q[k] = carry;
        }
        q
    }

    fn eval(coeffs: &[Fr], x: Fr) -> Fr {
        coeffs.iter().rev().fold(Fr::zero(), |acc, c| acc * x + c)
    }

    /// Builds the opening from first principles: interpolate p, subtract y,
    /// divide by (X - domain_m), evaluate the quotient back onto the domain,
    /// commit. Pins down the sign and index conventions of `prove`.
    fn reference_prove(ts: &TrustedSetup, values: &[Fr], m: usize) -> G1Projective {
        let mut coeffs = interpolate(&ts.domain, values);
        coeffs[0] -= values[m];
        let mut padded = coeffs;
        padded.push(Fr::zero());
        let quotient = divide_by_linear(&padded, ts.domain[m]);
        let q_values: Vec<Fr> = ts.domain.iter().map(|x| eval(&quotient, *x)).collect();
        ts.commit(&q_values)
    }

    /// Commitments are linear in the committed vector.
    #[test]
    fn commit_is_linear() {
        let ts = &*NATURAL;
        let mut rng = StdRng::seed_from_u64(7);
        let a = random_vector(D as usize, &mut rng);
        let b = random_vector(D as usize, &mut rng);
        let sum: Vec<Fr> = a.iter().zip(&b).map(|(x, y)| *x + y).collect();
        assert_eq!(ts.commit(&a) + ts.commit(&b), ts.commit(&sum));
    }

    #[test]
    fn prove_matches_reference_prover_natural_domain() {
        let ts = &*NATURAL;
        let mut rng = StdRng::seed_from_u64(11);
        let values = random_vector(D as usize, &mut rng);
        for m in 0..D as usize {
            assert_eq!(
                ts.prove(&values, m),
                reference_prove(&ts, &values, m),
                "quotient mismatch at index {m}"
            );
        }
    }

    #[test]
    fn prove_matches_reference_prover_power_domain() {
        let ts = &*POWERS;
        let mut rng = StdRng::seed_from_u64(13);
        let values = random_vector(ts.d as usize, &mut rng);
        for m in [0usize, 1, 128, 255, 256] {
            assert_eq!(
                ts.prove(&values, m),
                reference_prove(&ts, &values, m),
                "quotient mismatch at index {m}"
            );
        }
    }

    /// Core law: every honest opening of every index verifies.
    #[test]
    fn verify_accepts_honest_openings() {
        let ts = &*NATURAL;
        let mut rng = StdRng::seed_from_u64(17);
        let values = random_vector(D as usize, &mut rng);
        let c = ts.commit(&values);
        for m in 0..D as usize {
            let pi = ts.prove(&values, m);
            assert!(ts.verify(&c, &pi, values[m], m), "rejected opening at {m}");
        }
    }

    /// Core law: a claimed value other than V[m] is rejected.
    #[test]
    fn verify_rejects_wrong_value() {
        let ts = &*NATURAL;
        let mut rng = StdRng::seed_from_u64(19);
        let values = random_vector(D as usize, &mut rng);
        let c = ts.commit(&values);
        let m = 5;
        let pi = ts.prove(&values, m);
        assert!(!ts.verify(&c, &pi, values[m] + Fr::one(), m));
        assert!(!ts.verify(&c, &pi, Fr::zero(), m));
    }

    /// Core law: an opening for index i does not verify at index j, even
    /// against the correct value V[j].
    #[test]
    fn verify_rejects_crossed_indices() {
        let ts = &*NATURAL;
        let mut rng = StdRng::seed_from_u64(23);
        let values = random_vector(D as usize, &mut rng);
        let c = ts.commit(&values);
        let pi = ts.prove(&values, 3);
        assert!(!ts.verify(&c, &pi, values[4], 4));
    }

    #[test]
    fn verify_rejects_out_of_domain_index() {
        let ts = &*NATURAL;
        let mut rng = StdRng::seed_from_u64(29);
        let values = random_vector(D as usize, &mut rng);
        let c = ts.commit(&values);
        let pi = ts.prove(&values, 0);
        assert!(!ts.verify(&c, &pi, values[0], D as usize));
    }

    /// Openings verify identically after a serialization round trip of the
    /// setup, precomputed tables included.
    #[test]
    fn openings_survive_setup_round_trip() {
        let ts = &*NATURAL;
        let restored = TrustedSetup::from_bytes(&ts.to_bytes()).unwrap();
        let mut rng = StdRng::seed_from_u64(31);
        let values = random_vector(D as usize, &mut rng);
        let c = ts.commit(&values);
        let pi = restored.prove(&values, 2);
        assert_eq!(pi, ts.prove(&values, 2));
        assert!(restored.verify(&c, &pi, values[2], 2));
    }
}
