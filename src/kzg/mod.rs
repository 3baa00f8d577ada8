//! KZG polynomial commitments over a Lagrange basis.
//!
//! The [`TrustedSetup`] is the public artifact of a one-shot computation from a
//! secret evaluation point: the Lagrange basis projected to G1 and the divisor
//! points projected to G2. It contains no secret information but suffices to
//! commit to length-d scalar vectors, open them at single positions, and verify
//! openings with one pairing check per opening.
use thiserror::Error;

mod commit;
mod setup;

pub use setup::{quasi_primitive_root_of_unity, TrustedSetup};

/// Error type for trusted setup generation and decoding.
#[derive(Debug, Error)]
pub enum KzgError {
    /// The trapdoor is trivial (zero or one) or collides with a domain element.
    #[error("wrong secret: trivial trapdoor or collision with the evaluation domain")]
    WrongSecret,

    /// A power of omega inside the domain equals one, found while decoding.
    /// The domain would contain repeated points.
    #[error("not a root of unity: omega^{power} == 1 inside the domain")]
    NotRootOfUnity { power: usize },

    /// A power of omega inside the domain equals one, found while generating.
    #[error("wrong root of unity: omega^{power} == 1 while filling the domain")]
    WrongRootOfUnity { power: usize },

    /// Root-of-unity generation is only defined for the domain sizes the
    /// system actually uses.
    #[error("no quasi-primitive root of unity available for domain size {0}")]
    UnsupportedDomain(u16),

    /// A scalar or curve point failed canonical deserialization.
    #[error("malformed setup encoding: {0}")]
    InvalidEncoding(#[from] ark_serialize::SerializationError),

    /// The input ended before the domain size announced in its header.
    #[error("truncated setup: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
