//! The 257-ary path-compressed verkle trie.
//!
//! Every node commits to its 256 child subtrees and one terminal value slot
//! with a single KZG vector commitment; the root commitment binds the whole
//! key-value map. [`State`] maintains the trie over an abstract [`KvStore`]
//! with write-back caches, [`Proof`] carries one opening per visited node.
//!
//! [`KvStore`]: crate::kv::KvStore
use thiserror::Error;

mod node;
mod proof;
mod state;

pub use node::Node;
pub use proof::{verify_proof, Proof, ProofElement};
pub use state::State;

/// Error type for trie maintenance.
#[derive(Debug, Error)]
pub enum TrieError {
    /// An invariant expected by the trie walker does not hold: a parent
    /// without its child, a missing root blob, a value the setup does not
    /// match. The backing store is corrupted; the state must be discarded.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    /// `new_node` was asked to create a node over an existing trie key.
    #[error("node already exists at trie key 0x{}", hex::encode(.0))]
    DuplicateNodeCreation(Vec<u8>),

    /// A node's path fragment exceeds the one-byte length prefix.
    #[error("path fragment of {0} bytes does not fit the node encoding")]
    FragmentTooLong(usize),

    /// A scalar or curve point inside a node failed canonical deserialization.
    #[error("malformed node encoding: {0}")]
    InvalidEncoding(#[from] ark_serialize::SerializationError),

    /// A node encoding ended prematurely.
    #[error("truncated node encoding")]
    TruncatedNode,
}

/// Error type for proof verification and decoding.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The pairing check failed for the element at this path position.
    #[error("proof invalid at path position {index}")]
    Invalid { index: usize },

    /// A proof must open at least the root node.
    #[error("empty proof path")]
    EmptyPath,

    /// A scalar or curve point inside a proof failed canonical
    /// deserialization. Malformed adversarial bytes surface here, never as a
    /// panic in the pairing check.
    #[error("malformed proof encoding: {0}")]
    InvalidEncoding(#[from] ark_serialize::SerializationError),

    /// A proof encoding ended prematurely.
    #[error("truncated proof encoding")]
    Truncated,
}
