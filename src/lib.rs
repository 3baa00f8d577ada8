#![doc = include_str!("../README.md")]

pub mod constant;
pub mod hasher;
pub mod kv;
pub use kv::{KvStore, Partition};
pub mod kzg;
pub use kzg::{KzgError, TrustedSetup};
pub mod mem_store;
pub use mem_store::MemStore;
pub mod trie;
pub use trie::{verify_proof, Proof, ProofError, State, TrieError};

#[cfg(test)]
pub(crate) mod testing {
    use crate::{constant::DOMAIN_SIZE, kzg::TrustedSetup};
    use once_cell::sync::Lazy;
    use std::sync::Arc;

    /// The public test setup: natural domain, D = 257, seeded by a fixed
    /// ASCII string. Generation is expensive, so every test module shares
    /// this instance.
    static TEST_SETUP: Lazy<Arc<TrustedSetup>> = Lazy::new(|| {
        Arc::new(
            TrustedSetup::from_seed(DOMAIN_SIZE as u16, b"abrakadabara")
                .expect("test setup generation cannot fail"),
        )
    });

    pub(crate) fn test_setup() -> &'static Arc<TrustedSetup> {
        &TEST_SETUP
    }
}
