//! Trie state: node storage, write-back caches, incremental updates.
use ark_bn254::{Fr, G1Projective};
use ark_ff::Zero;
use ark_serialize::CanonicalDeserialize;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

use crate::{
    constant::{PREFIX_ROOT, PREFIX_TRIE, PREFIX_VALUES, TERMINAL_INDEX},
    hasher::{point_bytes, point_scalar, value_scalar},
    kv::{KvStore, Partition},
    kzg::TrustedSetup,
    trie::{verify_proof, Node, TrieError},
};

/// The authenticated key-value state: a backing store plus the trie over it.
///
/// Three prefix partitions share one store: raw values by user key, serialized
/// nodes by trie path, and the root commitment blob at the empty key. All
/// mutations of one batch land in the caches; [`State::flush_caches`] writes
/// them through. A `State` is a single-writer object; readers of a store
/// snapshot taken after a flush are unaffected by later batches.
pub struct State<S: KvStore> {
    pub(crate) ts: Arc<TrustedSetup>,
    store: S,
    /// Working copy of the root commitment, kept current across a batch. The
    /// persistent blob is rewritten on flush.
    root_commitment_cache: G1Projective,
    value_cache: FxHashMap<Vec<u8>, Vec<u8>>,
    node_cache: FxHashMap<Vec<u8>, Node>,
}

impl<S: KvStore> State<S> {
    /// Initializes a fresh state over an empty store.
    ///
    /// The empty trie key receives the root node; the serialized trusted
    /// setup becomes the value of the empty user key and its hash the root's
    /// terminal value, so an empty state already binds the setup it was built
    /// with. Flushes and self-checks before returning.
    pub fn new(ts: Arc<TrustedSetup>, store: S) -> Result<Self, TrieError> {
        let mut state = Self {
            ts,
            store,
            root_commitment_cache: G1Projective::zero(),
            value_cache: FxHashMap::default(),
            node_cache: FxHashMap::default(),
        };
        state.node_store().set(b"", &Node::default().to_bytes()?);

        let setup_bytes = state.ts.to_bytes();
        state.update(b"", &setup_bytes)?;
        state.flush_caches()?;

        let ts = Arc::clone(&state.ts);
        state.check(&ts)?;
        Ok(state)
    }

    /// Reattaches to a store that a previous `State` flushed.
    ///
    /// The root blob must exist and the stored setup must match `ts`; both
    /// are fatal inconsistencies otherwise.
    pub fn open(ts: Arc<TrustedSetup>, store: S) -> Result<Self, TrieError> {
        let mut state = Self {
            ts,
            store,
            root_commitment_cache: G1Projective::zero(),
            value_cache: FxHashMap::default(),
            node_cache: FxHashMap::default(),
        };
        state.root_commitment_cache = state.root_commitment()?;
        let ts = Arc::clone(&state.ts);
        state.check(&ts)?;
        Ok(state)
    }

    /// The trusted setup this state commits against.
    pub fn trusted_setup(&self) -> &Arc<TrustedSetup> {
        &self.ts
    }

    /// Consumes the state, returning the backing store.
    pub fn into_store(self) -> S {
        self.store
    }

    fn value_store(&self) -> Partition<'_, S> {
        self.store.partition([PREFIX_VALUES])
    }

    fn node_store(&self) -> Partition<'_, S> {
        self.store.partition([PREFIX_TRIE])
    }

    fn root_store(&self) -> Partition<'_, S> {
        self.store.partition([PREFIX_ROOT])
    }

    /// Binds `value` to `key` and propagates commitment deltas up to the root.
    ///
    /// The value lands in the value cache; the trie walk splits path
    /// fragments where necessary and adjusts every touched node's commitment
    /// incrementally. Nothing reaches the store before
    /// [`State::flush_caches`].
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        self.value_cache.insert(key.to_vec(), value.to_vec());
        let value_commitment = value_scalar(value);
        let mut root_slot = Some(self.root_commitment_cache);
        self.update_key(key, 0, &mut root_slot, value_commitment)?;
        self.root_commitment_cache =
            root_slot.expect("the root slot is never cleared by an update");
        Ok(())
    }

    /// Recursive step of [`State::update`] at the node for `path[..pos]`.
    ///
    /// `update_commitment` is the slot in the parent holding this subtree's
    /// commitment (the root working copy at the top); each case either
    /// applies an additive delta to it or rewrites it with a freshly
    /// committed vector after a split.
    fn update_key(
        &mut self,
        path: &[u8],
        pos: usize,
        update_commitment: &mut Option<G1Projective>,
        value_commitment: Fr,
    ) -> Result<(), TrieError> {
        let key = &path[..pos];

        let Some(mut node) = self.get_node(key)? else {
            // No node on this path yet: the rest of the path becomes the
            // fragment and the value its terminal.
            let mut node = Node {
                path_fragment: path[pos..].to_vec(),
                ..Node::default()
            };
            update_terminal(&self.ts, &mut node, update_commitment, Some(value_commitment));
            return self.new_node(key.to_vec(), node);
        };

        let prefix_len = common_prefix_len(&node.path_fragment, &path[pos..]);
        let next_pos = pos + prefix_len;

        if prefix_len == node.path_fragment.len() {
            // The fragment is consumed; either we land on this node or we
            // descend through a child slot.
            if next_pos == path.len() {
                update_terminal(&self.ts, &mut node, update_commitment, Some(value_commitment));
                self.store_node(key.to_vec(), node);
            } else {
                let child_index = path[next_pos];
                let old = node.children.get(&child_index).copied();
                let mut slot = old;
                self.update_key(path, next_pos + 1, &mut slot, value_commitment)?;
                if let Some(updated) = slot {
                    node.children.insert(child_index, updated);
                }
                self.store_node(key.to_vec(), node);
                update_child_slot(
                    &self.ts,
                    update_commitment,
                    child_index,
                    old.as_ref(),
                    slot.as_ref(),
                );
            }
            return Ok(());
        }

        // The fragment splits. The continue-node inherits this node's
        // fragment suffix, children and terminal value; this node keeps the
        // common prefix and starts over with two slots at most.
        let mut key_continue = path[..next_pos].to_vec();
        key_continue.push(node.path_fragment[prefix_len]);

        let node_continue = Node {
            path_fragment: node.path_fragment[prefix_len + 1..].to_vec(),
            children: std::mem::take(&mut node.children),
            terminal: node.terminal.take(),
        };
        let child_index_continue = key_continue[key_continue.len() - 1];
        node.path_fragment = path[pos..next_pos].to_vec();

        // The commitment this node carried so far is exactly the commitment
        // of the subtree now rooted at the continue-node.
        let previous = (*update_commitment).ok_or_else(|| {
            TrieError::InconsistentState(format!(
                "split at trie key 0x{} without a prior commitment",
                hex::encode(key)
            ))
        })?;
        node.children.insert(child_index_continue, previous);
        self.new_node(key_continue, node_continue)?;

        if next_pos == path.len() {
            // The new key ends at the split point.
            node.terminal = Some(value_commitment);
        } else {
            let key_fork = path[..next_pos + 1].to_vec();
            let node_fork = Node {
                path_fragment: path[next_pos + 1..].to_vec(),
                children: BTreeMap::new(),
                terminal: Some(value_commitment),
            };
            let child_fork_index = key_fork[key_fork.len() - 1];
            node.children
                .insert(child_fork_index, node_fork.commit(&self.ts));
            self.new_node(key_fork, node_fork)?;
        }

        *update_commitment = Some(node.commit(&self.ts));
        self.store_node(key.to_vec(), node);
        Ok(())
    }

    /// Returns the value bound to `key`, cache first.
    pub fn get_value(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(value) = self.value_cache.get(key) {
            return Some(value.clone());
        }
        self.value_store().get(key)
    }

    /// Reads the value from the flushed store only, bypassing the cache.
    pub(crate) fn stored_value(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.value_store().get(key)
    }

    /// Loads the node at a trie key, populating the node cache.
    fn get_node(&mut self, key: &[u8]) -> Result<Option<Node>, TrieError> {
        if let Some(node) = self.node_cache.get(key) {
            return Ok(Some(node.clone()));
        }
        let Some(bytes) = self.node_store().get(key) else {
            return Ok(None);
        };
        let node = Node::from_bytes(&bytes)?;
        self.node_cache.insert(key.to_vec(), node.clone());
        Ok(Some(node))
    }

    /// Reads a node without touching the cache contents: cache hit if
    /// present, store fallback otherwise.
    pub(crate) fn peek_node(&self, key: &[u8]) -> Result<Option<Node>, TrieError> {
        if let Some(node) = self.node_cache.get(key) {
            return Ok(Some(node.clone()));
        }
        match self.node_store().get(key) {
            Some(bytes) => Ok(Some(Node::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Registers a node under a trie key that must not be taken yet.
    fn new_node(&mut self, key: Vec<u8>, node: Node) -> Result<(), TrieError> {
        if self.get_node(&key)?.is_some() {
            return Err(TrieError::DuplicateNodeCreation(key));
        }
        self.node_cache.insert(key, node);
        Ok(())
    }

    fn store_node(&mut self, key: Vec<u8>, node: Node) {
        self.node_cache.insert(key, node);
    }

    /// Writes every dirty value and node through to the store and rewrites
    /// the root commitment blob, then clears the caches.
    pub fn flush_caches(&mut self) -> Result<(), TrieError> {
        let values = self.store.partition([PREFIX_VALUES]);
        for (key, value) in &self.value_cache {
            values.set(key, value);
        }
        let nodes = self.store.partition([PREFIX_TRIE]);
        for (key, node) in &self.node_cache {
            nodes.set(key, &node.to_bytes()?);
        }
        let root = self.store.partition([PREFIX_ROOT]);
        root.set(b"", &point_bytes(&self.root_commitment_cache));

        debug!(
            values = self.value_cache.len(),
            nodes = self.node_cache.len(),
            "flushed caches"
        );
        self.value_cache.clear();
        self.node_cache.clear();
        Ok(())
    }

    /// The root commitment of the last flushed batch.
    pub fn root_commitment(&self) -> Result<G1Projective, TrieError> {
        let blob = self.root_store().get(b"").ok_or_else(|| {
            TrieError::InconsistentState("missing root commitment blob".into())
        })?;
        Ok(G1Projective::deserialize_compressed(&blob[..])?)
    }

    /// Consistency self-check against a trusted setup.
    ///
    /// The empty user key must hold the serialized setup (both the provided
    /// one and the state's own), and its proof must verify against the root.
    pub fn check(&self, ts: &TrustedSetup) -> Result<(), TrieError> {
        let value = self.get_value(b"").ok_or_else(|| {
            TrieError::InconsistentState("no value stored at the empty key".into())
        })?;
        if value != ts.to_bytes() {
            return Err(TrieError::InconsistentState(
                "stored setup differs from the provided one".into(),
            ));
        }
        if value != self.ts.to_bytes() {
            return Err(TrieError::InconsistentState(
                "stored setup differs from the state's own".into(),
            ));
        }
        let proof = self.prove(b"")?;
        verify_proof(ts, &proof).map_err(|e| {
            TrieError::InconsistentState(format!("empty-key proof rejected: {e}"))
        })?;
        Ok(())
    }

    /// Human-readable dump of the flushed trie, for diagnostics.
    pub fn trie_string(&self) -> Result<String, TrieError> {
        let mut out = String::new();
        let root = self.root_commitment()?;
        writeln!(out, "root commitment: 0x{}", hex::encode(point_bytes(&root)))
            .expect("writing to a String cannot fail");
        let nodes = self.node_store();
        for key in nodes.keys() {
            let bytes = nodes.get(&key).ok_or_else(|| {
                TrieError::InconsistentState("trie key vanished during iteration".into())
            })?;
            let node = Node::from_bytes(&bytes)?;
            writeln!(out, "'0x{}':\n{node}", hex::encode(&key))
                .expect("writing to a String cannot fail");
        }
        Ok(out)
    }
}

/// Replaces a node's terminal value, pushing `(new - old) * L_256` into the
/// parent slot. A `None` new value models deletion and degrades the slot to
/// the zero scalar; no public API reaches it today.
fn update_terminal(
    ts: &TrustedSetup,
    node: &mut Node,
    slot: &mut Option<G1Projective>,
    new_value: Option<Fr>,
) {
    let delta = match (node.terminal, new_value) {
        (Some(old), Some(new)) => new - old,
        (Some(old), None) => -old,
        (None, Some(new)) => new,
        (None, None) => Fr::zero(),
    };
    node.terminal = new_value;
    let delta_point = G1Projective::from(ts.lagrange_basis[TERMINAL_INDEX]) * delta;
    match slot {
        Some(c) => *c += delta_point,
        None => *slot = Some(delta_point),
    }
}

/// Applies the child-slot delta `(H(new) - H(old)) * L_c` to the parent slot.
fn update_child_slot(
    ts: &TrustedSetup,
    slot: &mut Option<G1Projective>,
    child_index: u8,
    old: Option<&G1Projective>,
    new: Option<&G1Projective>,
) {
    let delta = point_scalar(new) - point_scalar(old);
    let delta_point = G1Projective::from(ts.lagrange_basis[child_index as usize]) * delta;
    match slot {
        Some(c) => *c += delta_point,
        None => *slot = Some(delta_point),
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
