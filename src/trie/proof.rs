//! Proof assembly and verification.
//!
//! A proof carries one KZG opening per visited node: every inner element
//! opens a node's vector at the child index leading to the next element's
//! commitment, and the tail opens either to the value scalar (presence) or to
//! the zero scalar (absence). The verifier checks the chain only; anchoring
//! the first commitment to a trusted root is the verifier's responsibility.
use ark_bn254::{Fr, G1Projective};
use ark_ff::Zero;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::{
    constant::{G1_BYTES, NUM_CHILDREN, TERMINAL_INDEX},
    hasher::{point_scalar, value_scalar},
    kv::KvStore,
    kzg::TrustedSetup,
    trie::{Node, ProofError, State, TrieError},
};

/// One opening along the proof path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofElement {
    /// Commitment of the node this element opens.
    pub c: G1Projective,
    /// Opened vector index: a child byte, or 256 for the terminal slot.
    pub index: u16,
    /// The KZG opening of the node's vector at `index`.
    pub proof: G1Projective,
}

/// A proof of presence (`value` is set) or absence (`value` is `None`) of a
/// key in the state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    /// The key being proven.
    pub key: Vec<u8>,
    /// The bound value; `None` makes this a proof of absence.
    pub value: Option<Vec<u8>>,
    /// Openings from the root node downwards.
    pub path: Vec<ProofElement>,
}

impl Proof {
    /// Whether this proves the absence of the key.
    pub fn is_absence_proof(&self) -> bool {
        self.value.is_none()
    }

    /// Number of openings in the path.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// Whether the path is empty. An honest proof never is.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// The commitment the proof claims as the root. The verifier must match
    /// it against the root commitment it trusts independently.
    pub fn root_commitment(&self) -> Option<&G1Projective> {
        self.path.first().map(|e| &e.c)
    }

    /// Serializes the proof: the key and optional value envelope followed by
    /// the `{C, index, proof}` triples.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            7 + self.key.len()
                + self.value.as_ref().map_or(0, Vec::len)
                + self.path.len() * (2 * G1_BYTES + 2),
        );
        out.extend_from_slice(&(self.key.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.key);
        match &self.value {
            Some(value) => {
                out.push(1);
                out.extend_from_slice(&(value.len() as u32).to_le_bytes());
                out.extend_from_slice(value);
            }
            None => out.push(0),
        }
        out.extend_from_slice(&(self.path.len() as u16).to_le_bytes());
        for element in &self.path {
            element
                .c
                .serialize_compressed(&mut out)
                .expect("serialization into a Vec cannot fail");
            out.extend_from_slice(&element.index.to_le_bytes());
            element
                .proof
                .serialize_compressed(&mut out)
                .expect("serialization into a Vec cannot fail");
        }
        out
    }

    /// Deserializes a proof, validating every embedded point. Adversarial
    /// bytes fail here with a typed error; they never reach the pairing
    /// check.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProofError> {
        let mut reader = Reader(data);
        let key_len = u16::from_le_bytes(reader.take(2)?.try_into().unwrap()) as usize;
        let key = reader.take(key_len)?.to_vec();
        let value = match reader.take(1)?[0] {
            0 => None,
            _ => {
                let value_len =
                    u32::from_le_bytes(reader.take(4)?.try_into().unwrap()) as usize;
                Some(reader.take(value_len)?.to_vec())
            }
        };
        let count = u16::from_le_bytes(reader.take(2)?.try_into().unwrap()) as usize;
        let mut path = Vec::with_capacity(count);
        for _ in 0..count {
            let c = G1Projective::deserialize_compressed(reader.take(G1_BYTES)?)?;
            let index = u16::from_le_bytes(reader.take(2)?.try_into().unwrap());
            let proof = G1Projective::deserialize_compressed(reader.take(G1_BYTES)?)?;
            path.push(ProofElement { c, index, proof });
        }
        Ok(Self { key, value, path })
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ProofError> {
        if self.0.len() < n {
            return Err(ProofError::Truncated);
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }
}

impl<S: KvStore> State<S> {
    /// Assembles the proof for `key` against the last flushed root.
    ///
    /// If the key is bound, the proof carries its value and the tail opens to
    /// the value scalar. Otherwise `value` stays `None` and the tail opens to
    /// zero, making it a proof of absence.
    pub fn prove(&self, key: &[u8]) -> Result<Proof, TrieError> {
        let value = self.stored_value(key);
        let mut path = Vec::new();
        let root_commitment = self.root_commitment()?;
        self.prove_path(key, 0, root_commitment, &mut path)?;
        Ok(Proof {
            key: key.to_vec(),
            value,
            path,
        })
    }

    fn prove_path(
        &self,
        path: &[u8],
        pos: usize,
        commitment: G1Projective,
        elements: &mut Vec<ProofElement>,
    ) -> Result<(), TrieError> {
        let node = self.peek_node(&path[..pos])?.ok_or_else(|| {
            TrieError::InconsistentState(format!(
                "no node at trie key 0x{} on the proof path",
                hex::encode(&path[..pos])
            ))
        })?;

        let remaining = &path[pos..];
        let matched = node
            .path_fragment
            .iter()
            .zip(remaining)
            .take_while(|(a, b)| a == b)
            .count();
        if matched < node.path_fragment.len() {
            // The key ends inside this node's fragment or diverges from it:
            // it is absent. Close the chain with a zero opening in this
            // subtree, preferring the slot the key itself selects.
            let preferred = if matched == remaining.len() {
                TERMINAL_INDEX
            } else {
                remaining[matched] as usize
            };
            return self.close_absence(path[..pos].to_vec(), node, commitment, preferred, elements);
        }

        let next_pos = pos + node.path_fragment.len();
        let child_index = if next_pos == path.len() {
            TERMINAL_INDEX
        } else {
            path[next_pos] as usize
        };

        elements.push(ProofElement {
            c: commitment,
            index: child_index as u16,
            proof: node.open_at(&self.ts, child_index),
        });

        let absent = if child_index < TERMINAL_INDEX {
            !node.children.contains_key(&(child_index as u8))
        } else {
            node.terminal.is_none()
        };
        if absent {
            // The opening above is to the zero scalar.
            return Ok(());
        }

        if next_pos < path.len() {
            let child_commitment = node.children[&(child_index as u8)];
            self.prove_path(path, next_pos + 1, child_commitment, elements)
        } else {
            Ok(())
        }
    }

    /// Ends an absence proof with an opening to the zero scalar.
    ///
    /// Opens the preferred slot when it is empty, any other empty slot
    /// otherwise. A node with all 257 slots occupied (possible only with 256
    /// distinct extensions plus a terminal) descends into a child and closes
    /// there; the walk terminates because the trie is finite.
    fn close_absence(
        &self,
        mut node_key: Vec<u8>,
        mut node: Node,
        mut commitment: G1Projective,
        preferred: usize,
        elements: &mut Vec<ProofElement>,
    ) -> Result<(), TrieError> {
        loop {
            let preferred_empty = if preferred == TERMINAL_INDEX {
                node.terminal.is_none()
            } else {
                !node.children.contains_key(&(preferred as u8))
            };
            let empty_slot = if preferred_empty {
                Some(preferred)
            } else if node.terminal.is_none() {
                Some(TERMINAL_INDEX)
            } else {
                (0..NUM_CHILDREN).find(|&i| !node.children.contains_key(&(i as u8)))
            };

            if let Some(index) = empty_slot {
                elements.push(ProofElement {
                    c: commitment,
                    index: index as u16,
                    proof: node.open_at(&self.ts, index),
                });
                return Ok(());
            }

            // Fully occupied: descend.
            let (&child_index, &child_commitment) = node
                .children
                .iter()
                .next()
                .expect("a node with 257 occupied slots has children");
            elements.push(ProofElement {
                c: commitment,
                index: child_index as u16,
                proof: node.open_at(&self.ts, child_index as usize),
            });
            node_key.extend_from_slice(&node.path_fragment);
            node_key.push(child_index);
            node = self.peek_node(&node_key)?.ok_or_else(|| {
                TrieError::InconsistentState(format!(
                    "child slot {child_index} of trie key 0x{} has no node",
                    hex::encode(&node_key[..node_key.len() - 1])
                ))
            })?;
            commitment = child_commitment;
        }
    }
}

/// Verifies a proof against the trusted setup.
///
/// Every element must open its commitment at its index to the hash of the
/// next element's commitment; the tail opens to the value scalar, or to zero
/// for a proof of absence. The first element's commitment must separately be
/// matched against a root commitment the verifier trusts.
pub fn verify_proof(ts: &TrustedSetup, proof: &Proof) -> Result<(), ProofError> {
    if proof.path.is_empty() {
        return Err(ProofError::EmptyPath);
    }
    let last = proof.path.len() - 1;
    for (i, element) in proof.path.iter().enumerate() {
        let opened_value = if i == last {
            proof
                .value
                .as_deref()
                .map(value_scalar)
                .unwrap_or_else(Fr::zero)
        } else {
            point_scalar(Some(&proof.path[i + 1].c))
        };
        if !ts.verify(&element.c, &element.proof, opened_value, element.index as usize) {
            return Err(ProofError::Invalid { index: i });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mem_store::MemStore, testing::test_setup};
    use ark_ec::Group;
    use std::sync::Arc;

    fn state_with(pairs: &[(&[u8], &[u8])]) -> State<MemStore> {
        let mut state = State::new(Arc::clone(test_setup()), MemStore::new()).unwrap();
        for (k, v) in pairs {
            state.update(k, v).unwrap();
        }
        state.flush_caches().unwrap();
        state
    }

    #[test]
    fn presence_proof_verifies() {
        let state = state_with(&[(b"a", b"b")]);
        let proof = state.prove(b"a").unwrap();
        assert!(!proof.is_absence_proof());
        assert_eq!(proof.value, Some(b"b".to_vec()));
        assert!(proof.len() >= 2);
        assert_eq!(
            proof.root_commitment(),
            Some(&state.root_commitment().unwrap())
        );
        verify_proof(test_setup(), &proof).unwrap();
    }

    #[test]
    fn absence_at_an_empty_child_slot() {
        let state = state_with(&[(b"a", b"b"), (b"ab", b"bc")]);
        let proof = state.prove(b"ax").unwrap();
        assert!(proof.is_absence_proof());
        verify_proof(test_setup(), &proof).unwrap();
    }

    /// A key extending an inserted key past its terminal node.
    #[test]
    fn absence_of_an_extension_key() {
        let state = state_with(&[(b"a", b"b")]);
        let proof = state.prove(b"abc").unwrap();
        assert!(proof.is_absence_proof());
        verify_proof(test_setup(), &proof).unwrap();
    }

    /// A key that is a strict prefix of an inserted key ends inside a path
    /// fragment; the proof must still close with a verifying zero opening.
    #[test]
    fn absence_of_a_prefix_key() {
        let state = state_with(&[(b"ab", b"bc")]);
        let proof = state.prove(b"a").unwrap();
        assert!(proof.is_absence_proof());
        verify_proof(test_setup(), &proof).unwrap();
    }

    /// A key diverging in the middle of a fragment.
    #[test]
    fn absence_of_a_mid_fragment_divergence() {
        let state = state_with(&[(b"abcdef", b"x")]);
        for key in [&b"abcq"[..], b"abcdez", b"abcde"] {
            let proof = state.prove(key).unwrap();
            assert!(proof.is_absence_proof(), "{key:?}");
            verify_proof(test_setup(), &proof).unwrap();
        }
    }

    #[test]
    fn tampered_opening_is_reported_at_its_index() {
        let state = state_with(&[(b"a", b"b"), (b"ab", b"bc")]);
        let proof = state.prove(b"ab").unwrap();
        verify_proof(test_setup(), &proof).unwrap();

        for k in 0..proof.len() {
            let mut tampered = proof.clone();
            tampered.path[k].proof += G1Projective::generator();
            assert!(
                matches!(
                    verify_proof(test_setup(), &tampered),
                    Err(ProofError::Invalid { index }) if index == k
                ),
                "tamper at {k} not reported"
            );
        }
    }

    /// Replacing a commitment along the path breaks the chain at or before
    /// that level.
    #[test]
    fn tampered_commitment_is_rejected() {
        let state = state_with(&[(b"a", b"b"), (b"ab", b"bc")]);
        let proof = state.prove(b"ab").unwrap();
        for k in 0..proof.len() {
            let mut tampered = proof.clone();
            tampered.path[k].c += G1Projective::generator();
            let result = verify_proof(test_setup(), &tampered);
            assert!(
                matches!(result, Err(ProofError::Invalid { index }) if index <= k),
                "tampered commitment at {k} accepted"
            );
        }
    }

    #[test]
    fn swapped_value_is_rejected() {
        let state = state_with(&[(b"a", b"b")]);
        let mut proof = state.prove(b"a").unwrap();
        proof.value = Some(b"not b".to_vec());
        assert!(matches!(
            verify_proof(test_setup(), &proof),
            Err(ProofError::Invalid { .. })
        ));
    }

    #[test]
    fn empty_path_is_rejected() {
        let proof = Proof {
            key: vec![],
            value: None,
            path: vec![],
        };
        assert!(matches!(
            verify_proof(test_setup(), &proof),
            Err(ProofError::EmptyPath)
        ));
    }

    #[test]
    fn wire_round_trip() {
        let state = state_with(&[(b"a", b"b"), (b"ab", b"bc")]);
        for key in [&b"ab"[..], b"zz"] {
            let proof = state.prove(key).unwrap();
            let restored = Proof::from_bytes(&proof.to_bytes()).unwrap();
            assert_eq!(proof, restored);
            verify_proof(test_setup(), &restored).unwrap();
        }
    }

    /// A single flipped bit in the encoding either fails to decode or fails
    /// verification; it never verifies and never panics.
    #[test]
    fn wire_bit_flip_never_verifies() {
        let state = state_with(&[(b"a", b"b"), (b"ab", b"bc")]);
        let proof = state.prove(b"ab").unwrap();
        let bytes = proof.to_bytes();
        // Flip one bit inside the first opening point of the path section.
        let offset = 2 + proof.key.len() + 1 + 4 + proof.value.as_ref().unwrap().len() + 2
            + G1_BYTES
            + 2;
        let mut corrupt = bytes.clone();
        corrupt[offset] ^= 0x01;
        match Proof::from_bytes(&corrupt) {
            Err(_) => {}
            Ok(decoded) => {
                assert!(verify_proof(test_setup(), &decoded).is_err());
            }
        }
    }

    #[test]
    fn truncated_wire_is_rejected() {
        let state = state_with(&[(b"a", b"b")]);
        let bytes = state.prove(b"a").unwrap().to_bytes();
        for cut in [0, 1, 5, bytes.len() - 1] {
            assert!(Proof::from_bytes(&bytes[..cut]).is_err());
        }
    }
}
