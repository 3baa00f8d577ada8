//! Trie nodes and their vector view.
use ark_bn254::{Fr, G1Projective};
use ark_ff::Zero;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{
    constant::{DOMAIN_SIZE, NUM_CHILDREN, SCALAR_BYTES, TERMINAL_INDEX},
    hasher::point_scalar,
    kzg::TrustedSetup,
    trie::TrieError,
};

const HAS_TERMINAL_FLAG: u8 = 0x01;
const HAS_CHILDREN_FLAG: u8 = 0x02;
/// One presence bit per child slot.
const CHILD_BITMAP_BYTES: usize = NUM_CHILDREN / 8;

/// A node of the 257-ary trie.
///
/// Children hold the commitments of their subtrees by value, not by
/// reference: the storage key of the child at index `c` is
/// `parent_key || path_fragment || c`, so the live trie is a flat map of
/// owned records with no back-edges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Node {
    /// Compressed edge label, shorter than 256 bytes. The concatenation of
    /// all fragments and edge bytes from the root equals the node's trie key.
    pub(crate) path_fragment: Vec<u8>,
    /// Subtree commitments, keyed by child index. Sparse; most nodes have a
    /// handful of children.
    pub(crate) children: BTreeMap<u8, G1Projective>,
    /// Scalar bound at exactly this node's path, if some key ends here.
    pub(crate) terminal: Option<Fr>,
}

impl Node {
    /// The 257-entry scalar vector the node commits to: hash-to-scalar of
    /// each present child commitment, zero elsewhere, the terminal scalar in
    /// the last slot.
    pub fn vector(&self) -> Vec<Fr> {
        let mut v = vec![Fr::zero(); DOMAIN_SIZE];
        for (&index, commitment) in &self.children {
            v[index as usize] = point_scalar(Some(commitment));
        }
        if let Some(t) = self.terminal {
            v[TERMINAL_INDEX] = t;
        }
        v
    }

    /// Full KZG commitment of the node's vector.
    ///
    /// The update path avoids this with incremental deltas; splits need the
    /// real thing. Summed over the occupied slots only, which equals the
    /// dense commitment because empty slots commit the zero scalar.
    pub fn commit(&self, ts: &TrustedSetup) -> G1Projective {
        let mut acc = G1Projective::zero();
        for (&index, commitment) in &self.children {
            acc += G1Projective::from(ts.lagrange_basis[index as usize])
                * point_scalar(Some(commitment));
        }
        if let Some(t) = self.terminal {
            acc += G1Projective::from(ts.lagrange_basis[TERMINAL_INDEX]) * t;
        }
        acc
    }

    /// Opening of the node's vector at `index`.
    pub fn open_at(&self, ts: &TrustedSetup, index: usize) -> G1Projective {
        ts.prove(&self.vector(), index)
    }

    /// Serializes the node: fragment length, fragment, flags, optional
    /// terminal scalar, optional child presence bitmap followed by the
    /// present child commitments in index order.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TrieError> {
        if self.path_fragment.len() >= 256 {
            return Err(TrieError::FragmentTooLong(self.path_fragment.len()));
        }
        let mut out = Vec::with_capacity(
            2 + self.path_fragment.len()
                + SCALAR_BYTES
                + CHILD_BITMAP_BYTES
                + self.children.len() * SCALAR_BYTES,
        );
        out.push(self.path_fragment.len() as u8);
        out.extend_from_slice(&self.path_fragment);

        let mut flags = 0u8;
        if self.terminal.is_some() {
            flags |= HAS_TERMINAL_FLAG;
        }
        if !self.children.is_empty() {
            flags |= HAS_CHILDREN_FLAG;
        }
        out.push(flags);

        if let Some(t) = &self.terminal {
            t.serialize_compressed(&mut out)
                .expect("serialization into a Vec cannot fail");
        }
        if !self.children.is_empty() {
            let mut bitmap = [0u8; CHILD_BITMAP_BYTES];
            for &index in self.children.keys() {
                bitmap[index as usize / 8] |= 1 << (index % 8);
            }
            out.extend_from_slice(&bitmap);
            for commitment in self.children.values() {
                commitment
                    .serialize_compressed(&mut out)
                    .expect("serialization into a Vec cannot fail");
            }
        }
        Ok(out)
    }

    /// Deserializes a node, validating every embedded point.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TrieError> {
        let mut reader = Reader(data);
        let fragment_len = reader.take(1)?[0] as usize;
        let path_fragment = reader.take(fragment_len)?.to_vec();
        let flags = reader.take(1)?[0];

        let terminal = if flags & HAS_TERMINAL_FLAG != 0 {
            Some(Fr::deserialize_compressed(reader.take(SCALAR_BYTES)?)?)
        } else {
            None
        };

        let mut children = BTreeMap::new();
        if flags & HAS_CHILDREN_FLAG != 0 {
            let mut bitmap = [0u8; CHILD_BITMAP_BYTES];
            bitmap.copy_from_slice(reader.take(CHILD_BITMAP_BYTES)?);
            for index in 0..NUM_CHILDREN {
                if bitmap[index / 8] & (1 << (index % 8)) != 0 {
                    let commitment =
                        G1Projective::deserialize_compressed(reader.take(SCALAR_BYTES)?)?;
                    children.insert(index as u8, commitment);
                }
            }
        }

        Ok(Self {
            path_fragment,
            children,
            terminal,
        })
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], TrieError> {
        if self.0.len() < n {
            return Err(TrieError::TruncatedNode);
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  pathFragment: 0x{}", hex::encode(&self.path_fragment))?;
        match &self.terminal {
            Some(t) => writeln!(f, "  terminalValue: {t}")?,
            None => writeln!(f, "  terminalValue: none")?,
        }
        writeln!(f, "  children:")?;
        for (index, commitment) in &self.children {
            writeln!(
                f,
                "    {index}: 0x{}",
                hex::encode(crate::hasher::point_bytes(commitment))
            )?;
        }
        Ok(())
    }
}
