//! Bidirectional term / termid map
//!
//! Termids are dense and assigned in first-occurrence order, so the reverse
//! index is just a vector. Persisted as a flat `(term, id)` table.

use std::io::{Read, Write};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

const DICT_MAGIC: &[u8; 4] = b"FCDT";
const DICT_VERSION: u32 = 1;

/// Flat on-disk form: `(term, id)` pairs
#[derive(Serialize, Deserialize)]
struct DictTable {
    entries: Vec<(String, u32)>,
}

#[derive(Default)]
pub struct Dictionary {
    ids: FxHashMap<String, u32>,
    terms: Vec<String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Existing id for `term`, or the next dense id after insertion
    pub fn id_or_insert(&mut self, term: &str) -> u32 {
        if let Some(&id) = self.ids.get(term) {
            return id;
        }
        let id = self.terms.len() as u32;
        self.ids.insert(term.to_string(), id);
        self.terms.push(term.to_string());
        id
    }

    pub fn term_id(&self, term: &str) -> Option<u32> {
        self.ids.get(term).copied()
    }

    pub fn term(&self, id: u32) -> Option<&str> {
        self.terms.get(id as usize).map(|s| s.as_str())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        writer.write_all(DICT_MAGIC)?;
        writer.write_all(&DICT_VERSION.to_le_bytes())?;
        let table = DictTable {
            entries: self
                .terms
                .iter()
                .enumerate()
                .map(|(id, term)| (term.clone(), id as u32))
                .collect(),
        };
        bincode::serialize_into(writer, &table)
            .map_err(|e| IndexError::Serialization(e.to_string()))
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, IndexError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != DICT_MAGIC {
            return Err(IndexError::Corrupted("bad dictionary magic".into()));
        }
        let mut version = [0u8; 4];
        reader.read_exact(&mut version)?;
        if u32::from_le_bytes(version) != DICT_VERSION {
            return Err(IndexError::Corrupted("unsupported dictionary version".into()));
        }

        let table: DictTable = bincode::deserialize_from(reader)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        let mut dict = Dictionary::new();
        dict.terms = vec![String::new(); table.entries.len()];
        for (term, id) in table.entries {
            if id as usize >= dict.terms.len() {
                return Err(IndexError::Corrupted(format!(
                    "dictionary id {id} out of range"
                )));
            }
            dict.terms[id as usize] = term.clone();
            dict.ids.insert(term, id);
        }
        Ok(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_assignment() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.id_or_insert("alpha"), 0);
        assert_eq!(dict.id_or_insert("beta"), 1);
        assert_eq!(dict.id_or_insert("alpha"), 0);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.term_id("beta"), Some(1));
        assert_eq!(dict.term_id("gamma"), None);
        assert_eq!(dict.term(1), Some("beta"));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let mut dict = Dictionary::new();
        for term in ["one", "two", "three"] {
            dict.id_or_insert(term);
        }
        let mut buf = Vec::new();
        dict.write_to(&mut buf).unwrap();

        let loaded = Dictionary::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.term_id("two"), Some(1));
        assert_eq!(loaded.term(2), Some("three"));
    }
}
