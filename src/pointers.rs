//! Per-term statistics and chain roots
//!
//! One record per termid: document frequency, collection frequency, head and
//! tail chain pointers, and the `(tf, doc_len)` pair whose BM25 tf component
//! was largest. Globals: per-docid lengths, total documents, total length.
//! Records grow in bulk (doubling) as termids and docids appear.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::IndexError;
use crate::pointer::SegmentPointer;

const POINTERS_MAGIC: &[u8; 4] = b"FCPT";
const POINTERS_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default)]
struct TermRecord {
    df: u32,
    cf: u64,
    head: u64,
    tail: u64,
    max_tf: u32,
    max_tf_doc_len: u32,
}

impl TermRecord {
    fn empty() -> Self {
        Self {
            head: crate::pointer::UNDEFINED_PACKED,
            tail: crate::pointer::UNDEFINED_PACKED,
            ..Default::default()
        }
    }
}

pub struct PointersTable {
    terms: Vec<TermRecord>,
    doc_len: Vec<u32>,
    total_docs: u32,
    total_doc_len: u64,
}

impl Default for PointersTable {
    fn default() -> Self {
        Self::with_capacity(4096, 4096)
    }
}

impl PointersTable {
    pub fn with_capacity(vocab: usize, docs: usize) -> Self {
        Self {
            terms: Vec::with_capacity(vocab),
            doc_len: Vec::with_capacity(docs),
            total_docs: 0,
            total_doc_len: 0,
        }
    }

    fn term(&self, id: u32) -> Option<&TermRecord> {
        self.terms.get(id as usize)
    }

    fn term_mut(&mut self, id: u32) -> &mut TermRecord {
        let idx = id as usize;
        if idx >= self.terms.len() {
            self.terms.resize(idx + 1, TermRecord::empty());
        }
        &mut self.terms[idx]
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn df(&self, id: u32) -> u32 {
        self.term(id).map_or(0, |t| t.df)
    }

    pub fn incr_df(&mut self, id: u32) {
        self.term_mut(id).df += 1;
    }

    pub fn cf(&self, id: u32) -> u64 {
        self.term(id).map_or(0, |t| t.cf)
    }

    pub fn incr_cf(&mut self, id: u32) {
        self.term_mut(id).cf += 1;
    }

    pub fn head_pointer(&self, id: u32) -> Option<SegmentPointer> {
        self.term(id)
            .and_then(|t| SegmentPointer::unpack(t.head))
    }

    pub fn set_head_pointer(&mut self, id: u32, p: SegmentPointer) {
        self.term_mut(id).head = p.pack();
    }

    pub fn tail_pointer(&self, id: u32) -> Option<SegmentPointer> {
        self.term(id)
            .and_then(|t| SegmentPointer::unpack(t.tail))
    }

    pub fn set_tail_pointer(&mut self, id: u32, p: SegmentPointer) {
        self.term_mut(id).tail = p.pack();
    }

    pub fn max_tf(&self, id: u32) -> u32 {
        self.term(id).map_or(0, |t| t.max_tf)
    }

    pub fn max_tf_doc_len(&self, id: u32) -> u32 {
        self.term(id).map_or(0, |t| t.max_tf_doc_len)
    }

    /// Store the `(tf, doc_len)` pair observed when the BM25 tf component
    /// was maximal for this term
    pub fn set_max_tf(&mut self, id: u32, tf: u32, doc_len: u32) {
        let t = self.term_mut(id);
        t.max_tf = tf;
        t.max_tf_doc_len = doc_len;
    }

    pub fn doc_len(&self, docid: u32) -> u32 {
        self.doc_len.get(docid as usize).copied().unwrap_or(0)
    }

    pub fn set_doc_len(&mut self, docid: u32, len: u32) {
        let idx = docid as usize;
        if idx >= self.doc_len.len() {
            self.doc_len.resize(idx + 1, 0);
        }
        self.doc_len[idx] = len;
    }

    pub fn add_document(&mut self, doc_len: u32) {
        self.total_docs += 1;
        self.total_doc_len += doc_len as u64;
    }

    pub fn total_docs(&self) -> u32 {
        self.total_docs
    }

    pub fn total_doc_len(&self) -> u64 {
        self.total_doc_len
    }

    pub fn avg_doc_len(&self) -> f32 {
        if self.total_docs == 0 {
            1.0
        } else {
            self.total_doc_len as f32 / self.total_docs as f32
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        writer.write_all(POINTERS_MAGIC)?;
        writer.write_u32::<LittleEndian>(POINTERS_VERSION)?;
        writer.write_u32::<LittleEndian>(self.total_docs)?;
        writer.write_u64::<LittleEndian>(self.total_doc_len)?;

        writer.write_u32::<LittleEndian>(self.terms.len() as u32)?;
        for t in &self.terms {
            writer.write_u32::<LittleEndian>(t.df)?;
            writer.write_u64::<LittleEndian>(t.cf)?;
            writer.write_u64::<LittleEndian>(t.head)?;
            writer.write_u64::<LittleEndian>(t.tail)?;
            writer.write_u32::<LittleEndian>(t.max_tf)?;
            writer.write_u32::<LittleEndian>(t.max_tf_doc_len)?;
        }

        writer.write_u32::<LittleEndian>(self.doc_len.len() as u32)?;
        for &len in &self.doc_len {
            writer.write_u32::<LittleEndian>(len)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, IndexError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != POINTERS_MAGIC {
            return Err(IndexError::Corrupted("bad pointers file magic".into()));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != POINTERS_VERSION {
            return Err(IndexError::Corrupted(format!(
                "unsupported pointers version {version}"
            )));
        }

        let total_docs = reader.read_u32::<LittleEndian>()?;
        let total_doc_len = reader.read_u64::<LittleEndian>()?;

        let num_terms = reader.read_u32::<LittleEndian>()? as usize;
        let mut terms = Vec::with_capacity(num_terms);
        for _ in 0..num_terms {
            terms.push(TermRecord {
                df: reader.read_u32::<LittleEndian>()?,
                cf: reader.read_u64::<LittleEndian>()?,
                head: reader.read_u64::<LittleEndian>()?,
                tail: reader.read_u64::<LittleEndian>()?,
                max_tf: reader.read_u32::<LittleEndian>()?,
                max_tf_doc_len: reader.read_u32::<LittleEndian>()?,
            });
        }

        let num_docs = reader.read_u32::<LittleEndian>()? as usize;
        let mut doc_len = Vec::with_capacity(num_docs);
        for _ in 0..num_docs {
            doc_len.push(reader.read_u32::<LittleEndian>()?);
        }

        Ok(Self {
            terms,
            doc_len,
            total_docs,
            total_doc_len,
        })
    }
}
