//! Per-document compressed termid streams
//!
//! When enabled, the indexer stores each document's raw termid sequence as
//! `[num_subblocks][sb0_words, sb0...][sb1_words, sb1...]...`, every
//! sub-block non-delta encoded. External feature extractors read them back
//! to recover term positions.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::{self, BLOCK_SIZE, MAX_ENCODED_WORDS};
use crate::error::IndexError;

const VECTORS_MAGIC: &[u8; 4] = b"FCDV";
const VECTORS_VERSION: u32 = 1;

#[derive(Default)]
pub struct DocumentVectors {
    docs: Vec<Option<Box<[u32]>>>,
}

impl DocumentVectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, docid: u32) -> bool {
        self.docs
            .get(docid as usize)
            .map_or(false, |d| d.is_some())
    }

    /// Compress and store the termid sequence of one document
    pub fn add(&mut self, docid: u32, termids: &[u32]) {
        let idx = docid as usize;
        if idx >= self.docs.len() {
            self.docs.resize(idx + 1, None);
        }
        if termids.is_empty() {
            return;
        }

        let nb = (termids.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
        let mut stream = Vec::with_capacity(1 + nb * (MAX_ENCODED_WORDS + 1));
        stream.push(nb as u32);
        let mut sbuf = [0u32; MAX_ENCODED_WORDS];
        for chunk in termids.chunks(BLOCK_SIZE) {
            let words = codec::encode(chunk, &mut sbuf, false);
            stream.push(words as u32);
            stream.extend_from_slice(&sbuf[..words]);
        }
        self.docs[idx] = Some(stream.into_boxed_slice());
    }

    /// Decode the stored termid sequence, truncated to `len` entries
    pub fn get(&self, docid: u32, len: usize) -> Option<Vec<u32>> {
        let stream = self.docs.get(docid as usize)?.as_ref()?;
        let nb = stream[0] as usize;
        let mut out = vec![0u32; nb * BLOCK_SIZE];
        let mut pos = 1usize;
        for i in 0..nb {
            let words = stream[pos] as usize;
            codec::decode(&stream[pos + 1..], &mut out[i * BLOCK_SIZE..], false, false);
            pos += words + 1;
        }
        out.truncate(len);
        Some(out)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        writer.write_all(VECTORS_MAGIC)?;
        writer.write_u32::<LittleEndian>(VECTORS_VERSION)?;
        writer.write_u32::<LittleEndian>(self.docs.len() as u32)?;
        for (docid, stream) in self.docs.iter().enumerate() {
            if let Some(stream) = stream {
                writer.write_u32::<LittleEndian>(docid as u32)?;
                writer.write_u32::<LittleEndian>(stream.len() as u32)?;
                for &w in stream.iter() {
                    writer.write_u32::<LittleEndian>(w)?;
                }
            }
        }
        writer.write_u32::<LittleEndian>(u32::MAX)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, IndexError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != VECTORS_MAGIC {
            return Err(IndexError::Corrupted("bad vectors file magic".into()));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VECTORS_VERSION {
            return Err(IndexError::Corrupted(format!(
                "unsupported vectors version {version}"
            )));
        }

        let capacity = reader.read_u32::<LittleEndian>()? as usize;
        let mut vectors = Self {
            docs: vec![None; capacity],
        };
        loop {
            let docid = reader.read_u32::<LittleEndian>()?;
            if docid == u32::MAX {
                break;
            }
            let words = reader.read_u32::<LittleEndian>()? as usize;
            let mut stream = vec![0u32; words];
            for w in stream.iter_mut() {
                *w = reader.read_u32::<LittleEndian>()?;
            }
            let idx = docid as usize;
            if idx >= vectors.docs.len() {
                vectors.docs.resize(idx + 1, None);
            }
            vectors.docs[idx] = Some(stream.into_boxed_slice());
        }
        Ok(vectors)
    }
}
