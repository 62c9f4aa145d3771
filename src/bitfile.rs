use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local};
use md5::{Digest, Md5};
use thiserror::Error;

use crate::board;
use crate::header::{BitfileHeader, Timestamp, DIGEST_LEN};

#[derive(Error, Debug)]
pub enum BitfileError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("bitfile is {size} bytes; a slot holds at most {max}")]
    TooLarge { size: u64, max: usize },
}

/// A bitstream read from disk, with everything the slot header records.
#[derive(Debug, Clone)]
pub struct Bitfile {
    pub name: String,
    pub data: Vec<u8>,
    pub modified: Timestamp,
    pub digest: [u8; DIGEST_LEN],
}

impl Bitfile {
    pub fn load(path: &Path) -> Result<Self, BitfileError> {
        let meta = fs::metadata(path)?;
        if meta.len() > board::MAX_BITFILE_SIZE as u64 {
            return Err(BitfileError::TooLarge {
                size: meta.len(),
                max: board::MAX_BITFILE_SIZE,
            });
        }

        let modified: DateTime<Local> = meta.modified()?.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let data = fs::read(path)?;

        tracing::debug!(path = %path.display(), bytes = data.len(), "bitfile loaded");

        Self::from_parts(name, data, Timestamp::from_local(&modified))
    }

    pub fn from_parts(
        name: impl Into<String>,
        data: Vec<u8>,
        modified: Timestamp,
    ) -> Result<Self, BitfileError> {
        if data.len() > board::MAX_BITFILE_SIZE {
            return Err(BitfileError::TooLarge {
                size: data.len() as u64,
                max: board::MAX_BITFILE_SIZE,
            });
        }

        let digest = md5_digest(&data);
        Ok(Self {
            name: name.into(),
            data,
            modified,
            digest,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.data.len().div_ceil(board::PAGE_SIZE)
    }

    pub fn header(&self) -> BitfileHeader {
        BitfileHeader::new(self.data.len() as u32, &self.name, self.modified, self.digest)
    }
}

pub fn md5_digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::NamedTempFile;

    #[test]
    fn load_reads_bytes_name_and_digest() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"hello bitstream").unwrap();

        let bf = Bitfile::load(f.path()).unwrap();
        assert_eq!(bf.data, b"hello bitstream");
        assert_eq!(
            bf.name,
            f.path().file_name().unwrap().to_string_lossy().to_string()
        );
        assert_eq!(bf.digest, md5_digest(b"hello bitstream"));
        let mtime: DateTime<Local> = f.as_file().metadata().unwrap().modified().unwrap().into();
        assert_eq!(bf.modified, Timestamp::from_local(&mtime));
    }

    #[test]
    fn md5_of_empty_input() {
        let hex: String = md5_digest(b"").iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn page_count_rounds_up() {
        let ts = Timestamp::default();
        assert_eq!(Bitfile::from_parts("a", vec![], ts).unwrap().page_count(), 0);
        assert_eq!(Bitfile::from_parts("a", vec![0; 256], ts).unwrap().page_count(), 1);
        assert_eq!(Bitfile::from_parts("a", vec![0; 600], ts).unwrap().page_count(), 3);
    }

    #[test]
    fn rejects_bitfile_larger_than_a_slot() {
        let err = Bitfile::from_parts(
            "big.rbf",
            vec![0; board::MAX_BITFILE_SIZE + 1],
            Timestamp::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BitfileError::TooLarge { .. }));
    }

    #[test]
    fn header_carries_size_name_and_digest() {
        let bf = Bitfile::from_parts("top.rbf", vec![1, 2, 3], Timestamp::default()).unwrap();
        let h = bf.header();
        assert_eq!(h.size, 3);
        assert_eq!(h.name(), "top.rbf");
        assert_eq!(h.digest, md5_digest(&[1, 2, 3]));
    }
}
