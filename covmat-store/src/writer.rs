use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use fxhash::FxHashSet;
use log::{debug, error, info};

use covmat_core::consts::{BASE_DEPTH, CLIP_END_COUNT, FULL_NAME, LENGTH, UNIQUE_READ_COUNT};
use covmat_core::models::CoverageRecord;
use covmat_core::{CoverageSink, StoreError};

use crate::consts::{CHUNK_SIZE, COMPRESSION_LEVEL};
use crate::format::{Chunk, Directory, Footer, Group, HEADER_LEN, Member, encode_chunk, write_header};

struct OpenStore {
    file: BufWriter<File>,
    position: u64,
    directory: Directory,
    names: FxHashSet<String>,
}

impl OpenStore {
    fn create(path: &Path) -> io::Result<Self> {
        let mut file = BufWriter::new(File::create(path)?);
        write_header(&mut file)?;

        Ok(OpenStore {
            file,
            position: HEADER_LEN,
            directory: Directory::default(),
            names: FxHashSet::default(),
        })
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<u64> {
        let offset = self.position;
        self.file.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(offset)
    }

    fn append_text(&mut self, text: &str) -> io::Result<Member> {
        let offset = self.append(text.as_bytes())?;
        Ok(Member::Text {
            offset,
            len: text.len() as u64,
        })
    }

    fn append_int32(&mut self, value: u32) -> io::Result<Member> {
        let mut bytes = Vec::with_capacity(4);
        bytes.write_u32::<LittleEndian>(value)?;
        let offset = self.append(&bytes)?;
        Ok(Member::Int32 { offset })
    }

    fn append_array(&mut self, values: &[u32], chunk_len: usize) -> io::Result<Member> {
        let chunk_len = chunk_len.min(values.len()).max(1);

        let mut chunks = Vec::with_capacity(values.len().div_ceil(chunk_len));
        for window in values.chunks(chunk_len) {
            let bytes = encode_chunk(window, COMPRESSION_LEVEL)?;
            let offset = self.append(&bytes)?;
            chunks.push(Chunk {
                offset,
                compressed_len: bytes.len() as u64,
            });
        }

        Ok(Member::Array {
            len: values.len() as u64,
            chunk_len: chunk_len as u64,
            level: COMPRESSION_LEVEL,
            chunks,
        })
    }

    fn finish(mut self) -> Result<(), StoreError> {
        let directory = serde_json::to_vec(&self.directory)
            .map_err(|err| StoreError::Corrupt(format!("can't encode directory: {err}")))?;
        let directory_offset = self.append(&directory)?;

        Footer {
            directory_offset,
            directory_len: directory.len() as u64,
        }
        .write(&mut self.file)?;
        self.file.flush()?;

        Ok(())
    }
}

///
/// Writes coverage records into a store file.
///
/// The destination is created (or truncated) on the first record unless [StoreWriter::open]
/// was called earlier. Nothing is readable until [StoreWriter::finish] writes the
/// directory; dropping an unfinished writer finishes it on a best-effort basis.
///
pub struct StoreWriter {
    path: PathBuf,
    chunk_len: usize,
    store: Option<OpenStore>,
    finished: bool,
}

impl StoreWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        StoreWriter {
            path: path.as_ref().to_path_buf(),
            chunk_len: CHUNK_SIZE,
            store: None,
            finished: false,
        }
    }

    ///
    /// Override the number of elements per compressed chunk.
    ///
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    ///
    /// Create the destination file now instead of on the first record.
    ///
    pub fn open(&mut self) -> Result<(), StoreError> {
        self.store_mut().map(|_| ())
    }

    fn store_mut(&mut self) -> Result<&mut OpenStore, StoreError> {
        if self.finished {
            return Err(StoreError::NotOpen);
        }

        if self.store.is_none() {
            info!("Creating coverage store {}", self.path.display());
            self.store = Some(OpenStore::create(&self.path)?);
        }

        self.store.as_mut().ok_or(StoreError::NotOpen)
    }

    ///
    /// Append one record as a new group.
    ///
    /// A record whose name is already in the store is rejected with
    /// [StoreError::DuplicateGroup]; the store stays usable.
    ///
    pub fn write_record(&mut self, record: &CoverageRecord) -> Result<(), StoreError> {
        let chunk_len = self.chunk_len;
        let store = self.store_mut()?;

        if store.names.contains(&record.name) {
            return Err(StoreError::DuplicateGroup(record.name.clone()));
        }

        let length = u32::try_from(record.length).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is too long to store ({} bases)", record.name, record.length),
            )
        })?;

        let mut members = BTreeMap::new();
        members.insert(FULL_NAME.to_string(), store.append_text(&record.name)?);
        members.insert(LENGTH.to_string(), store.append_int32(length)?);
        members.insert(
            UNIQUE_READ_COUNT.to_string(),
            store.append_int32(record.unique_read_count)?,
        );
        members.insert(
            BASE_DEPTH.to_string(),
            store.append_array(&record.depth, chunk_len)?,
        );
        members.insert(
            CLIP_END_COUNT.to_string(),
            store.append_array(&record.clip_ends, chunk_len)?,
        );

        store.names.insert(record.name.clone());
        store.directory.groups.push(Group {
            name: record.name.clone(),
            members,
        });

        debug!("Stored {} ({} bases)", record.name, record.length);
        Ok(())
    }

    ///
    /// Write the directory and footer. Further writes fail with [StoreError::NotOpen].
    ///
    pub fn finish(&mut self) -> Result<(), StoreError> {
        // an untouched writer still produces a valid, empty store
        self.store_mut()?;

        let Some(store) = self.store.take() else {
            return Err(StoreError::NotOpen);
        };
        self.finished = true;

        let groups = store.directory.groups.len();
        store.finish()?;
        info!(
            "Finished coverage store {} ({} sequences)",
            self.path.display(),
            groups
        );

        Ok(())
    }
}

impl CoverageSink for StoreWriter {
    fn write_record(&mut self, record: &CoverageRecord) -> Result<(), StoreError> {
        StoreWriter::write_record(self, record)
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        if self.store.is_some() && !self.finished {
            if let Err(err) = self.finish() {
                error!(
                    "Failed to finish coverage store {}: {}",
                    self.path.display(),
                    err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::tempdir;

    #[rstest]
    fn test_store_is_created_lazily() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lazy.cvmx");

        let mut writer = StoreWriter::new(&path);
        assert!(!path.exists());

        writer.write_record(&CoverageRecord::empty("chr1", 4)).unwrap();
        assert!(path.exists());
    }

    #[rstest]
    fn test_eager_open_fails_on_bad_destination() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("store.cvmx");

        let mut writer = StoreWriter::new(&path);
        assert!(matches!(writer.open(), Err(StoreError::Io(_))));
    }

    #[rstest]
    fn test_duplicate_group_keeps_store_usable() {
        let dir = tempdir().unwrap();
        let mut writer = StoreWriter::new(dir.path().join("dup.cvmx"));

        writer.write_record(&CoverageRecord::empty("chr1", 4)).unwrap();
        let err = writer
            .write_record(&CoverageRecord::empty("chr1", 4))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateGroup(ref name) if name == "chr1"));
        assert!(!err.is_fatal());

        writer.write_record(&CoverageRecord::empty("chr2", 4)).unwrap();
        writer.finish().unwrap();
    }

    #[rstest]
    fn test_write_after_finish_is_rejected() {
        let dir = tempdir().unwrap();
        let mut writer = StoreWriter::new(dir.path().join("done.cvmx"));

        writer.finish().unwrap();
        assert!(matches!(
            writer.write_record(&CoverageRecord::empty("chr1", 1)),
            Err(StoreError::NotOpen)
        ));
    }

    #[rstest]
    fn test_chunking_follows_chunk_len() {
        let dir = tempdir().unwrap();
        let mut store = OpenStore::create(&dir.path().join("chunks.cvmx")).unwrap();

        let values: Vec<u32> = (0..10).collect();
        let member = store.append_array(&values, 4).unwrap();

        let Member::Array {
            len,
            chunk_len,
            chunks,
            ..
        } = member
        else {
            panic!("expected an array member");
        };
        assert_eq!(len, 10);
        assert_eq!(chunk_len, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].offset, HEADER_LEN);
    }

    #[rstest]
    fn test_short_array_uses_single_chunk() {
        let dir = tempdir().unwrap();
        let mut store = OpenStore::create(&dir.path().join("short.cvmx")).unwrap();

        let member = store.append_array(&[1, 2, 3], CHUNK_SIZE).unwrap();
        assert!(matches!(member, Member::Array { chunk_len: 3, ref chunks, .. } if chunks.len() == 1));
    }
}
