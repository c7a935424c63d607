use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use fxhash::FxHashMap;
use log::debug;

use covmat_core::StoreError;
use covmat_core::consts::{FULL_NAME, LENGTH, UNIQUE_READ_COUNT};

use crate::format::{Chunk, Directory, FOOTER_LEN, Footer, Group, HEADER_LEN, Member, decode_chunk, read_header};

/// Where a [CoverageReader] currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Closed,
    Opened,
    SequenceSelected,
    ArraySelected,
}

struct OpenStore {
    path: PathBuf,
    file: BufReader<File>,
    directory: Directory,
    index: FxHashMap<String, usize>,
}

impl OpenStore {
    fn open(path: &Path) -> Result<Self, StoreError> {
        let mut file = BufReader::new(File::open(path)?);
        let file_len = file.get_ref().metadata()?.len();

        if file_len < HEADER_LEN + FOOTER_LEN {
            return Err(StoreError::InvalidStore(format!(
                "{} is too short to be a coverage store",
                path.display()
            )));
        }

        read_header(&mut file)?;

        file.seek(SeekFrom::End(-(FOOTER_LEN as i64)))?;
        let footer = Footer::read(&mut file)?;

        let directory_end = footer
            .directory_offset
            .checked_add(footer.directory_len)
            .and_then(|end| end.checked_add(FOOTER_LEN));
        if footer.directory_offset < HEADER_LEN || directory_end != Some(file_len) {
            return Err(StoreError::Corrupt("directory location is invalid".to_string()));
        }

        let mut raw = vec![0u8; footer.directory_len as usize];
        file.seek(SeekFrom::Start(footer.directory_offset))?;
        file.read_exact(&mut raw)?;

        let directory: Directory = serde_json::from_slice(&raw)
            .map_err(|err| StoreError::Corrupt(format!("unreadable directory: {err}")))?;

        let index = directory
            .groups
            .iter()
            .enumerate()
            .map(|(i, group)| (group.name.clone(), i))
            .collect();

        Ok(OpenStore {
            path: path.to_path_buf(),
            file,
            directory,
            index,
        })
    }

    fn group_index(&self, name: &str) -> Result<usize, StoreError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::MissingSequence(name.to_string()))
    }

    fn group(&self, index: usize) -> &Group {
        &self.directory.groups[index]
    }

    fn member(&self, index: usize, member: &str) -> Result<&Member, StoreError> {
        let group = self.group(index);
        group
            .members
            .get(member)
            .ok_or_else(|| StoreError::MissingArray {
                sequence: group.name.clone(),
                member: member.to_string(),
            })
    }

    fn read_bytes(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        let mut bytes = vec![0u8; len as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_int32(&mut self, index: usize, member: &str) -> Result<u32, StoreError> {
        let offset = match self.member(index, member)? {
            Member::Int32 { offset } => *offset,
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "{member} of {} is not an integer",
                    self.group(index).name
                )));
            }
        };

        self.file.seek(SeekFrom::Start(offset))?;
        Ok(self.file.read_u32::<LittleEndian>()?)
    }

    fn read_text(&mut self, index: usize, member: &str) -> Result<String, StoreError> {
        let (offset, len) = match self.member(index, member)? {
            Member::Text { offset, len } => (*offset, *len),
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "{member} of {} is not text",
                    self.group(index).name
                )));
            }
        };

        let bytes = self.read_bytes(offset, len)?;
        String::from_utf8(bytes)
            .map_err(|_| StoreError::Corrupt(format!("{member} is not valid UTF-8")))
    }
}

///
/// An array picked out for range reads.
///
#[derive(Debug, Clone)]
struct SelectedArray {
    name: String,
    len: u64,
    chunk_len: u64,
    chunks: Vec<Chunk>,
}

impl SelectedArray {
    fn from_member(sequence: &str, name: &str, member: &Member) -> Result<Self, StoreError> {
        let Member::Array {
            len,
            chunk_len,
            chunks,
            ..
        } = member
        else {
            return Err(StoreError::MissingArray {
                sequence: sequence.to_string(),
                member: name.to_string(),
            });
        };

        let expected_chunks = if *len == 0 {
            0
        } else if *chunk_len == 0 {
            return Err(StoreError::Corrupt(format!(
                "{name} of {sequence} has a zero chunk length"
            )));
        } else {
            len.div_ceil(*chunk_len)
        };
        if chunks.len() as u64 != expected_chunks {
            return Err(StoreError::Corrupt(format!(
                "{name} of {sequence} has {} chunks, expected {expected_chunks}",
                chunks.len()
            )));
        }

        Ok(SelectedArray {
            name: name.to_string(),
            len: *len,
            chunk_len: *chunk_len,
            chunks: chunks.clone(),
        })
    }

    /// Number of values held by chunk `i`.
    fn chunk_values(&self, i: u64) -> u64 {
        self.chunk_len.min(self.len - i * self.chunk_len)
    }
}

enum Selection {
    Nothing,
    Sequence(usize),
    Array(usize, SelectedArray),
}

///
/// Random-access reader over a coverage store.
///
/// The reader walks through four states: closed, opened, a sequence selected, and an
/// array of that sequence selected. Selecting what is already selected does nothing,
/// so callers can re-select on every feature without touching the file. Range reads
/// inflate only the chunks they overlap and nothing is cached between calls.
///
pub struct CoverageReader {
    store: Option<OpenStore>,
    selection: Selection,
}

impl Default for CoverageReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageReader {
    /// A closed reader.
    pub fn new() -> Self {
        CoverageReader {
            store: None,
            selection: Selection::Nothing,
        }
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut reader = Self::new();
        reader.open(path)?;
        Ok(reader)
    }

    ///
    /// Open a store file, closing whatever was open before.
    ///
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<(), StoreError> {
        self.close();

        let store = OpenStore::open(path.as_ref())?;
        debug!(
            "Opened coverage store {} ({} sequences)",
            store.path.display(),
            store.directory.groups.len()
        );
        self.store = Some(store);

        Ok(())
    }

    /// Release the file and any selection. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.selection = Selection::Nothing;
        if let Some(store) = self.store.take() {
            debug!("Closed coverage store {}", store.path.display());
        }
    }

    pub fn state(&self) -> ReaderState {
        match (&self.store, &self.selection) {
            (None, _) => ReaderState::Closed,
            (Some(_), Selection::Nothing) => ReaderState::Opened,
            (Some(_), Selection::Sequence(_)) => ReaderState::SequenceSelected,
            (Some(_), Selection::Array(..)) => ReaderState::ArraySelected,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.store.as_ref().map(|store| store.path.as_path())
    }

    fn store(&self) -> Result<&OpenStore, StoreError> {
        self.store.as_ref().ok_or(StoreError::NotOpen)
    }

    fn store_mut(&mut self) -> Result<&mut OpenStore, StoreError> {
        self.store.as_mut().ok_or(StoreError::NotOpen)
    }

    fn selected_sequence(&self) -> Option<usize> {
        match self.selection {
            Selection::Nothing => None,
            Selection::Sequence(index) | Selection::Array(index, _) => Some(index),
        }
    }

    ///
    /// Names of all sequences, in the order they were written.
    ///
    pub fn sequence_names(&self) -> Result<Vec<&str>, StoreError> {
        Ok(self
            .store()?
            .directory
            .groups
            .iter()
            .map(|group| group.name.as_str())
            .collect())
    }

    ///
    /// Select the group for `name`. A no-op if it is already selected; otherwise the
    /// array selection is dropped.
    ///
    pub fn select_sequence(&mut self, name: &str) -> Result<(), StoreError> {
        let store = self.store()?;

        if let Some(current) = self.selected_sequence() {
            if store.group(current).name == name {
                return Ok(());
            }
        }

        // a failed lookup leaves nothing selected
        match store.group_index(name) {
            Ok(index) => {
                self.selection = Selection::Sequence(index);
                Ok(())
            }
            Err(err) => {
                self.selection = Selection::Nothing;
                Err(err)
            }
        }
    }

    ///
    /// Select an array member of the current sequence. A no-op if it is already
    /// selected.
    ///
    pub fn select_array(&mut self, name: &str) -> Result<(), StoreError> {
        let store = self.store()?;
        let Some(index) = self.selected_sequence() else {
            return Err(StoreError::NoSequenceSelected);
        };

        if let Selection::Array(_, array) = &self.selection {
            if array.name == name {
                return Ok(());
            }
        }

        let group = store.group(index);
        let array = store
            .member(index, name)
            .and_then(|member| SelectedArray::from_member(&group.name, name, member));

        // any failure releases the previous array
        match array {
            Ok(array) => {
                self.selection = Selection::Array(index, array);
                Ok(())
            }
            Err(err) => {
                self.selection = Selection::Sequence(index);
                Err(err)
            }
        }
    }

    ///
    /// Length of the selected array.
    ///
    pub fn selected_array_len(&self) -> Result<u64, StoreError> {
        self.store()?;
        match &self.selection {
            Selection::Array(_, array) => Ok(array.len),
            _ => Err(StoreError::NoArraySelected),
        }
    }

    ///
    /// Fill `out` with the values of the selected array starting at `start`.
    ///
    /// # Arguments
    /// - start: 0-based offset into the array
    /// - out: destination; its length is the number of values read
    ///
    pub fn read_range(&mut self, start: u64, out: &mut [u32]) -> Result<(), StoreError> {
        let count = out.len() as u64;

        self.store()?;
        let array = match &self.selection {
            Selection::Array(_, array) => array.clone(),
            _ => return Err(StoreError::NoArraySelected),
        };

        let end = start.checked_add(count);
        if end.is_none_or(|end| end > array.len) {
            return Err(StoreError::OutOfBounds {
                start,
                count,
                len: array.len,
            });
        }
        if count == 0 {
            return Ok(());
        }
        let end = start + count;

        let store = self.store_mut()?;
        let first = start / array.chunk_len;
        let last = (end - 1) / array.chunk_len;

        for i in first..=last {
            let chunk = array.chunks[i as usize];
            let bytes = store.read_bytes(chunk.offset, chunk.compressed_len)?;
            let values = decode_chunk(&bytes, array.chunk_values(i) as usize)?;

            let chunk_start = i * array.chunk_len;
            let from = start.max(chunk_start);
            let to = end.min(chunk_start + values.len() as u64);

            out[(from - start) as usize..(to - start) as usize]
                .copy_from_slice(&values[(from - chunk_start) as usize..(to - chunk_start) as usize]);
        }

        Ok(())
    }

    ///
    /// Number of primary alignments on `name`. Selects the sequence as a side effect.
    ///
    pub fn total_unique_read_count(&mut self, name: &str) -> Result<u32, StoreError> {
        self.select_sequence(name)?;
        let index = self.selected_sequence().ok_or(StoreError::NoSequenceSelected)?;
        self.store_mut()?.read_int32(index, UNIQUE_READ_COUNT)
    }

    pub fn sequence_length(&mut self, name: &str) -> Result<u32, StoreError> {
        let store = self.store_mut()?;
        let index = store.group_index(name)?;
        store.read_int32(index, LENGTH)
    }

    pub fn full_name(&mut self, name: &str) -> Result<String, StoreError> {
        let store = self.store_mut()?;
        let index = store.group_index(name)?;
        store.read_text(index, FULL_NAME)
    }
}
