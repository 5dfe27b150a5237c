use super::{AssignmentContainer, ContainerError, Insertion, check_width};
use crate::core::io::records::{RecordError, RecordHeader, read_record, write_record};
use crate::core::models::assignment::Assignment;
use crate::core::models::ids::EntityId;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const WRITE_BATCH: usize = 1024;

/// Append-only store backed by a binary record file.
///
/// Writes are buffered and the header's record count is rewritten on every
/// flush, so the file is a valid record file after each [`flush`]. Records
/// are read back by seeking to their fixed offset. The set of stored state
/// vectors is also kept in memory for duplicate detection.
///
/// [`flush`]: AssignmentContainer::flush
#[derive(Debug)]
pub struct DiskContainer {
    path: PathBuf,
    file: File,
    header: RecordHeader,
    pending: Vec<Assignment>,
    members: HashSet<Vec<usize>>,
    writable: bool,
}

impl DiskContainer {
    /// Creates (or truncates) a record file for a subset's entities.
    pub fn create(path: &Path, entities: Vec<EntityId>) -> Result<Self, ContainerError> {
        let header = RecordHeader::new(entities);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| storage_error(path, e.into()))?;
        let mut writer = BufWriter::new(&file);
        header
            .write(&mut writer)
            .map_err(|e| storage_error(path, e))?;
        writer
            .flush()
            .map_err(|e| storage_error(path, e.into()))?;
        drop(writer);
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            pending: Vec::new(),
            members: HashSet::new(),
            writable: true,
        })
    }

    /// Opens an existing record file for reading only.
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        let file = File::open(path).map_err(|e| storage_error(path, e.into()))?;
        let header =
            RecordHeader::read(&mut BufReader::new(&file)).map_err(|e| storage_error(path, e))?;
        let mut container = Self {
            path: path.to_path_buf(),
            file,
            header,
            pending: Vec::new(),
            members: HashSet::new(),
            writable: false,
        };
        for assignment in container.assignments()? {
            container.members.insert(assignment.states);
        }
        Ok(container)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.header.entities
    }

    fn read_at(&self, index: u64) -> Result<Assignment, ContainerError> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(self.header.record_offset(index)))
            .map_err(|e| storage_error(&self.path, e.into()))?;
        read_record(&mut BufReader::new(file), self.header.width())
            .map_err(|e| storage_error(&self.path, e))
    }

    fn write_pending(&mut self) -> Result<(), RecordError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut file = &self.file;
        file.seek(SeekFrom::Start(self.header.record_offset(self.header.count)))?;
        let mut writer = BufWriter::new(file);
        for assignment in &self.pending {
            write_record(&mut writer, self.header.width(), assignment)?;
        }
        writer.flush()?;
        drop(writer);

        self.header.count += self.pending.len() as u64;
        self.pending.clear();
        file.seek(SeekFrom::Start(self.header.count_offset()))?;
        file.write_all(&self.header.count.to_le_bytes())?;
        Ok(())
    }
}

fn storage_error(path: &Path, source: RecordError) -> ContainerError {
    ContainerError::Storage {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

impl AssignmentContainer for DiskContainer {
    fn width(&self) -> usize {
        self.header.width()
    }

    fn len(&self) -> usize {
        self.header.count as usize + self.pending.len()
    }

    fn insert(&mut self, assignment: Assignment) -> Result<Insertion, ContainerError> {
        if !self.writable {
            return Err(ContainerError::ReadOnly);
        }
        check_width(self.width(), &assignment)?;
        if assignment.states.iter().any(|&s| u32::try_from(s).is_err()) {
            return Err(storage_error(
                &self.path,
                RecordError::StateOverflow(assignment.states.iter().copied().max().unwrap_or(0)),
            ));
        }
        if !self.members.insert(assignment.states.clone()) {
            return Ok(Insertion::Duplicate);
        }
        self.pending.push(assignment);
        if self.pending.len() >= WRITE_BATCH {
            self.flush()?;
        }
        Ok(Insertion::Added)
    }

    fn contains(&self, states: &[usize]) -> bool {
        self.members.contains(states)
    }

    fn get(&self, index: usize) -> Result<Option<Assignment>, ContainerError> {
        let stored = self.header.count as usize;
        if index < stored {
            self.read_at(index as u64).map(Some)
        } else {
            Ok(self.pending.get(index - stored).cloned())
        }
    }

    fn assignments(&self) -> Result<Vec<Assignment>, ContainerError> {
        let mut all = Vec::with_capacity(self.len());
        if self.header.count > 0 {
            let mut file = &self.file;
            file.seek(SeekFrom::Start(self.header.record_offset(0)))
                .map_err(|e| storage_error(&self.path, e.into()))?;
            let mut reader = BufReader::new(file);
            for _ in 0..self.header.count {
                all.push(
                    read_record(&mut reader, self.header.width())
                        .map_err(|e| storage_error(&self.path, e))?,
                );
            }
        }
        all.extend(self.pending.iter().cloned());
        Ok(all)
    }

    fn flush(&mut self) -> Result<(), ContainerError> {
        if !self.writable {
            return Ok(());
        }
        self.write_pending()
            .map_err(|e| storage_error(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::records::RecordFile;
    use crate::core::io::traits::AssignmentFile;
    use crate::core::models::system::EntitySystem;
    use tempfile::tempdir;

    fn entities() -> Vec<EntityId> {
        let mut system = EntitySystem::new();
        vec![
            system.add_entity("A", 4).unwrap(),
            system.add_entity("B", 4).unwrap(),
        ]
    }

    #[test]
    fn flushed_file_is_a_valid_record_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node.rec");
        let mut container = DiskContainer::create(&path, entities()).unwrap();
        container.insert(Assignment::new(vec![0, 1], 1.0)).unwrap();
        container.insert(Assignment::new(vec![3, 2], -2.0)).unwrap();
        container.flush().unwrap();
        container.insert(Assignment::new(vec![1, 1], 0.5)).unwrap();
        container.flush().unwrap();

        let set = RecordFile::read_from_path(&path).unwrap();
        assert_eq!(set.entities, entities());
        assert_eq!(set.records.len(), 3);
        assert_eq!(set.records[2], Assignment::new(vec![1, 1], 0.5));
    }

    #[test]
    fn get_reads_flushed_and_pending_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node.rec");
        let mut container = DiskContainer::create(&path, entities()).unwrap();
        container.insert(Assignment::new(vec![0, 0], 1.0)).unwrap();
        container.flush().unwrap();
        container.insert(Assignment::new(vec![2, 3], 4.0)).unwrap();
        assert_eq!(container.len(), 2);
        assert_eq!(
            container.get(0).unwrap(),
            Some(Assignment::new(vec![0, 0], 1.0))
        );
        assert_eq!(
            container.get(1).unwrap(),
            Some(Assignment::new(vec![2, 3], 4.0))
        );
        assert_eq!(container.get(2).unwrap(), None);
    }

    #[test]
    fn large_batches_spill_to_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.rec");
        let mut system = EntitySystem::new();
        let id = system.add_entity("X", 5000).unwrap();
        let mut container = DiskContainer::create(&path, vec![id]).unwrap();
        for i in 0..(WRITE_BATCH + 10) {
            container.insert(Assignment::new(vec![i], i as f64)).unwrap();
        }
        assert_eq!(container.header.count as usize, WRITE_BATCH);
        assert_eq!(container.len(), WRITE_BATCH + 10);
        assert_eq!(
            container.get(WRITE_BATCH - 1).unwrap().map(|a| a.states),
            Some(vec![WRITE_BATCH - 1])
        );
    }

    #[test]
    fn opened_container_is_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node.rec");
        let mut container = DiskContainer::create(&path, entities()).unwrap();
        container.insert(Assignment::new(vec![1, 2], 3.0)).unwrap();
        container.flush().unwrap();
        drop(container);

        let mut reopened = DiskContainer::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.contains(&[1, 2]));
        assert!(matches!(
            reopened.insert(Assignment::new(vec![0, 0], 0.0)),
            Err(ContainerError::ReadOnly)
        ));
    }
}
