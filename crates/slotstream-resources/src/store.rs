//! Named resource stores
//!
//! A store is a flat namespace of binary blobs. The chunk writer only ever
//! calls [`ResourceSink::put`]; the chunk reader only needs existence checks
//! and fresh seekable readers from [`ResourceSource`].

use parking_lot::RwLock;
use slotstream_formats::{RUN_ID_RESOURCE, SLOT_NAME_PREFIX};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Write side of a resource store
pub trait ResourceSink {
    /// Store `data` under `name`, replacing any previous contents
    fn put(&mut self, name: &str, data: &[u8]) -> io::Result<()>;
}

impl<T: ResourceSink + ?Sized> ResourceSink for &mut T {
    fn put(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        (**self).put(name, data)
    }
}

/// Read side of a resource store
pub trait ResourceSource {
    /// Reader over one resource
    type Reader: Read + Seek;

    /// Whether a resource called `name` exists
    fn exists(&self, name: &str) -> bool;

    /// Open a fresh reader positioned at the start of `name`
    ///
    /// Fails with [`io::ErrorKind::NotFound`] for unknown names.
    fn open_read(&self, name: &str) -> io::Result<Self::Reader>;

    /// Length of `name` in bytes
    fn resource_len(&self, name: &str) -> io::Result<u64> {
        self.open_read(name)?.seek(SeekFrom::End(0))
    }
}

impl<T: ResourceSource + ?Sized> ResourceSource for Arc<T> {
    type Reader = T::Reader;

    fn exists(&self, name: &str) -> bool {
        (**self).exists(name)
    }

    fn open_read(&self, name: &str) -> io::Result<Self::Reader> {
        (**self).open_read(name)
    }

    fn resource_len(&self, name: &str) -> io::Result<u64> {
        (**self).resource_len(name)
    }
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("resource not found: {name}"))
}

/// In-memory store
///
/// Clones share the same contents, so a writer and a reader can hold one each.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resources: Arc<RwLock<BTreeMap<String, Arc<[u8]>>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `name`, if present
    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.resources.read().get(name).cloned()
    }

    /// Remove `name`, returning its contents
    pub fn remove(&self, name: &str) -> Option<Arc<[u8]>> {
        self.resources.write().remove(name)
    }

    /// Store `data` under `name` without a mutable handle
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.resources.write().insert(name.into(), data.into());
    }

    /// All resource names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.resources.read().keys().cloned().collect()
    }

    /// Number of stored resources
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

impl ResourceSink for MemoryStore {
    fn put(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        trace!("memory store put {} ({} bytes)", name, data.len());
        self.insert(name, data);
        Ok(())
    }
}

impl ResourceSource for MemoryStore {
    type Reader = Cursor<Arc<[u8]>>;

    fn exists(&self, name: &str) -> bool {
        self.resources.read().contains_key(name)
    }

    fn open_read(&self, name: &str) -> io::Result<Self::Reader> {
        self.get(name).map(Cursor::new).ok_or_else(|| not_found(name))
    }

    fn resource_len(&self, name: &str) -> io::Result<u64> {
        self.get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(name))
    }
}

/// Store keeping one file per resource inside a directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Use `dir` as a store, creating it if needed
    pub fn create<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let root = dir.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!("created directory store at {}", root.display());
        Ok(Self { root })
    }

    /// Use an existing directory as a store
    pub fn open<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("store directory not found: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    /// Directory holding the resources
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All resource names in sorted order
    pub fn names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_valid_name(name)
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove the resources of a previous run, returning how many were removed
    ///
    /// The run identifier is removed first: an interrupted clear leaves a store
    /// that reads as corrupt.
    pub fn clear_run(&self) -> io::Result<usize> {
        let mut removed = 0;
        let run_id = self.root.join(RUN_ID_RESOURCE);
        match fs::remove_file(&run_id) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        for name in self.names()? {
            if name.starts_with(SLOT_NAME_PREFIX) {
                fs::remove_file(self.root.join(&name))?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(
                "removed {} resources of a previous run from {}",
                removed,
                self.root.display()
            );
        }
        Ok(removed)
    }

    fn path_for(&self, name: &str) -> io::Result<PathBuf> {
        if !is_valid_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid resource name: {name:?}"),
            ));
        }
        Ok(self.root.join(name))
    }
}

/// Names must be plain file names: `[A-Za-z0-9_.-]+` not starting with a dot
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

impl ResourceSink for DirectoryStore {
    fn put(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path_for(name)?;
        trace!("directory store put {} ({} bytes)", name, data.len());
        fs::write(path, data)
    }
}

impl ResourceSource for DirectoryStore {
    type Reader = BufReader<File>;

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|path| path.is_file())
    }

    fn open_read(&self, name: &str) -> io::Result<Self::Reader> {
        let path = self.path_for(name)?;
        match File::open(path) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(not_found(name)),
            Err(err) => Err(err),
        }
    }

    fn resource_len(&self, name: &str) -> io::Result<u64> {
        let path = self.path_for(name)?;
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(not_found(name)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(not_found(name)),
            Err(err) => Err(err),
        }
    }
}
