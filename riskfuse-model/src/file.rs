use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the bytes of a [`FileDescriptor`] live.
#[derive(Clone)]
pub enum FileSource {
    /// Read lazily from the local filesystem.
    Path(PathBuf),
    /// Already resident in memory (drag-and-drop uploads, tests).
    Memory(Arc<[u8]>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileSource::Memory(bytes) => f
                .debug_struct("Memory")
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Immutable reference to one file submitted for scanning.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    name: String,
    size: u64,
    source: FileSource,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, source: FileSource) -> Self {
        Self {
            name: name.into(),
            size,
            source,
        }
    }

    /// Describe a file on disk. The display name is the final path component.
    pub fn from_path(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(name, size, FileSource::Path(path))
    }

    pub fn in_memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self::new(name, bytes.len() as u64, FileSource::Memory(bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Path(path) => Some(path.as_path()),
            FileSource::Memory(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_uses_file_name_for_display() {
        let file = FileDescriptor::from_path("/tmp/samples/dropper.exe", 42);
        assert_eq!(file.name(), "dropper.exe");
        assert_eq!(file.size(), 42);
        assert_eq!(file.path(), Some(Path::new("/tmp/samples/dropper.exe")));
    }

    #[test]
    fn in_memory_takes_size_from_bytes() {
        let file = FileDescriptor::in_memory("blob.bin", vec![0u8; 7]);
        assert_eq!(file.size(), 7);
        assert!(file.path().is_none());
        assert!(format!("{:?}", file.source()).contains("len: 7"));
    }
}
