//! Read-only access to the files of a game directory.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, Cursor, Read, Seek},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use glob::{MatchOptions, Pattern};

/// A readable, seekable file handle.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// A flat collection of named files. Names are the exact names of the
/// underlying files; lookups that should ignore case go through
/// [`FileListing`].
pub trait ArchiveFs {
    /// The names of all regular files at the top level.
    fn file_names(&self) -> io::Result<Vec<String>>;

    fn open(&self, name: &str) -> io::Result<Box<dyn ReadSeek>>;

    fn file_size(&self, name: &str) -> io::Result<u64>;

    /// A human-readable description of where the files live.
    fn describe(&self) -> String;
}

/// A directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirFs { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArchiveFs for DirFs {
    fn file_names(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => log::debug!("Skipping non-UTF-8 file name {name:?}"),
            }
        }
        Ok(names)
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn ReadSeek>> {
        Ok(Box::new(File::open(self.root.join(name))?))
    }

    fn file_size(&self, name: &str) -> io::Result<u64> {
        Ok(std::fs::metadata(self.root.join(name))?.len())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// An in-memory set of files.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: BTreeMap<String, Bytes>,
}

impl MemFs {
    #[must_use]
    pub fn new() -> Self {
        MemFs::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Bytes>) {
        self.files.insert(name.into(), data.into());
    }

    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(name, data);
        self
    }

    fn get(&self, name: &str) -> io::Result<&Bytes> {
        self.files.get(name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("No file named {name}"))
        })
    }
}

impl ArchiveFs for MemFs {
    fn file_names(&self) -> io::Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn ReadSeek>> {
        Ok(Box::new(Cursor::new(self.get(name)?.clone())))
    }

    fn file_size(&self, name: &str) -> io::Result<u64> {
        Ok(self.get(name)?.len() as u64)
    }

    fn describe(&self) -> String {
        format!("<memory: {} files>", self.files.len())
    }
}

/// Reads a whole file.
pub(crate) fn read_file(fs: &dyn ArchiveFs, name: &str) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    fs.open(name)?.read_to_end(&mut data)?;
    Ok(data)
}

/// Reads up to `len` bytes from the start of a file.
pub(crate) fn read_head(fs: &dyn ArchiveFs, name: &str, len: usize) -> io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(len);
    fs.open(name)?.take(len as u64).read_to_end(&mut data)?;
    Ok(data)
}

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A snapshot of the file names in an [`ArchiveFs`], sorted, with
/// case-insensitive lookup and glob matching.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileListing {
    names: Vec<String>,
}

impl FileListing {
    pub(crate) fn read(fs: &dyn ArchiveFs) -> io::Result<Self> {
        let mut names = fs.file_names()?;
        names.sort();
        Ok(FileListing { names })
    }

    #[cfg(test)]
    pub(crate) fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        FileListing { names }
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// The actual name of the file called `name`, ignoring case.
    pub(crate) fn find(&self, name: &str) -> Option<&str> {
        self.names().find(|candidate| candidate.eq_ignore_ascii_case(name))
    }

    /// Names matching any of the glob patterns, ignoring case, in sorted
    /// order without duplicates.
    pub(crate) fn matching<P: AsRef<str>>(&self, patterns: &[P]) -> Vec<String> {
        let patterns: Vec<Pattern> = patterns
            .iter()
            .filter_map(|pattern| match Pattern::new(pattern.as_ref()) {
                Ok(compiled) => Some(compiled),
                Err(err) => {
                    log::warn!("Ignoring bad file pattern {:?}: {err}", pattern.as_ref());
                    None
                }
            })
            .collect();
        self.names
            .iter()
            .filter(|name| {
                patterns
                    .iter()
                    .any(|pattern| pattern.matches_with(name, CASE_INSENSITIVE))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::SeekFrom;

    use super::*;

    #[test]
    fn dir_fs_lists_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("RESOURCE.MAP"), [1, 2, 3]).unwrap();
        std::fs::create_dir(dir.path().join("saves")).unwrap();

        let fs = DirFs::new(dir.path());
        assert_eq!(fs.file_names().unwrap(), vec!["RESOURCE.MAP".to_string()]);
        assert_eq!(fs.file_size("RESOURCE.MAP").unwrap(), 3);
        assert_eq!(read_file(&fs, "RESOURCE.MAP").unwrap(), vec![1, 2, 3]);
        assert!(fs.open("missing").is_err());
    }

    #[test]
    fn mem_fs_opens_seekable_handles() {
        let fs = MemFs::new().with_file("a.bin", vec![10, 20, 30, 40]);
        let mut handle = fs.open("a.bin").unwrap();
        handle.seek(SeekFrom::Start(2)).unwrap();
        let mut buf = [0; 2];
        handle.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [30, 40]);
        assert_eq!(read_head(&fs, "a.bin", 3).unwrap(), vec![10, 20, 30]);
        assert_eq!(read_head(&fs, "a.bin", 10).unwrap().len(), 4);
        assert_eq!(
            fs.open("b.bin").err().map(|e| e.kind()),
            Some(io::ErrorKind::NotFound)
        );
    }

    #[test]
    fn listing_ignores_case() {
        let listing = FileListing::from_names([
            "RESOURCE.000",
            "resource.001",
            "Resource.Map",
            "view.012",
            "12.v56",
            "notes.txt",
        ]);
        assert_eq!(listing.find("resource.map"), Some("Resource.Map"));
        assert_eq!(listing.find("resource.aud"), None);
        assert_eq!(
            listing.matching(&["resource.0[0-9][0-9]"]),
            vec!["RESOURCE.000".to_string(), "resource.001".to_string()]
        );
        assert_eq!(
            listing.matching(&["view.[0-9][0-9][0-9]", "*.v56", "*.V56"]),
            vec!["12.v56".to_string(), "view.012".to_string()]
        );
    }
}
