//! A bounded set of open file handles, closed least-recently-used first.

use std::{
    io::{self, Read, Seek, SeekFrom},
    num::NonZeroUsize,
};

use lru::LruCache;

use crate::fs::{ArchiveFs, ReadSeek};

/// The most space `read_up_to` reserves ahead of reading.
const READ_UP_TO_RESERVE: usize = 0x1_0000;

pub(crate) struct FilePool {
    handles: LruCache<String, Box<dyn ReadSeek>>,
}

impl FilePool {
    /// A pool keeping at most `limit` files open. A limit of zero is
    /// treated as one.
    pub(crate) fn new(limit: usize) -> Self {
        let limit = NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN);
        FilePool {
            handles: LruCache::new(limit),
        }
    }

    fn handle(&mut self, fs: &dyn ArchiveFs, name: &str) -> io::Result<&mut Box<dyn ReadSeek>> {
        if !self.handles.contains(name) {
            let file = fs.open(name)?;
            if let Some((closed, _)) = self.handles.push(name.to_string(), file) {
                log::trace!("Closed {closed} to make room for {name}");
            }
        }
        self.handles.get_mut(name).ok_or_else(|| {
            io::Error::other(format!("Handle for {name} was dropped from the pool"))
        })
    }

    /// Fills `buf` from `offset` in the named file.
    pub(crate) fn read_at(
        &mut self,
        fs: &dyn ArchiveFs,
        name: &str,
        offset: u64,
        buf: &mut [u8],
    ) -> io::Result<()> {
        let handle = self.handle(fs, name)?;
        handle.seek(SeekFrom::Start(offset))?;
        handle.read_exact(buf)
    }

    /// Reads `len` bytes at `offset`. A range running past the end of the
    /// file fails before any buffer is allocated for it.
    pub(crate) fn read_vec(
        &mut self,
        fs: &dyn ArchiveFs,
        name: &str,
        offset: u64,
        len: usize,
    ) -> io::Result<Vec<u8>> {
        let file_size = self.size(fs, name)?;
        if offset.saturating_add(len as u64) > file_size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{len} bytes at {offset:#x} run past the end of {name} ({file_size} bytes)"),
            ));
        }
        let mut data = vec![0; len];
        self.read_at(fs, name, offset, &mut data)?;
        Ok(data)
    }

    /// Reads at most `len` bytes at `offset`, stopping early at the end of
    /// the file.
    pub(crate) fn read_up_to(
        &mut self,
        fs: &dyn ArchiveFs,
        name: &str,
        offset: u64,
        len: usize,
    ) -> io::Result<Vec<u8>> {
        let handle = self.handle(fs, name)?;
        handle.seek(SeekFrom::Start(offset))?;
        let mut data = Vec::with_capacity(len.min(READ_UP_TO_RESERVE));
        handle.by_ref().take(len as u64).read_to_end(&mut data)?;
        Ok(data)
    }

    pub(crate) fn size(&mut self, fs: &dyn ArchiveFs, name: &str) -> io::Result<u64> {
        self.handle(fs, name)?.seek(SeekFrom::End(0))
    }

    #[cfg(test)]
    pub(crate) fn open_count(&self) -> usize {
        self.handles.len()
    }
}
