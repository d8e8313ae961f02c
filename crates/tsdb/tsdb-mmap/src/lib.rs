use memmap2::{Mmap, MmapMut};
use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

/// Owns a file and its read-write memory map. Every byte-level access to a
/// series file goes through `read_at`/`write_at` so no caller reaches for
/// `unsafe` directly.
pub struct MmapFileMut {
    _file: File,
    mmap: MmapMut,
}

/// Read-only counterpart, used when a series is opened purely for `fetch`/`info`.
pub struct MmapFile {
    _file: File,
    mmap: Mmap,
}

impl MmapFileMut {
    pub fn create_rw<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size_bytes)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    pub fn open_rw<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Bounds-checked read of `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: usize, len: usize) -> io::Result<&[u8]> {
        self.mmap
            .get(offset..offset + len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "mmap read out of bounds"))
    }

    /// Bounds-checked write of `bytes` starting at `offset`.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> io::Result<()> {
        let dest = self
            .mmap
            .get_mut(offset..offset + bytes.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "mmap write out of bounds"))?;
        dest.copy_from_slice(bytes);
        Ok(())
    }

    /// Explicit durability boundary: forces dirty pages to the backing file.
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }
}

impl MmapFile {
    pub fn open_ro<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn read_at(&self, offset: usize, len: usize) -> io::Result<&[u8]> {
        self.mmap
            .get(offset..offset + len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "mmap read out of bounds"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmap_roundtrip_bytes() {
        let path = std::env::temp_dir().join("tsdb_mmap_roundtrip_test.bin");
        let _ = std::fs::remove_file(&path);

        {
            let mut f = MmapFileMut::create_rw(&path, 16).unwrap();
            f.write_at(0, &[0xAB; 8]).unwrap();
            f.write_at(8, &[0xCD; 8]).unwrap();
            f.flush().unwrap();
        }

        let f = MmapFile::open_ro(&path).unwrap();
        assert_eq!(f.read_at(0, 8).unwrap(), &[0xAB; 8]);
        assert_eq!(f.read_at(8, 8).unwrap(), &[0xCD; 8]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_out_of_bounds_is_an_error() {
        let path = std::env::temp_dir().join("tsdb_mmap_oob_test.bin");
        let _ = std::fs::remove_file(&path);
        let mut f = MmapFileMut::create_rw(&path, 4).unwrap();
        assert!(f.write_at(0, &[0u8; 8]).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
