use tsdb_format::{ArchiveMeta, Error, Header, VALUE_SIZE};
use tsdb_mmap::MmapFileMut;

/// The memory-mapped, byte-exact on-disk representation: a header, followed
/// by one metadata record per archive, followed by each archive's slot
/// array in declaration order.
pub struct SeriesFile {
    mmap: MmapFileMut,
    header: Header,
    metas: Vec<ArchiveMeta>,
    slot_offsets: Vec<usize>,
}

impl SeriesFile {
    fn meta_offset(index: usize) -> usize {
        Header::SIZE + index * ArchiveMeta::SIZE
    }

    fn compute_slot_offsets(metas: &[ArchiveMeta]) -> Vec<usize> {
        let mut offset = Header::SIZE + metas.len() * ArchiveMeta::SIZE;
        let mut offsets = Vec::with_capacity(metas.len());
        for meta in metas {
            offsets.push(offset);
            offset += meta.count as usize * VALUE_SIZE;
        }
        offsets
    }

    pub fn total_size(metas: &[ArchiveMeta]) -> usize {
        let base = Header::SIZE + metas.len() * ArchiveMeta::SIZE;
        let slots: usize = metas.iter().map(|m| m.count as usize * VALUE_SIZE).sum();
        base + slots
    }

    /// Creates a brand new file of exactly the right size, writes the header
    /// and archive metadata, and NaN-fills every slot region.
    pub fn create(path: &std::path::Path, header: Header, metas: Vec<ArchiveMeta>) -> Result<Self, Error> {
        let size = Self::total_size(&metas) as u64;
        let mut mmap = MmapFileMut::create_rw(path, size)?;

        mmap.write_at(0, &header.to_bytes()?)?;
        for (i, meta) in metas.iter().enumerate() {
            mmap.write_at(Self::meta_offset(i), &meta.to_bytes())?;
        }

        let slot_offsets = Self::compute_slot_offsets(&metas);
        let nan_bytes = f32::NAN.to_le_bytes();
        let mut chunk = Vec::with_capacity(1024 * VALUE_SIZE);
        for _ in 0..1024 {
            chunk.extend_from_slice(&nan_bytes);
        }
        for (offset, meta) in slot_offsets.iter().zip(metas.iter()) {
            let mut remaining = meta.count as usize;
            let mut pos = *offset;
            while remaining > 0 {
                let take = remaining.min(1024);
                mmap.write_at(pos, &chunk[..take * VALUE_SIZE])?;
                pos += take * VALUE_SIZE;
                remaining -= take;
            }
        }
        mmap.flush()?;

        Ok(Self {
            mmap,
            header,
            metas,
            slot_offsets,
        })
    }

    pub fn open(path: &std::path::Path) -> Result<Self, Error> {
        let mmap = MmapFileMut::open_rw(path)?;
        let header = Header::from_bytes(mmap.read_at(0, Header::SIZE)?)?;

        let mut metas = Vec::with_capacity(header.archive_count as usize);
        for i in 0..header.archive_count as usize {
            let bytes = mmap.read_at(Self::meta_offset(i), ArchiveMeta::SIZE)?;
            metas.push(ArchiveMeta::from_bytes(bytes)?);
        }
        let slot_offsets = Self::compute_slot_offsets(&metas);

        Ok(Self {
            mmap,
            header,
            metas,
            slot_offsets,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn metas(&self) -> &[ArchiveMeta] {
        &self.metas
    }

    pub fn meta_mut(&mut self, index: usize) -> &mut ArchiveMeta {
        &mut self.metas[index]
    }

    pub fn read_slot(&self, archive_index: usize, slot_index: u32) -> Result<f32, Error> {
        let offset = self.slot_offsets[archive_index] + slot_index as usize * VALUE_SIZE;
        let bytes = self.mmap.read_at(offset, VALUE_SIZE)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn write_slot(&mut self, archive_index: usize, slot_index: u32, value: f32) -> Result<(), Error> {
        let offset = self.slot_offsets[archive_index] + slot_index as usize * VALUE_SIZE;
        self.mmap.write_at(offset, &value.to_le_bytes())?;
        Ok(())
    }

    /// Rewrites one archive's metadata record from the in-memory copy. Must
    /// be called after every `write_slot` touching that archive, and before
    /// `write_last_epoch`, so a crash mid-update never leaves metadata
    /// pointing past slots that were not actually written.
    pub fn sync_meta(&mut self, archive_index: usize) -> Result<(), Error> {
        let bytes = self.metas[archive_index].to_bytes();
        self.mmap.write_at(Self::meta_offset(archive_index), &bytes)?;
        Ok(())
    }

    pub fn write_last_epoch(&mut self, epoch: i64) -> Result<(), Error> {
        self.header.last_epoch = epoch;
        self.mmap.write_at(Header::LAST_EPOCH_OFFSET, &epoch.to_le_bytes())?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.mmap.flush()?;
        Ok(())
    }
}
