use crate::error::Error;

/// Series-level aggregation semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesType {
    Period,
    Gauge,
    Counter,
}

impl SeriesType {
    fn to_u64(self) -> u64 {
        match self {
            SeriesType::Period => 0,
            SeriesType::Gauge => 1,
            SeriesType::Counter => 2,
        }
    }

    fn from_u64(raw: u64) -> Result<Self, Error> {
        match raw {
            0 => Ok(SeriesType::Period),
            1 => Ok(SeriesType::Gauge),
            2 => Ok(SeriesType::Counter),
            other => Err(Error::InvalidConfig(format!("unknown series_type tag {other}"))),
        }
    }
}

/// Per-archive aggregation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    Average,
    Min,
    Max,
}

impl AggregationType {
    fn to_u32(self) -> u32 {
        match self {
            AggregationType::Average => 0,
            AggregationType::Min => 1,
            AggregationType::Max => 2,
        }
    }

    fn from_u32(raw: u32) -> Result<Self, Error> {
        match raw {
            0 => Ok(AggregationType::Average),
            1 => Ok(AggregationType::Min),
            2 => Ok(AggregationType::Max),
            other => Err(Error::InvalidConfig(format!("unknown aggregation_type tag {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AggregationType::Average => "average",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
        }
    }
}

pub const TIMEZONE_FIELD_LEN: usize = 64;

/// Fixed-size file header. Byte-exact layout, all integers little-endian:
///
/// ```text
/// series_type     i64   (0=period,1=gauge,2=counter)
/// start_epoch     i64
/// interval        u32
/// archive_count   u32
/// timezone_name   [u8; 64], NUL-padded UTF-8
/// last_epoch      i64
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub series_type: SeriesType,
    pub start_epoch: i64,
    pub interval: u32,
    pub archive_count: u32,
    pub timezone_name: String,
    pub last_epoch: i64,
}

impl Header {
    pub const SIZE: usize = 8 + 8 + 4 + 4 + TIMEZONE_FIELD_LEN + 8;
    /// Byte offset of `last_epoch` within the header, so the engine can
    /// rewrite it alone after every `update`.
    pub const LAST_EPOCH_OFFSET: usize = 8 + 8 + 4 + 4 + TIMEZONE_FIELD_LEN;

    pub fn to_bytes(&self) -> Result<[u8; Self::SIZE], Error> {
        if self.timezone_name.as_bytes().len() > TIMEZONE_FIELD_LEN {
            return Err(Error::InvalidConfig(format!(
                "timezone name {:?} exceeds {TIMEZONE_FIELD_LEN} bytes",
                self.timezone_name
            )));
        }
        let mut out = [0u8; Self::SIZE];
        let mut pos = 0;
        out[pos..pos + 8].copy_from_slice(&self.series_type.to_u64().to_le_bytes());
        pos += 8;
        out[pos..pos + 8].copy_from_slice(&self.start_epoch.to_le_bytes());
        pos += 8;
        out[pos..pos + 4].copy_from_slice(&self.interval.to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.archive_count.to_le_bytes());
        pos += 4;
        let name_bytes = self.timezone_name.as_bytes();
        out[pos..pos + name_bytes.len()].copy_from_slice(name_bytes);
        pos += TIMEZONE_FIELD_LEN;
        out[pos..pos + 8].copy_from_slice(&self.last_epoch.to_le_bytes());
        Ok(out)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < Self::SIZE {
            return Err(Error::Internal("truncated header".into()));
        }
        let mut pos = 0;
        let series_type = SeriesType::from_u64(u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap()))?;
        pos += 8;
        let start_epoch = i64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let interval = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let archive_count = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let name_raw = &buf[pos..pos + TIMEZONE_FIELD_LEN];
        let nul = name_raw.iter().position(|&b| b == 0).unwrap_or(name_raw.len());
        let timezone_name = std::str::from_utf8(&name_raw[..nul])
            .map_err(|_| Error::Internal("corrupt timezone_name field".into()))?
            .to_owned();
        pos += TIMEZONE_FIELD_LEN;
        let last_epoch = i64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        Ok(Self {
            series_type,
            start_epoch,
            interval,
            archive_count,
            timezone_name,
            last_epoch,
        })
    }
}

/// Per-archive metadata record. Byte-exact layout, little-endian:
///
/// ```text
/// aggregation_type    u32 (0=average,1=min,2=max)
/// aggregation         u32
/// count                u32
/// cycles               u32
/// position             u32
/// threshold            f32
/// state_accumulator    f32
/// state_sample_count   f32
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveMeta {
    pub aggregation_type: AggregationType,
    pub aggregation: u32,
    pub count: u32,
    pub cycles: u32,
    pub position: u32,
    pub threshold: f32,
    pub state_accumulator: f32,
    pub state_sample_count: f32,
}

impl ArchiveMeta {
    pub const SIZE: usize = 4 * 5 + 4 * 3;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let mut pos = 0;
        out[pos..pos + 4].copy_from_slice(&self.aggregation_type.to_u32().to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.aggregation.to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.count.to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.cycles.to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.position.to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.threshold.to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.state_accumulator.to_le_bytes());
        pos += 4;
        out[pos..pos + 4].copy_from_slice(&self.state_sample_count.to_le_bytes());
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < Self::SIZE {
            return Err(Error::Internal("truncated archive metadata".into()));
        }
        let mut pos = 0;
        let aggregation_type = AggregationType::from_u32(u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()))?;
        pos += 4;
        let aggregation = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let count = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let cycles = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let position = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let threshold = f32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let state_accumulator = f32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let state_sample_count = f32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        Ok(Self {
            aggregation_type,
            aggregation,
            count,
            cycles,
            position,
            threshold,
            state_accumulator,
            state_sample_count,
        })
    }
}

pub const VALUE_SIZE: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let h = Header {
            series_type: SeriesType::Counter,
            start_epoch: 1_293_840_000,
            interval: 1800,
            archive_count: 3,
            timezone_name: "Europe/London".into(),
            last_epoch: 1_293_900_000,
        };
        let bytes = h.to_bytes().unwrap();
        assert_eq!(bytes.len(), Header::SIZE);
        let back = Header::from_bytes(&bytes).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn header_rejects_oversize_timezone() {
        let h = Header {
            series_type: SeriesType::Period,
            start_epoch: 0,
            interval: 60,
            archive_count: 0,
            timezone_name: "x".repeat(TIMEZONE_FIELD_LEN + 1),
            last_epoch: 0,
        };
        assert!(h.to_bytes().is_err());
    }

    #[test]
    fn archive_meta_round_trip() {
        let m = ArchiveMeta {
            aggregation_type: AggregationType::Min,
            aggregation: 20,
            count: 2000,
            cycles: 4,
            position: 75,
            threshold: 0.5,
            state_accumulator: f32::NAN,
            state_sample_count: 0.0,
        };
        let bytes = m.to_bytes();
        assert_eq!(bytes.len(), ArchiveMeta::SIZE);
        let back = ArchiveMeta::from_bytes(&bytes).unwrap();
        assert_eq!(back.aggregation_type, m.aggregation_type);
        assert_eq!(back.aggregation, m.aggregation);
        assert_eq!(back.count, m.count);
        assert_eq!(back.cycles, m.cycles);
        assert_eq!(back.position, m.position);
        assert_eq!(back.threshold, m.threshold);
        assert!(back.state_accumulator.is_nan());
        assert_eq!(back.state_sample_count, m.state_sample_count);
    }
}
