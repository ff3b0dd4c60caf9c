//! Typed sample arrays
//!
//! A [`Series`] is one buffer of samples for a single channel, with one
//! timestamp per sample. Fixed-density types are packed little-endian;
//! variable-density types (`String`, `Json`) are newline-terminated.
//! Sample data is held in [`Bytes`], so clones and slices share the buffer.

use crate::error::{Error, Result};
use crate::search;
use crate::telem::{TimeRange, TimeSpan, TimeStamp};
use crate::types::DataType;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// A buffer of timestamped samples of one data type
#[derive(Clone, PartialEq)]
pub struct Series {
    data_type: DataType,
    timestamps: Arc<[TimeStamp]>,
    data: Bytes,
    /// Byte offset of each sample start plus the end offset. Empty for
    /// fixed-density types.
    offsets: Arc<[usize]>,
}

impl Series {
    /// Build a series, validating that `data` holds exactly one sample per
    /// timestamp and that timestamps are non-decreasing.
    pub fn new(
        data_type: DataType,
        timestamps: Vec<TimeStamp>,
        data: impl Into<Bytes>,
    ) -> Result<Self> {
        let data = data.into();
        check_sorted(&timestamps)?;

        let offsets: Vec<usize> = match data_type.density() {
            Some(density) => {
                let expected = timestamps.len() * density;
                if data.len() != expected {
                    return Err(Error::invalid_argument(format!(
                        "{data_type} series with {} samples needs {expected} bytes, got {}",
                        timestamps.len(),
                        data.len()
                    )));
                }
                Vec::new()
            }
            None => {
                let mut offsets = Vec::with_capacity(timestamps.len() + 1);
                offsets.push(0);
                offsets.extend(
                    data.iter()
                        .enumerate()
                        .filter(|(_, b)| **b == b'\n')
                        .map(|(i, _)| i + 1),
                );
                let samples = offsets.len() - 1;
                if samples != timestamps.len() || offsets.last() != Some(&data.len()) {
                    return Err(Error::invalid_argument(format!(
                        "{data_type} series must hold {} newline-terminated samples, found {samples}",
                        timestamps.len()
                    )));
                }
                offsets
            }
        };

        Ok(Self {
            data_type,
            timestamps: timestamps.into(),
            data,
            offsets: offsets.into(),
        })
    }

    /// Float64 series from native values
    pub fn from_f64(timestamps: Vec<TimeStamp>, values: &[f64]) -> Result<Self> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DataType::Float64, timestamps, data)
    }

    /// String series from native values. Values must not contain newlines.
    pub fn from_strings<S: AsRef<str>>(timestamps: Vec<TimeStamp>, values: &[S]) -> Result<Self> {
        let mut data = Vec::new();
        for value in values {
            let value = value.as_ref();
            if value.contains('\n') {
                return Err(Error::invalid_argument(
                    "string samples cannot contain newlines",
                ));
            }
            data.extend_from_slice(value.as_bytes());
            data.push(b'\n');
        }
        Self::new(DataType::String, timestamps, data)
    }

    /// Timestamp series whose values are its own timestamps, as stored for
    /// an index channel
    pub fn index(timestamps: Vec<TimeStamp>) -> Result<Self> {
        let data: Vec<u8> = timestamps
            .iter()
            .flat_map(|ts| ts.nanos().to_le_bytes())
            .collect();
        Self::new(DataType::Timestamp, timestamps, data)
    }

    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    #[must_use]
    pub fn timestamps(&self) -> &[TimeStamp] {
        &self.timestamps
    }

    /// Raw sample bytes
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Time covered by the samples: first timestamp up to just past the last
    #[must_use]
    pub fn time_range(&self) -> Option<TimeRange> {
        let first = *self.timestamps.first()?;
        let last = *self.timestamps.last()?;
        Some(TimeRange::new(first, last.saturating_add(TimeSpan::NANOSECOND)))
    }

    /// Decode a float64 series
    #[must_use]
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        (self.data_type == DataType::Float64).then(|| {
            self.data
                .chunks_exact(8)
                .map(|chunk| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(chunk);
                    f64::from_le_bytes(buf)
                })
                .collect()
        })
    }

    /// Samples whose timestamp lies in `range`. Shares the underlying buffer.
    #[must_use]
    pub fn slice_time(&self, range: &TimeRange) -> Self {
        let lo = search::lower_bound(&self.timestamps, &range.start, |ts| *ts);
        let hi = search::lower_bound(&self.timestamps, &range.end, |ts| *ts).max(lo);
        self.slice(lo, hi)
    }

    /// Samples `lo..hi` by index
    fn slice(&self, lo: usize, hi: usize) -> Self {
        if lo == 0 && hi == self.len() {
            return self.clone();
        }
        let (start, end) = self.byte_bounds(lo, hi);
        let offsets: Arc<[usize]> = if self.data_type.is_variable() {
            self.offsets[lo..=hi].iter().map(|o| o - start).collect()
        } else {
            Arc::from([])
        };
        Self {
            data_type: self.data_type,
            timestamps: Arc::from(&self.timestamps[lo..hi]),
            data: self.data.slice(start..end),
            offsets,
        }
    }

    fn byte_bounds(&self, lo: usize, hi: usize) -> (usize, usize) {
        match self.data_type.density() {
            Some(density) => (lo * density, hi * density),
            None => (self.offsets[lo], self.offsets[hi]),
        }
    }
}

fn check_sorted(timestamps: &[TimeStamp]) -> Result<()> {
    if timestamps.windows(2).all(|w| w[0] <= w[1]) {
        Ok(())
    } else {
        Err(Error::invalid_argument(
            "series timestamps must be sorted ascending",
        ))
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("data_type", &self.data_type)
            .field("len", &self.len())
            .field("time_range", &self.time_range())
            .finish()
    }
}
