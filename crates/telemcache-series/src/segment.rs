//! Stored cache segments

use telemcache_common::{Series, TimeRange};

/// One stored time range and the sample arrays covering it.
///
/// Arrays are kept in time order. A segment may hold no samples at all,
/// which records that the range was fetched and found empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    range: TimeRange,
    series: Vec<Series>,
}

impl Segment {
    pub(crate) fn new(range: TimeRange, series: Vec<Series>) -> Self {
        Self {
            range,
            series: series.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    /// Time covered by this segment
    #[must_use]
    pub const fn range(&self) -> TimeRange {
        self.range
    }

    /// Sample arrays, in time order
    #[must_use]
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// Total number of samples
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }

    /// Samples falling inside `range`, dropping arrays left empty
    pub(crate) fn slice_time(&self, range: &TimeRange) -> impl Iterator<Item = Series> + '_ {
        let range = *range;
        self.series
            .iter()
            .map(move |s| s.slice_time(&range))
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn into_series(self) -> Vec<Series> {
        self.series
    }
}
