//! Single-stream time-range cache
//!
//! Segments are kept sorted by start time and pairwise non-overlapping. A
//! write that overlaps or is adjacent to stored segments is merged into one
//! segment spanning all of them. Reads return the stored segments that
//! intersect the query, unclipped, together with the gaps the caller still
//! has to fetch.

use crate::segment::Segment;
use telemcache_common::search;
use telemcache_common::{
    DataType, Error, OverlapPolicy, Result, Series, SeriesConfig, TimeRange, TimeSpan,
};
use tracing::debug;

/// Result of a [`RangeCache::read`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadResult {
    /// Stored segments intersecting the query, in time order, not clipped
    pub segments: Vec<Segment>,
    /// Parts of the query no intersecting segment covers, in time order
    pub gaps: Vec<TimeRange>,
}

impl ReadResult {
    /// Whether the query is fully served from cache
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Samples in the returned segments
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.segments.iter().map(Segment::sample_count).sum()
    }
}

/// Sorted, non-overlapping segments of one stream
#[derive(Debug, Default)]
pub struct RangeCache {
    segments: Vec<Segment>,
    policy: OverlapPolicy,
    /// Bound on creation for a known channel, or by the first write
    data_type: Option<DataType>,
}

impl RangeCache {
    /// Create an empty cache with the default overlap policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: &SeriesConfig) -> Self {
        Self {
            policy: config.overlap_policy,
            ..Self::default()
        }
    }

    /// Create an empty cache that only accepts samples of `data_type`
    #[must_use]
    pub fn with_data_type(data_type: DataType, config: &SeriesConfig) -> Self {
        Self {
            data_type: Some(data_type),
            ..Self::with_config(config)
        }
    }

    #[must_use]
    pub const fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    #[must_use]
    pub const fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    /// Store `arrays` as the content of `range`.
    ///
    /// Every sample must lie inside `range`. An empty `arrays` records the
    /// range as fetched with no data. Writing a zero-length range does
    /// nothing.
    pub fn write(&mut self, range: TimeRange, mut arrays: Vec<Series>) -> Result<()> {
        if !range.is_valid() {
            return Err(Error::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        if range.is_zero() {
            debug!(%range, "Ignoring write of zero-length range");
            return Ok(());
        }
        let data_type = self.validate(&range, &arrays)?;
        arrays.retain(|s| !s.is_empty());
        arrays.sort_by_key(|s| s.timestamps()[0]);

        let touched = search::touching(&self.segments, &range, Segment::range);
        if touched.is_empty() {
            let idx = search::insert_sorted(
                &mut self.segments,
                Segment::new(range, arrays),
                |s| s.range().start,
            );
            debug!(%range, index = idx, segments = self.segments.len(), "Inserted segment");
        } else {
            let at = touched.start;
            let merged: Vec<Segment> = self.segments.drain(touched).collect();
            let bounds = merged.iter().fold(range, |acc, s| acc.union(&s.range()));
            debug!(
                %range,
                merged = merged.len(),
                result = %bounds,
                policy = ?self.policy,
                "Merging write into stored segments"
            );
            let series = match self.policy {
                OverlapPolicy::LastWriteWins => last_write_wins(&range, merged, arrays),
                OverlapPolicy::FirstWriteWins => first_write_wins(&range, merged, arrays),
            };
            self.segments.insert(at, Segment::new(bounds, series));
        }

        self.data_type = data_type;
        Ok(())
    }

    /// Stored segments intersecting `query` plus the uncovered parts of it.
    ///
    /// An intersecting segment is returned whole even where it extends past
    /// the query. Gaps between two intersecting segments are the exact space
    /// between them. A zero-length query covers no time, so nothing
    /// intersects it and the query itself is the only gap.
    pub fn read(&self, query: &TimeRange) -> Result<ReadResult> {
        if !query.is_valid() {
            return Err(Error::InvalidRange {
                start: query.start,
                end: query.end,
            });
        }
        if query.is_zero() {
            return Ok(ReadResult {
                segments: Vec::new(),
                gaps: vec![*query],
            });
        }

        let hit = &self.segments[search::overlapping(&self.segments, query, Segment::range)];
        let gaps = gaps_between(query, hit);
        debug!(%query, segments = hit.len(), gaps = gaps.len(), "Read from range cache");
        Ok(ReadResult {
            segments: hit.to_vec(),
            gaps,
        })
    }

    /// Stored segments, sorted by start
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of stored segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Samples held across all segments
    #[must_use]
    pub fn total_samples(&self) -> usize {
        self.segments.iter().map(Segment::sample_count).sum()
    }

    /// Total time covered by stored segments
    #[must_use]
    pub fn coverage(&self) -> TimeSpan {
        self.segments
            .iter()
            .fold(TimeSpan::ZERO, |acc, s| acc.saturating_add(s.range().span()))
    }

    /// Drop every segment. A bound data type is kept.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Check arrays against `range` and the bound data type, returning the
    /// data type to bind after a successful write
    fn validate(&self, range: &TimeRange, arrays: &[Series]) -> Result<Option<DataType>> {
        let mut bound = self.data_type;
        for series in arrays {
            match bound {
                Some(expected) if expected != series.data_type() => {
                    return Err(Error::DataTypeMismatch {
                        expected,
                        actual: series.data_type(),
                    });
                }
                Some(_) => {}
                None => bound = Some(series.data_type()),
            }
            if let Some(span) = series.time_range()
                && !range.contains_range(&span)
            {
                return Err(Error::invalid_argument(format!(
                    "samples spanning {span} fall outside written range {range}"
                )));
            }
        }
        Ok(bound)
    }
}

/// Incoming samples own `range`; stored samples survive only outside it
fn last_write_wins(range: &TimeRange, merged: Vec<Segment>, arrays: Vec<Series>) -> Vec<Series> {
    let mut series = Vec::new();
    if let Some(first) = merged.first() {
        let before = TimeRange::new(first.range().start, range.start);
        series.extend(first.slice_time(&before));
    }
    series.extend(arrays);
    if let Some(last) = merged.last() {
        let after = TimeRange::new(range.end, last.range().end);
        series.extend(last.slice_time(&after));
    }
    series
}

/// Stored samples are kept; incoming samples only fill time no stored
/// segment covers
fn first_write_wins(range: &TimeRange, merged: Vec<Segment>, arrays: Vec<Series>) -> Vec<Series> {
    let mut series: Vec<Series> = gaps_between(range, &merged)
        .iter()
        .flat_map(|gap| arrays.iter().map(move |s| s.slice_time(gap)))
        .filter(|s| !s.is_empty())
        .collect();
    series.extend(merged.into_iter().flat_map(Segment::into_series));
    series.sort_by_key(|s| s.timestamps()[0]);
    series
}

/// Leading, internal and trailing uncovered ranges of `query` given the
/// time-ordered `segments` that intersect it
fn gaps_between(query: &TimeRange, segments: &[Segment]) -> Vec<TimeRange> {
    let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
        return vec![*query];
    };

    let mut gaps = Vec::new();
    if query.start < first.range().start {
        gaps.push(TimeRange::new(query.start, first.range().start));
    }
    gaps.extend(segments.windows(2).filter_map(|pair| {
        let (prev, next) = (pair[0].range(), pair[1].range());
        (prev.end < next.start).then(|| TimeRange::new(prev.end, next.start))
    }));
    if query.end > last.range().end {
        gaps.push(TimeRange::new(last.range().end, query.end));
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use telemcache_common::TimeStamp;

    fn secs(s: i64) -> TimeStamp {
        TimeStamp::seconds(s)
    }

    /// One float sample per second across `[start, end)`, valued `value`
    fn samples(start: i64, end: i64, value: f64) -> Series {
        let stamps: Vec<TimeStamp> = (start..end).map(secs).collect();
        let values = vec![value; stamps.len()];
        Series::from_f64(stamps, &values).unwrap()
    }

    fn write_range(cache: &mut RangeCache, start: i64, end: i64, value: f64) {
        cache
            .write(TimeRange::seconds(start, end), vec![samples(start, end, value)])
            .unwrap();
    }

    fn values(segment: &Segment) -> Vec<f64> {
        segment
            .series()
            .iter()
            .flat_map(|s| s.as_f64().unwrap())
            .collect()
    }

    fn assert_sorted_disjoint(cache: &RangeCache) {
        for pair in cache.segments().windows(2) {
            let (prev, next) = (pair[0].range(), pair[1].range());
            assert!(prev.start < next.start, "unsorted: {prev} then {next}");
            assert!(prev.end < next.start, "overlapping or adjacent: {prev} and {next}");
        }
    }

    #[test]
    fn test_exact_match_read() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 1, 4, 1.0);

        let result = cache.read(&TimeRange::seconds(1, 4)).unwrap();
        assert_eq!(result.segments.len(), 1);
        assert!(result.gaps.is_empty());
        assert!(result.is_complete());
        assert_eq!(result.sample_count(), 3);
    }

    #[test]
    fn test_leading_and_trailing_gaps() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 2, 5, 1.0);

        let result = cache.read(&TimeRange::seconds(1, 7)).unwrap();
        assert_eq!(result.segments.len(), 1);
        assert_eq!(
            result.gaps,
            vec![TimeRange::seconds(1, 2), TimeRange::seconds(5, 7)]
        );
    }

    #[test]
    fn test_internal_gap() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 2, 5, 1.0);
        write_range(&mut cache, 6, 9, 2.0);

        let result = cache.read(&TimeRange::seconds(1, 8)).unwrap();
        assert_eq!(result.segments.len(), 2);
        assert_eq!(
            result.gaps,
            vec![TimeRange::seconds(1, 2), TimeRange::seconds(5, 6)]
        );
    }

    #[test]
    fn test_empty_cache_read() {
        let cache = RangeCache::new();
        let query = TimeRange::seconds(3, 10);

        let result = cache.read(&query).unwrap();
        assert!(result.segments.is_empty());
        assert_eq!(result.gaps, vec![query]);
    }

    #[test]
    fn test_segments_returned_unclipped() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 2, 9, 1.0);

        let result = cache.read(&TimeRange::seconds(1, 8)).unwrap();
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].range(), TimeRange::seconds(2, 9));
        assert_eq!(result.segments[0].sample_count(), 7);
        assert_eq!(result.gaps, vec![TimeRange::seconds(1, 2)]);
    }

    #[test]
    fn test_read_ignores_segments_sharing_only_a_boundary() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 0, 2, 1.0);
        write_range(&mut cache, 5, 7, 1.0);

        let result = cache.read(&TimeRange::seconds(2, 5)).unwrap();
        assert!(result.segments.is_empty());
        assert_eq!(result.gaps, vec![TimeRange::seconds(2, 5)]);
    }

    #[test]
    fn test_disjoint_writes_insert_sorted() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 10, 12, 1.0);
        write_range(&mut cache, 1, 3, 1.0);
        write_range(&mut cache, 5, 7, 1.0);

        let ranges: Vec<_> = cache.segments().iter().map(Segment::range).collect();
        assert_eq!(
            ranges,
            vec![
                TimeRange::seconds(1, 3),
                TimeRange::seconds(5, 7),
                TimeRange::seconds(10, 12)
            ]
        );
        assert_eq!(cache.total_samples(), 6);
        assert_eq!(cache.coverage(), TimeSpan::seconds(6));
    }

    #[test]
    fn test_adjacent_write_merges() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 1, 3, 1.0);
        write_range(&mut cache, 3, 5, 2.0);

        assert_eq!(cache.len(), 1);
        let segment = &cache.segments()[0];
        assert_eq!(segment.range(), TimeRange::seconds(1, 5));
        assert_eq!(values(segment), vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_write_bridging_segments_merges_all() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 2, 5, 1.0);
        write_range(&mut cache, 6, 9, 2.0);
        write_range(&mut cache, 12, 14, 3.0);
        write_range(&mut cache, 4, 7, 9.0);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.segments()[0].range(), TimeRange::seconds(2, 9));
        assert_eq!(
            values(&cache.segments()[0]),
            vec![1.0, 1.0, 9.0, 9.0, 9.0, 2.0, 2.0]
        );
        assert_eq!(cache.segments()[1].range(), TimeRange::seconds(12, 14));
    }

    #[test]
    fn test_last_write_wins_inside_existing() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 0, 6, 1.0);
        write_range(&mut cache, 2, 4, 5.0);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.segments()[0].range(), TimeRange::seconds(0, 6));
        assert_eq!(
            values(&cache.segments()[0]),
            vec![1.0, 1.0, 5.0, 5.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_first_write_wins_keeps_stored_samples() {
        let config = SeriesConfig {
            overlap_policy: OverlapPolicy::FirstWriteWins,
        };
        let mut cache = RangeCache::with_config(&config);
        write_range(&mut cache, 2, 4, 1.0);
        write_range(&mut cache, 6, 8, 2.0);
        write_range(&mut cache, 0, 10, 9.0);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.segments()[0].range(), TimeRange::seconds(0, 10));
        assert_eq!(
            values(&cache.segments()[0]),
            vec![9.0, 9.0, 1.0, 1.0, 9.0, 9.0, 2.0, 2.0, 9.0, 9.0]
        );
    }

    #[test]
    fn test_empty_write_records_coverage() {
        let mut cache = RangeCache::new();
        cache.write(TimeRange::seconds(1, 5), Vec::new()).unwrap();

        let result = cache.read(&TimeRange::seconds(0, 5)).unwrap();
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.sample_count(), 0);
        assert_eq!(result.gaps, vec![TimeRange::seconds(0, 1)]);
    }

    #[test]
    fn test_invalid_write_rejected() {
        let mut cache = RangeCache::new();
        let err = cache
            .write(TimeRange::seconds(5, 1), Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_length_write_is_noop() {
        let mut cache = RangeCache::new();
        cache.write(TimeRange::seconds(3, 3), Vec::new()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_samples_outside_range_rejected() {
        let mut cache = RangeCache::new();
        let err = cache
            .write(TimeRange::seconds(1, 3), vec![samples(1, 4, 1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(cache.is_empty());
        assert_eq!(cache.data_type(), None);
    }

    #[test]
    fn test_data_type_bound_by_first_write() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 0, 2, 1.0);
        assert_eq!(cache.data_type(), Some(DataType::Float64));

        let strings = Series::from_strings(vec![secs(3)], &["x"]).unwrap();
        let err = cache
            .write(TimeRange::seconds(3, 4), vec![strings])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DataTypeMismatch {
                expected: DataType::Float64,
                actual: DataType::String
            }
        ));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_data_type_bound_on_creation() {
        let mut cache = RangeCache::with_data_type(DataType::String, &SeriesConfig::default());
        let err = cache
            .write(TimeRange::seconds(0, 2), vec![samples(0, 2, 1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::DataTypeMismatch { .. }));
    }

    #[test]
    fn test_invalid_and_zero_queries() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 0, 5, 1.0);

        let err = cache.read(&TimeRange::seconds(4, 2)).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));

        let point = TimeRange::seconds(2, 2);
        let result = cache.read(&point).unwrap();
        assert!(result.segments.is_empty());
        assert_eq!(result.gaps, vec![point]);
    }

    #[test]
    fn test_coverage_saturates_for_huge_segments() {
        let mut cache = RangeCache::new();
        cache
            .write(TimeRange::new(TimeStamp::MIN, TimeStamp::ZERO), Vec::new())
            .unwrap();
        cache
            .write(TimeRange::new(TimeStamp::new(10), TimeStamp::MAX), Vec::new())
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.coverage(), TimeSpan::new(i64::MAX));
    }

    #[test]
    fn test_index_series_stays_inside_segment() {
        let mut cache = RangeCache::new();
        assert!(Series::index(vec![secs(5), secs(1), secs(3)]).is_err());

        let index = Series::index(vec![secs(4), secs(5)]).unwrap();
        cache.write(TimeRange::seconds(4, 6), vec![index]).unwrap();
        assert_eq!(cache.data_type(), Some(DataType::Timestamp));

        let segment = &cache.segments()[0];
        assert!(
            segment
                .series()
                .iter()
                .flat_map(|s| s.timestamps())
                .all(|ts| segment.range().contains_stamp(*ts))
        );
    }

    #[test]
    fn test_clear() {
        let mut cache = RangeCache::new();
        write_range(&mut cache, 0, 5, 1.0);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.coverage(), TimeSpan::ZERO);
        assert_eq!(cache.data_type(), Some(DataType::Float64));
    }

    #[test]
    fn test_non_overlap_invariant_random_writes() {
        for policy in [OverlapPolicy::LastWriteWins, OverlapPolicy::FirstWriteWins] {
            let mut rng = StdRng::seed_from_u64(0x7e1e);
            let mut cache = RangeCache::with_config(&SeriesConfig {
                overlap_policy: policy,
            });
            let mut written = Vec::new();

            for step in 0..500 {
                let start = rng.gen_range(0..1_000);
                let end = start + rng.gen_range(1..40);
                write_range(&mut cache, start, end, f64::from(step));
                written.push(TimeRange::seconds(start, end));
                assert_sorted_disjoint(&cache);
            }

            // Every written second is covered by exactly one sample
            let mut expected: Vec<i64> = written
                .iter()
                .flat_map(|r| r.start.nanos() / 1_000_000_000..r.end.nanos() / 1_000_000_000)
                .collect();
            expected.sort_unstable();
            expected.dedup();
            assert_eq!(cache.total_samples(), expected.len());

            for segment in cache.segments() {
                let stamps: Vec<TimeStamp> = segment
                    .series()
                    .iter()
                    .flat_map(|s| s.timestamps().iter().copied())
                    .collect();
                assert!(stamps.windows(2).all(|w| w[0] < w[1]));
                assert!(stamps.iter().all(|ts| segment.range().contains_stamp(*ts)));
            }
        }
    }

    #[test]
    fn test_read_after_random_writes_has_no_false_gaps() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut cache = RangeCache::new();
        for _ in 0..100 {
            let start = rng.gen_range(0..500);
            let end = start + rng.gen_range(1..20);
            write_range(&mut cache, start, end, 0.0);
        }

        for _ in 0..200 {
            let start = rng.gen_range(0..520);
            let query = TimeRange::seconds(start, start + rng.gen_range(1..60));
            let result = cache.read(&query).unwrap();

            for gap in &result.gaps {
                assert!(gap.start < gap.end);
                assert!(
                    cache
                        .segments()
                        .iter()
                        .all(|s| !s.range().overlaps_with(gap)),
                    "gap {gap} overlaps stored data"
                );
            }
            for pair in result.gaps.windows(2) {
                assert!(pair[0].end <= pair[1].start);
            }
        }
    }
}
