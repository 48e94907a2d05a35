use bytes::BytesMut;
use parking_lot::Mutex;

use crate::error::{ConfigError, Result};

/// Upper bound for a single backing region.
const MAX_REGION_SIZE: usize = 1024 * 1024 * 1024;

/// A fixed-size byte range carved out of a backing region.
///
/// A segment is handed to exactly one [`LogMessage`](crate::LogMessage) and
/// stays with it for the record's whole lifetime. The backing allocation is
/// reference counted by `bytes`, so it lives as long as any of its segments.
#[derive(Debug, Default)]
pub struct BufferSegment {
    data: BytesMut,
}

impl BufferSegment {
    /// Length of the segment in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Slices large backing regions into equally sized [`BufferSegment`]s.
///
/// Regions are allocated lazily, one at a time: when the current region has
/// issued `segment_count` segments, the next call allocates a fresh one.
/// This path only runs while the message pool is being filled, so a single
/// mutex is enough.
///
/// # Examples
///
/// ```
/// # use segment_logger::BufferSegmentProvider;
/// let provider = BufferSegmentProvider::new(4, 128).unwrap();
/// let segment = provider.get_segment();
/// assert_eq!(segment.len(), 128);
/// ```
#[derive(Debug)]
pub struct BufferSegmentProvider {
    segment_count: usize,
    segment_size: usize,
    state: Mutex<ProviderState>,
}

#[derive(Debug, Default)]
struct ProviderState {
    region: Option<BytesMut>,
    issued: usize,
    regions_allocated: usize,
}

impl BufferSegmentProvider {
    /// Creates a provider issuing `segment_count` segments of `segment_size`
    /// bytes per backing region.
    ///
    /// The region size is capped at 1 GiB: the segment size is clamped first,
    /// then the segment count is halved until the region fits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroSegmentSize`] or
    /// [`ConfigError::ZeroSegmentCount`] when either argument is zero.
    pub fn new(segment_count: usize, segment_size: usize) -> Result<Self> {
        if segment_size == 0 {
            return Err(ConfigError::ZeroSegmentSize);
        }
        if segment_count == 0 {
            return Err(ConfigError::ZeroSegmentCount);
        }

        let (segment_count, segment_size) = region_layout(segment_count, segment_size);

        Ok(Self {
            segment_count,
            segment_size,
            state: Mutex::new(ProviderState::default()),
        })
    }

    /// Size of every pooled segment, after clamping.
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Segments issued per backing region, after clamping.
    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Number of backing regions allocated so far.
    pub fn regions_allocated(&self) -> usize {
        self.state.lock().regions_allocated
    }

    /// Hands out the next segment, allocating a new region when needed.
    pub fn get_segment(&self) -> BufferSegment {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.issued == self.segment_count {
            state.region = None;
        }

        if state.region.is_none() {
            let region_size = self.segment_count * self.segment_size;
            tracing::debug!(
                region_size,
                segment_size = self.segment_size,
                "allocating buffer segment region"
            );
            state.region = Some(BytesMut::zeroed(region_size));
            state.issued = 0;
            state.regions_allocated += 1;
        }

        let data = match state.region.as_mut() {
            Some(region) => region.split_to(self.segment_size),
            None => BytesMut::zeroed(self.segment_size),
        };
        state.issued += 1;

        BufferSegment { data }
    }

    /// Allocates a segment outside of the pooled regions.
    ///
    /// Used for records created on demand (pool overflow, diagnostics).
    pub fn create_standalone_segment(size: usize) -> BufferSegment {
        BufferSegment {
            data: BytesMut::zeroed(size),
        }
    }
}

/// Applies the region size cap to a requested layout.
fn region_layout(mut segment_count: usize, segment_size: usize) -> (usize, usize) {
    let segment_size = segment_size.min(MAX_REGION_SIZE);

    while segment_count > 1
        && segment_count
            .checked_mul(segment_size)
            .map_or(true, |size| size > MAX_REGION_SIZE)
    {
        segment_count /= 2;
    }

    (segment_count, segment_size)
}
