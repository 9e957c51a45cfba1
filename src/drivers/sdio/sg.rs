//! Scatter-gather segment lists for CMD53
//!
//! A list describes several discontiguous caller buffers that the host moves
//! as one extended transfer. Lists are rebuilt for every transfer and hold at
//! most [`MAX_SG_SEGMENTS`] entries; appending past that fails instead of
//! dropping the buffer.

use core::marker::PhantomData;
use core::ptr::NonNull;

use super::SdioError;

/// Maximum number of segments in one list
pub const MAX_SG_SEGMENTS: usize = 8;

/// One buffer of a segment list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgSegment {
    addr: NonNull<u8>,
    len: usize,
}

impl SgSegment {
    /// Buffer start, for DMA descriptor setup
    pub fn address(&self) -> usize {
        self.addr.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Ordered segment list borrowing its buffers for `'a`
///
/// `B` records the kind of borrow: `&'a mut [u8]` for card-to-host lists,
/// `&'a [u8]` for host-to-card lists.
#[derive(Debug)]
pub struct SgList<'a, B> {
    segments: heapless::Vec<SgSegment, MAX_SG_SEGMENTS>,
    total_len: usize,
    _buffers: PhantomData<B>,
    _lifetime: PhantomData<&'a ()>,
}

/// Card-to-host segment list
pub type RxSgList<'a> = SgList<'a, &'a mut [u8]>;

/// Host-to-card segment list
pub type TxSgList<'a> = SgList<'a, &'a [u8]>;

impl<'a, B> SgList<'a, B> {
    /// Empty list
    pub const fn new() -> Self {
        Self {
            segments: heapless::Vec::new(),
            total_len: 0,
            _buffers: PhantomData,
            _lifetime: PhantomData,
        }
    }

    /// Segments in transfer order
    pub fn segments(&self) -> &[SgSegment] {
        &self.segments
    }

    /// Sum of all segment lengths
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push(&mut self, addr: NonNull<u8>, len: usize) -> Result<(), SdioError> {
        self.segments
            .push(SgSegment { addr, len })
            .map_err(|_| SdioError::SgOverflow)?;
        self.total_len += len;
        Ok(())
    }
}

impl<B> Default for SgList<'_, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> SgList<'a, &'a mut [u8]> {
    /// Append a receive buffer
    pub fn append(&mut self, buf: &'a mut [u8]) -> Result<(), SdioError> {
        let len = buf.len();
        self.push(NonNull::from(buf).cast(), len)
    }

    /// Copy `src` across the segments in order; returns the bytes copied
    pub fn scatter(&self, src: &[u8]) -> usize {
        let mut copied = 0;
        for seg in self.segments.iter() {
            if copied == src.len() {
                break;
            }
            let n = seg.len.min(src.len() - copied);
            // SAFETY: the segment came from a `&'a mut [u8]` that this list
            // keeps borrowed for `'a`, so nothing else aliases it.
            unsafe {
                core::ptr::copy_nonoverlapping(src[copied..].as_ptr(), seg.addr.as_ptr(), n);
            }
            copied += n;
        }
        copied
    }
}

impl<'a> SgList<'a, &'a [u8]> {
    /// Append a transmit buffer
    pub fn append(&mut self, buf: &'a [u8]) -> Result<(), SdioError> {
        let len = buf.len();
        self.push(NonNull::from(buf).cast(), len)
    }

    /// Copy the segments in order into `dst`; returns the bytes copied
    pub fn gather(&self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        for seg in self.segments.iter() {
            if copied == dst.len() {
                break;
            }
            let n = seg.len.min(dst.len() - copied);
            // SAFETY: the segment came from a `&'a [u8]` still borrowed by
            // this list; reads only.
            unsafe {
                core::ptr::copy_nonoverlapping(seg.addr.as_ptr(), dst[copied..].as_mut_ptr(), n);
            }
            copied += n;
        }
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_total() {
        let a = [1u8; 16];
        let b = [2u8; 32];
        let mut list = TxSgList::new();
        list.append(&a).unwrap();
        list.append(&b).unwrap();
        assert_eq!(list.segments().len(), 2);
        assert_eq!(list.total_len(), 48);
        assert_eq!(list.segments()[0].address(), a.as_ptr() as usize);
        assert_eq!(list.segments()[1].len(), 32);
    }

    #[test]
    fn test_overflow_is_reported_and_keeps_entries() {
        let bufs = [[0u8; 4]; MAX_SG_SEGMENTS + 1];
        let mut list = TxSgList::new();
        for buf in bufs[..MAX_SG_SEGMENTS].iter() {
            list.append(buf).unwrap();
        }
        let before: std::vec::Vec<SgSegment> = list.segments().to_vec();

        assert_eq!(list.append(&bufs[MAX_SG_SEGMENTS]), Err(SdioError::SgOverflow));
        assert_eq!(list.segments(), &before[..]);
        assert_eq!(list.total_len(), 4 * MAX_SG_SEGMENTS);
    }

    #[test]
    fn test_scatter_fills_in_order() {
        let mut a = [0u8; 3];
        let mut b = [0u8; 5];
        {
            let mut list = RxSgList::new();
            list.append(&mut a).unwrap();
            list.append(&mut b).unwrap();
            assert_eq!(list.scatter(&[1, 2, 3, 4, 5, 6, 7, 8]), 8);
        }
        assert_eq!(a, [1, 2, 3]);
        assert_eq!(b, [4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_scatter_short_source() {
        let mut a = [9u8; 4];
        {
            let mut list = RxSgList::new();
            list.append(&mut a).unwrap();
            assert_eq!(list.scatter(&[1, 2]), 2);
        }
        assert_eq!(a, [1, 2, 9, 9]);
    }

    #[test]
    fn test_gather_concatenates() {
        let a = [1u8, 2];
        let b = [3u8, 4, 5];
        let mut list = TxSgList::new();
        list.append(&a).unwrap();
        list.append(&b).unwrap();
        let mut out = [0u8; 5];
        assert_eq!(list.gather(&mut out), 5);
        assert_eq!(out, [1, 2, 3, 4, 5]);
    }
}
