//! The lazy sequence abstraction.
//!
//! A [`View`] only has to answer two questions about its backing source: how
//! many elements match ([`View::get_len`]), and which elements sit at a given
//! position ([`View::get_slice`]). Everything a caller actually uses (single
//! index lookup, half-open ranges with a step, pages) is derived from those
//! two primitives here, so every concrete query shares the same arithmetic.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::ops::{Bound, RangeBounds};

/// Number of elements picked when taking every `stride`-th element out of
/// `span` consecutive elements (`ceil(span / stride)`).
pub fn strided_len(span: u64, stride: u64) -> u64 {
    if stride == 0 {
        return 0;
    }
    span.div_ceil(stride)
}

/// Number of pages of `size` elements needed to show `len` elements.
pub fn page_count(len: u64, size: u64) -> u64 {
    if size == 0 {
        return 0;
    }
    len.div_ceil(size)
}

/// Resolve any range expression into a half-open `[start, stop)` pair.
fn bounds(range: &impl RangeBounds<u64>) -> (u64, u64) {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let stop = match range.end_bound() {
        Bound::Included(&end) => end.saturating_add(1),
        Bound::Excluded(&end) => end,
        Bound::Unbounded => u64::MAX,
    };
    (start, stop)
}

/// An index-addressable, length-aware sequence whose elements are fetched on
/// demand from a backing source.
///
/// Implementors provide [`get_slice`](Self::get_slice) and
/// [`get_len`](Self::get_len); the remaining methods are derived from them and
/// should not normally be overridden (the exception being
/// [`len`](Self::len), which [`CachingView`](crate::CachingView) memoizes).
///
/// A view is never materialized: every lookup goes back to the source, so
/// iterating twice costs twice.
///
/// # Contract
///
/// - `get_slice` and `get_len` observe the same filter and the same total
///   order over the source.
/// - Identical calls against an unchanged source return identical results.
/// - The stride is applied over the full ordered result, not per fetched
///   chunk: `get_slice(start, count, stride)` returns the elements at
///   positions `start, start + stride, start + 2 * stride, ...`.
pub trait View: Sync {
    type Item: Send;

    /// Starting at the `start`-th element, return every `stride`-th element
    /// until `count` elements have been taken or the source is exhausted.
    ///
    /// Callers guarantee `stride >= 1`; use [`slice`](Self::slice) for the
    /// validated entry point.
    fn get_slice(&self, start: u64, count: u64, stride: u64) -> impl Future<Output = Result<Vec<Self::Item>>> + Send;

    /// Current number of elements in the source.
    fn get_len(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Number of elements in the view.
    fn len(&self) -> impl Future<Output = Result<u64>> + Send {
        self.get_len()
    }

    fn is_empty(&self) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.len().await? == 0) }
    }

    /// Validated form of [`get_slice`](Self::get_slice).
    ///
    /// Returns `min(count, ceil((len - start) / stride))` elements. A zero
    /// `count` returns nothing without touching the source; a zero `stride`
    /// fails with [`ErrorKind::InvalidArgument`] before touching the source.
    fn slice(&self, start: u64, count: u64, stride: u64) -> impl Future<Output = Result<Vec<Self::Item>>> + Send {
        async move {
            if stride == 0 {
                exn::bail!(ErrorKind::InvalidArgument("stride must be at least 1"));
            }
            if count == 0 {
                return Ok(Vec::new());
            }
            let len = self.len().await?;
            if start >= len {
                return Ok(Vec::new());
            }
            let count = count.min(strided_len(len - start, stride));
            self.get_slice(start, count, stride).await
        }
    }

    /// The element at `index`, or [`ErrorKind::OutOfRange`] outside `[0, len)`.
    fn get(&self, index: u64) -> impl Future<Output = Result<Self::Item>> + Send {
        async move {
            let len = self.len().await?;
            if index >= len {
                exn::bail!(ErrorKind::OutOfRange { index, len });
            }
            // The source may have shrunk since its length was last observed.
            self.get_slice(index, 1, 1)
                .await?
                .into_iter()
                .next()
                .ok_or_raise(|| ErrorKind::OutOfRange { index, len })
        }
    }

    /// Every `stride`-th element of `range`, with the range clipped to the
    /// current length.
    ///
    /// ```text
    /// view.range(2..9, 3)   // positions 2, 5, 8
    /// view.range(.., 2)     // every other element
    /// ```
    fn range<R>(&self, range: R, stride: u64) -> impl Future<Output = Result<Vec<Self::Item>>> + Send
    where
        R: RangeBounds<u64> + Send,
    {
        async move {
            if stride == 0 {
                exn::bail!(ErrorKind::InvalidArgument("stride must be at least 1"));
            }
            let (start, stop) = bounds(&range);
            if stop <= start {
                return Ok(Vec::new());
            }
            let stop = stop.min(self.len().await?);
            if stop <= start {
                return Ok(Vec::new());
            }
            self.get_slice(start, strided_len(stop - start, stride), stride).await
        }
    }

    /// The `index`-th page of `size` elements; empty past the last page.
    fn page(&self, index: u64, size: u64) -> impl Future<Output = Result<Vec<Self::Item>>> + Send {
        async move {
            if size == 0 {
                exn::bail!(ErrorKind::InvalidArgument("page size must be at least 1"));
            }
            let start = index.saturating_mul(size);
            self.range(start..start.saturating_add(size), 1).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Numbers;
    use rstest::rstest;

    #[rstest]
    #[case(10, 0, 10, 1, 10)]
    #[case(10, 0, 100, 1, 10)]
    #[case(10, 3, 4, 1, 4)]
    #[case(10, 0, 10, 3, 4)]
    #[case(10, 1, 10, 3, 3)]
    #[case(10, 9, 5, 2, 1)]
    #[case(10, 10, 5, 1, 0)]
    #[case(10, 42, 5, 1, 0)]
    #[case(0, 0, 5, 1, 0)]
    #[tokio::test]
    async fn test_slice_length(
        #[case] len: u64,
        #[case] start: u64,
        #[case] count: u64,
        #[case] stride: u64,
        #[case] expected: usize,
    ) {
        let view = Numbers::up_to(len);
        let items = view.slice(start, count, stride).await.unwrap();
        assert_eq!(items.len(), expected);
        let available = len.saturating_sub(start);
        assert_eq!(expected as u64, count.min(strided_len(available, stride)));
    }

    #[tokio::test]
    async fn test_slice_applies_stride_over_full_order() {
        let view = Numbers::up_to(10);
        assert_eq!(view.slice(1, 10, 3).await.unwrap(), vec![1, 4, 7]);
    }

    #[tokio::test]
    async fn test_zero_stride_is_rejected_before_touching_store() {
        let view = Numbers::up_to(10);
        let err = view.slice(0, 5, 0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        let err = view.range(0..5, 0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
        assert_eq!(view.len_calls(), 0);
        assert_eq!(view.slice_calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_count_skips_store() {
        let view = Numbers::up_to(10);
        assert!(view.slice(3, 0, 1).await.unwrap().is_empty());
        assert!(view.range(5..5, 1).await.unwrap().is_empty());
        assert!(view.range(7..2, 1).await.unwrap().is_empty());
        assert_eq!(view.len_calls(), 0);
        assert_eq!(view.slice_calls(), 0);
    }

    #[tokio::test]
    async fn test_start_past_end_is_empty() {
        let view = Numbers::up_to(3);
        assert!(view.slice(3, 1, 1).await.unwrap().is_empty());
        assert!(view.range(8.., 1).await.unwrap().is_empty());
        assert_eq!(view.slice_calls(), 0);
    }

    #[tokio::test]
    async fn test_get() {
        let view = Numbers::up_to(5);
        assert_eq!(view.get(0).await.unwrap(), 0);
        assert_eq!(view.get(4).await.unwrap(), 4);
        let err = view.get(5).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::OutOfRange { index: 5, len: 5 }));
    }

    #[tokio::test]
    async fn test_range_with_stride() {
        let view = Numbers::up_to(10);
        assert_eq!(view.range(2..9, 3).await.unwrap(), vec![2, 5, 8]);
        assert_eq!(view.range(2..=8, 3).await.unwrap(), vec![2, 5, 8]);
        assert_eq!(view.range(.., 4).await.unwrap(), vec![0, 4, 8]);
    }

    #[tokio::test]
    async fn test_range_is_clipped_to_length() {
        let view = Numbers::up_to(4);
        assert_eq!(view.range(1..100, 1).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pages() {
        let view = Numbers::up_to(10);
        assert_eq!(view.page(0, 4).await.unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(view.page(2, 4).await.unwrap(), vec![8, 9]);
        assert!(view.page(3, 4).await.unwrap().is_empty());
        let err = view.page(0, 0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArgument(_)));
    }

    #[rstest]
    #[case(0, 10, 0)]
    #[case(1, 10, 1)]
    #[case(10, 10, 1)]
    #[case(11, 10, 2)]
    #[case(5, 0, 0)]
    fn test_page_count(#[case] len: u64, #[case] size: u64, #[case] expected: u64) {
        assert_eq!(page_count(len, size), expected);
    }

    #[tokio::test]
    async fn test_is_empty() {
        assert!(Numbers::up_to(0).is_empty().await.unwrap());
        assert!(!Numbers::up_to(1).is_empty().await.unwrap());
    }
}
