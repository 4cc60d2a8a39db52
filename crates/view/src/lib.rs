//! Lazy, length-caching views over paginated data sources.
//!
//! Result sets are never materialized. A [`View`] is an index-addressable
//! sequence that asks its backing source for one page at a time and for the
//! number of matching elements; [`CachingView`] memoizes that number and
//! drops it when the [`Notifier`] it subscribed to fires after a write.
//!
//! # Architecture
//! - **[`View`]**: two primitives (`get_slice`, `get_len`) implemented per
//!   query shape, plus the derived index, range and page arithmetic.
//! - **[`CachingView`]**: decorator memoizing the length only.
//! - **[`Notifier`]**: weak publish/subscribe channel owned by whoever
//!   mutates the source.
//!
//! ```
//! use shelf_view::{CachingView, Notifier, View};
//! # struct Squares;
//! # impl View for Squares {
//! #     type Item = u64;
//! #     async fn get_slice(&self, start: u64, count: u64, stride: u64) -> shelf_view::error::Result<Vec<u64>> {
//! #         Ok((start..10).step_by(stride as usize).take(count as usize).map(|n| n * n).collect())
//! #     }
//! #     async fn get_len(&self) -> shelf_view::error::Result<u64> { Ok(10) }
//! # }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> shelf_view::error::Result<()> {
//! let notifier = Notifier::new();
//! let squares = CachingView::subscribed(Squares, &notifier);
//! assert_eq!(squares.len().await?, 10);
//! assert_eq!(squares.range(1..8, 3).await?, vec![1, 16, 49]);
//! notifier.fire();
//! assert_eq!(squares.cached_len(), None);
//! # Ok(())
//! # }
//! ```

mod caching;
pub mod error;
mod notify;
mod sequence;

pub use crate::caching::CachingView;
pub use crate::notify::{Invalidate, Notifier};
pub use crate::sequence::{View, page_count, strided_len};
