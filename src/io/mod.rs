//! Random-access storage: the store trait, the write-back window cache,
//! and bounded streams over a span of a store.

mod adapter;
mod buffered;
mod range;
mod store;

pub use adapter::StoreCursor;
pub use buffered::{BufferedStore, DEFAULT_WINDOW_BITS, MAX_WINDOW_BITS, MIN_WINDOW_BITS};
pub use range::{RangeStream, copy_range};
pub use store::{RandomAccess, StoreRef, share};
