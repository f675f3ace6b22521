//! Tree searches over a store.
//!
//! Both entry points take the store by reference, so any [`VfsOps`]
//! implementation can be searched and nothing here holds global state.
//!
//! - [`glob`] - multi-pattern discovery relative to a base directory
//! - [`find`] - attribute-filtered queries with depth bounds and pruning
//!
//! [`VfsOps`]: crate::vfs::VfsOps

mod filters;
mod find;
mod walker;

pub use filters::{Comparison, NameFilter, SizeFilter, TimeFilter};
pub use find::{FindOptions, FindResult, find};
pub use walker::{GlobOptions, glob};
