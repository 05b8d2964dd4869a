//! [`Fetcher`](modex_core::fetch::Fetcher) implementations.

mod dir;
mod memory;

pub use dir::DirFetcher;
pub use memory::MemoryFetcher;
