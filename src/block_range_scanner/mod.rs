//! Block-range plumbing shared by the scanners: splitting a range into bounded sub-ranges and
//! mapping wall-clock instants to block numbers.

mod locator;
mod range_iterator;

pub use locator::{locate_block, locate_block_at};
pub use range_iterator::RangeIterator;
