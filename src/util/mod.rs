mod arena;
mod coding;
mod comparator;
mod filter_policy;
mod hash;
mod random;

pub use arena::Arena;
pub use coding::*;
pub use comparator::{BytewiseComparator, Comparator};
pub use filter_policy::{BloomFilterPolicy, FilterPolicy};
pub use hash::hash;
pub use random::Random;
