mod byte_view;
pub mod dbformat;
pub mod env;
mod error;
pub mod iterator;
pub mod memtable;
pub mod options;
pub mod util;

pub use byte_view::ByteView;
pub use error::{Error, Result};
pub use options::{Compression, Options, ReadOptions, WriteOptions};
