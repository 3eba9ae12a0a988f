mod dir_fs;
mod entry;
mod map_fs;

pub use dir_fs::DirFS;
pub(crate) use entry::Entry;
pub use entry::{EntryType, Metadata};
pub use map_fs::MapFS;
