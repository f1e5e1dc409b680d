pub mod fs;
pub mod time;

pub use fs::ensure_parent_dir;
pub use time::utc_day_key;
