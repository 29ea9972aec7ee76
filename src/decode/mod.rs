pub mod timestamp;

pub use timestamp::extract_timestamp;
