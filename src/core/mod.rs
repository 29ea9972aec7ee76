pub mod bounds;
pub mod sentence;

pub use bounds::LogBounds;
pub use sentence::{checksum, classify, is_valid_sentence, SentenceKind};
