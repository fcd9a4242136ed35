pub mod category;
pub mod summary;

pub use category::classify;
pub use summary::CommentParser;
