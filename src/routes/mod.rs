pub mod media;
pub mod posts;
