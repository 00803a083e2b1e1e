pub mod content;
pub mod image;
pub mod sanitize;
pub mod serde_helpers;
pub mod slug;
pub mod validation;
