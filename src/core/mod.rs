//! Core quote resolution logic

pub mod cache;
pub mod config;
pub mod html;
pub mod identifier;
pub mod log;
pub mod numeric;
pub mod quote;
pub mod ranking;
pub mod resolver;
pub mod source;

// Re-export main types for cleaner imports
pub use cache::KeyValueCollection;
pub use quote::{QuoteRow, SourceTag};
pub use resolver::QuoteResolver;
pub use source::QuoteSource;
