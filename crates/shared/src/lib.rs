pub mod context;
pub mod domain;
pub mod error;
pub mod langstring;
pub mod protocol;

pub use context::{Context, ContextError, OntoInfo};
pub use domain::DomainError;
pub use langstring::LangString;
