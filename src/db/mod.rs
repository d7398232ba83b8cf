pub mod connection;
pub mod documents;
pub mod extractor;
pub mod introspection;
pub mod schema;

pub use connection::*;
pub use extractor::{extract, extract_with};
pub use introspection::*;
pub use schema::*;
