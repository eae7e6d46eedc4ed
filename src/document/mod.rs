mod core;
pub mod field;

pub use self::core::{Document, ID_FIELD, JsonMap, to_body};
