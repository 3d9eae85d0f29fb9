pub mod error;
pub mod escape;
pub mod serializer;
pub mod value;

// Re-export the types that users need
pub use error::AttrError;
pub use escape::{escape_html, Escaper, HtmlEscaper, SafeString};
pub use serializer::{serialize_attributes, serialize_value, RESERVED_KEY};
pub use value::{attrs_from_value, attrs_from_values, AttrItem, AttrMap, AttrValue, Scalar, Value};
