//! enos-wire: Wire value codec
//!
//! Converts between strongly typed tri-state attributes and the dynamically
//! typed value tree exchanged with the orchestration host.

pub mod attr;
pub mod error;
pub mod object;
pub mod path;
pub mod types;
pub mod value;

pub use attr::{Attr, Scalar, TfBool, TfNumber, TfString, TfStringList};
pub use error::DecodeError;
pub use object::{ObjectReader, ObjectWriter, WireObject};
pub use path::{AttributePath, PathStep};
pub use types::WireType;
pub use value::{Number, UNKNOWN_SENTINEL, Value};
