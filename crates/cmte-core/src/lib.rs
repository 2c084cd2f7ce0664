pub mod error;
pub mod navmap;
pub mod path;
pub mod provider;
pub mod value;

// Re-export commonly used types
pub use error::{CmteError, ErrorClass, Result};
pub use navmap::{NavigableMap, NodeValue, ResultItem};
pub use path::{parse_path, PathToken};
pub use provider::DataProvider;
pub use value::FieldValue;
