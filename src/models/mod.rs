pub mod enums;
pub mod encounter;
pub mod triage;

pub use enums::*;
pub use encounter::*;
pub use triage::*;

use thiserror::Error;

/// A string that does not map to any variant of a wire enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value for {field}: {value}")]
pub struct InvalidEnumValue {
    pub field: String,
    pub value: String,
}
