pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, UowError};
pub use types::{IdentityKey, Record};
pub use value::Value;
