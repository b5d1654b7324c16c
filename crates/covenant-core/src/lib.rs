pub mod error;
pub mod id;
pub mod value;
pub mod violation;

// Re-export commonly used types
pub use error::{CoreError, RuntimeError, UsageError};
pub use id::{FunctionId, ObjectId};
pub use value::{Function, NativeBody, Object, Value};
pub use violation::{ordinal, ArgName, Blame, ContractViolation, Frame};
