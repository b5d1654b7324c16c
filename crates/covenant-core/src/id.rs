//! Stable identity newtypes for host heap entities.
//!
//! Objects and functions are reference-counted, so pointer equality already
//! decides identity. The ids exist for diagnostics and for cheap, `Copy`
//! identity keys that survive the handle being dropped.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Object identity within the host heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// Function identity within the host heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

static NEXT_OBJECT_ID: AtomicU32 = AtomicU32::new(0);
static NEXT_FUNCTION_ID: AtomicU32 = AtomicU32::new(0);

impl ObjectId {
    /// Allocates a fresh, process-unique object id.
    pub fn fresh() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl FunctionId {
    /// Allocates a fresh, process-unique function id.
    pub fn fresh() -> Self {
        FunctionId(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
