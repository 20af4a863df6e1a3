//! This crate's one fallible boundary — rejecting an invalid snapshot
//! field — reuses [`zx_core::CoreError`] rather than defining a parallel
//! type: a rejected snapshot field is exactly the host-boundary failure
//! `CoreError` exists for.

pub use zx_core::CoreError as Error;
