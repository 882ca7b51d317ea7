//! Git operations.
//!
//! [`adapter`] is a thin subprocess wrapper over every git invocation this
//! tool makes; [`clonecache`] layers a shared local clone cache on top of it
//! so repeated clones of the same URL reuse objects instead of fetching
//! them again.

pub mod adapter;
pub mod clonecache;
