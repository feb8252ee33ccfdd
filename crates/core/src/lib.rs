//! Pure domain logic for the prompt template engine.
//!
//! Nothing in this crate performs I/O. Storage lives in `promptline-db` and
//! orchestration in `promptline-engine`; both call into the functions here
//! with data they have already loaded.

pub mod cache;
pub mod diff;
pub mod diff_format;
pub mod error;
pub mod parameter;
pub mod pdf;
pub mod render;
pub mod template;
pub mod types;
pub mod value;
pub mod version_log;
