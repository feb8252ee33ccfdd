//! Row models and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and a create DTO for inserts. Rows never carry update
//! DTOs: versions are immutable apart from `is_active`.

pub mod component;
pub mod parameter;
pub mod template;
pub mod template_usage;
pub mod version_log;
