//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query functions.
//! Single-statement functions are generic over [`sqlx::PgExecutor`] so they
//! run against the pool or inside a caller's transaction; functions issuing
//! several statements take `&mut PgConnection`.

pub mod component_repo;
pub mod parameter_repo;
pub mod template_repo;
pub mod template_usage_repo;
pub mod version_log_repo;

pub use component_repo::ComponentRepo;
pub use parameter_repo::ParameterRepo;
pub use template_repo::TemplateRepo;
pub use template_usage_repo::TemplateUsageRepo;
pub use version_log_repo::VersionLogRepo;
