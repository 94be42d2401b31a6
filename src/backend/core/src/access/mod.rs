//! Role-gated read access.
//!
//! - **Roles**: `Role` and the explicit `RequestContext` passed into every query
//! - **Queries**: `EntityQueries` for lookups, listings and the admin disable action
//!
//! # Usage
//!
//! ```rust,ignore
//! use cms_core::access::{EntityQueries, RequestContext};
//!
//! let queries = EntityQueries::new(store);
//! let view = queries.get_by_id(&RequestContext::public("reader"), "doc-1").await?;
//! ```

pub mod queries;
pub mod roles;

pub use queries::{is_visible, EntityQueries, EntityView};
pub use roles::{RequestContext, Role};
