//! # grantkit
//!
//! Pure Rust library for reconciling MySQL-family access control.
//!
//! This crate provides functionality for:
//! - Normalizing privilege strings and building GRANT/REVOKE statements
//! - Parsing the TiDB `mysql.user`-style grants rows into typed grants
//! - Detecting the server dialect (MySQL, MariaDB, TiDB) and version
//! - Create/read/update/delete/import lifecycles for users, grants, roles,
//!   databases, global variables and placement policies
//! - Listing user accounts
//!
//! ## Example
//!
//! ```
//! use grantkit::privilege::normalize;
//! use grantkit::resource::grant::diff_privileges;
//!
//! assert_eq!(normalize("select (name, id)"), "SELECT(id, name)");
//!
//! let diff = diff_privileges(&["SELECT", "INSERT"], &["SELECT", "UPDATE"]);
//! assert_eq!(diff.to_revoke, vec!["INSERT".to_string()]);
//! ```
//!
//! ## Lifecycles
//!
//! Every resource type implements [`Lifecycle`]. A [`Provider`] wraps the
//! database handle, caches the detected server and serializes concurrent
//! changes to the same grantee.
//!
//! ```
//! use grantkit::backend::{MockDatabase, Row};
//! use grantkit::resource::{Lifecycle, RoleResource};
//! use grantkit::Provider;
//! use std::sync::Arc;
//!
//! let db = MockDatabase::new();
//! db.add_rows("SHOW ROLES", vec![Row::from_strs(&["analyst"])]);
//! let provider = Provider::new(Arc::new(db));
//!
//! let data = RoleResource.import(&provider, "analyst").unwrap();
//! assert_eq!(data.id(), Some("analyst"));
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod data;
pub mod entity;
pub mod error;
pub mod grant;
pub mod locks;
pub mod parser;
pub mod privilege;
pub mod provider;
pub mod resource;
pub mod server;

pub use data::{Attributes, ResourceData, Value};
pub use entity::{Entity, EntityKind, Grantee};
pub use error::{Error, ErrorCategory, Result};
pub use grant::{Grant, PrivilegeGrant, RoleGrant};
pub use provider::Provider;
pub use resource::Lifecycle;
pub use server::{Dialect, ServerInfo, ServerVersion};
