//! # hyrenet-io: configuration access
//!
//! Everything that touches the file system on behalf of a build:
//!
//! - [`ConfigRepository`]: allow-listed CSV loading below a data root with
//!   soft failures recorded as diagnostics
//! - [`path_security`]: plain-name and containment checks for every path
//! - [`Table`] / [`Row`]: header-keyed string cells with typed accessors
//! - [`ProfileTable`]: timestamp-indexed profile files
//! - [`TechnologyLibraryResolver`]: validated, cached technology libraries

pub mod path_security;
pub mod profile;
pub mod repository;
pub mod table;
pub mod tech_library;

pub use path_security::{PathGuard, PathSecurityError, SecurePath};
pub use profile::ProfileTable;
pub use repository::{Category, ConfigRepository, PROFILE_TYPES};
pub use table::{InvalidCell, Row, Table};
pub use tech_library::{TechClass, TechLibrary, TechnologyLibraryResolver, TechnologySpec};
