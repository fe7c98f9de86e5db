//! # Survey Store
//!
//! The two tidy tables (`individuals_by_method`, `individuals_by_site`) kept
//! in DuckDB, with typed CRUD, whole-table replacement and CSV export.

pub mod column;
pub mod export;
pub mod repository;
pub mod table;

pub use repository::ListQuery;
pub use repository::Repository;
pub use repository::SortKey;
pub use repository::TableRow;
pub use table::Table;
