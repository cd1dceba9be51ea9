pub mod catalog;
pub mod memory;
pub mod orders;

pub use catalog::{CatalogError, CatalogReader, PgCatalog, ResolvedProduct, UserDirectory};
pub use orders::{OrderStore, SeaOrmOrderStore, StoreError};
