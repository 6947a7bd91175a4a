pub mod cache;
pub mod error;
pub mod matcher;
pub mod paginate;
pub mod reconcile;
pub mod spotify;
pub mod traits;

pub use cache::{Cache, DiskCache, MemoryCache};
pub use error::{Result, SpotmoverError};
pub use matcher::Matcher;
pub use reconcile::{ReconcileOptions, Reconciler};
pub use traits::{Authenticator, CatalogProvider, Confirm, LibrarySource, Session};
