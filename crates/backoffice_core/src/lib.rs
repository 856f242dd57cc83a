//! List-management data layer of the back-office console: cached and
//! de-duplicated list fetches, debounced filters, pagination, sequence
//! reordering and response normalization, composed into list screens.

pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod filter;
pub mod memory;
pub mod normalize;
pub mod orchestrator;
pub mod pagination;
pub mod query;
pub mod reorder;
pub mod screen;
pub mod session;
pub mod transport;

pub use cache::RemoteDataCache;
pub use config::{load_settings, load_settings_from, ConsoleSettings};
pub use error::{ScreenError, TransportError};
pub use events::{Notification, NotificationLevel, ScreenEvent};
pub use filter::{default_fields, FilterController, FilterField, FilterKind};
pub use memory::InMemoryBackend;
pub use normalize::{normalize_list, CanonicalRow, ListResult, ResponseShape};
pub use orchestrator::{DataFetchOrchestrator, ListCache};
pub use pagination::{PageSize, Pagination, ALL_PAGE_SIZE};
pub use query::{CacheKey, ListQuery};
pub use reorder::{ReorderEngine, ReorderPhase, ReorderRequest};
pub use screen::{ListScreen, ScreenOptions, ScreenSnapshot};
pub use session::{ConsoleSession, LookupOption};
pub use transport::{BackofficeApi, CsvUpload, HttpBackofficeApi};
