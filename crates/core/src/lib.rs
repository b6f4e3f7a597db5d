pub mod config;
pub mod domain;
pub mod email;
pub mod errors;
pub mod retrieval;

pub use domain::quote::{Page, PageCursor, QuoteMatches, QuoteRecord};
pub use email::is_valid_email;
pub use errors::{FailureKind, RetrievalError};
pub use retrieval::export::ExportFilterFetcher;
pub use retrieval::paged::PagedFilterFetcher;
pub use retrieval::search::SearchFilterFetcher;
pub use retrieval::{
    ExportSource, FetchSettings, PageRequest, PageSource, RetrievalResult, RetrievalStrategy,
    SearchSource,
};
