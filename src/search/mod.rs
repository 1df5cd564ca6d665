//! Log search: query translation, paged execution and facet listings

pub mod facets;
pub mod query;
pub mod service;

pub use facets::{FacetService, LEVEL_FACET_SIZE, SOURCE_FACET_SIZE};
pub use query::{translate, BoolClauses, BoolQuery, EngineQuery, QueryParseError};
pub use service::{SearchPage, SearchParams, SearchService, MAX_RESULT_WINDOW};
