pub mod filters;
pub mod request;

pub use filters::{AcceptAll, FilterEvaluator, InlineFilters};
pub use request::{AgentRequest, SharedCache, SharedProvider};
