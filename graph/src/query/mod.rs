pub mod search;

pub use search::{SearchDirection, SearchNavigator, SearchOutcome, SearchQuery, SearchState};
