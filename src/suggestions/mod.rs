//! Suggestion ranking for facets and the composite result

pub mod ranker;

pub use ranker::SuggestionRanker;
