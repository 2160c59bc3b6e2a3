pub mod postings;
pub mod query;
pub mod search;

pub use postings::{DocId, PostingsEntry, PostingsList};
pub use query::{Query, DEFAULT_TERM_WEIGHT};
pub use search::{sort_by_score, QueryType, RankedHit, RankingType, SearchOutcome};
