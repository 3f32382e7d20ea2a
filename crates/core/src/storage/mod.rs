mod conditions;
mod error;
mod patterns;
mod traits;
mod types;

pub use conditions::{
    compare_rows, compare_values, matches, matches_all, matches_filters, project, values_equal,
};
pub use error::{RepositoryError, Result};
pub use patterns::like_matches;
pub use traits::{Model, Repository};
pub use types::{
    Attributes, Condition, Direction, Filters, ModelId, Operator, Page, PageRequest, RelationMap,
    Sort, SyncChanges, UpdateOutcome,
};
