pub mod cache;
pub mod key;
pub mod mutation;
pub mod state;

pub use cache::{QueryCache, QueryOptions};
pub use key::{KeyFilter, QueryKey, QueryKind};
pub use mutation::MutationHooks;
pub use state::{MutationState, MutationStatus, QueryState, QueryStatus};
