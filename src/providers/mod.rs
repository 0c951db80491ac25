pub mod avatar;
pub mod backend;
pub mod sleeper;
pub mod util;
pub mod yahoo;

pub use avatar::{AvatarImage, ObjectUrlRegistry};
pub use backend::HttpBackend;
pub use sleeper::SleeperProvider;
pub use yahoo::YahooProvider;
