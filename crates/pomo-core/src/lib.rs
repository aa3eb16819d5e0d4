pub mod cadence;
pub mod config;
pub mod error;
pub mod identity;
pub mod io;
pub mod paths;
pub mod session;
pub mod store;
pub mod task;
pub mod timer;
pub mod types;

pub use error::{PomoError, Result};
pub use store::Store;
pub use types::{Listing, Mode, OwnerId};
