pub mod completion;
pub mod date_key;
pub mod date_range;
pub mod error;
pub mod habit;
pub mod ledger;
pub mod stats;
pub mod streaks;

pub use completion::*;
pub use date_key::*;
pub use date_range::*;
pub use error::*;
pub use habit::*;
pub use ledger::*;
pub use stats::*;
pub use streaks::*;
