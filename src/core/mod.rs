pub mod record;
pub mod types;
pub mod value;

pub use record::{Dataset, Record};
pub use types::*;
pub use value::Value;
