mod types;

pub use types::{MvvmError, Result};
