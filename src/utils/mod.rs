pub mod error;

pub use error::{ErrorInfo, ErrorKind, RoastError};
