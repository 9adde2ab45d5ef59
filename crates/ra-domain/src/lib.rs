pub mod capability;
pub mod config;
pub mod error;
pub mod job;
pub mod source;
pub mod stream;
pub mod tool;
pub mod trace;

pub use capability::*;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use job::*;
pub use source::*;
pub use stream::*;
pub use tool::*;
