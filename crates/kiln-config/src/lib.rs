pub mod discovery;
pub mod error;
pub mod settings;
pub mod validation;

pub use discovery::{ConfigDiscovery, CONFIG_FILE_NAME, ENV_PREFIX};
pub use error::*;
pub use settings::*;
