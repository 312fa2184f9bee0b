pub mod config;
pub mod device;
pub mod error;
pub mod hub;
pub mod session;

pub use config::Config;
pub use error::{HubError, Recovery};
pub use hub::Hub;
