mod error;
mod llm_client;
mod message;
pub mod providers;
mod registry;
pub mod transport;

pub use error::*;
pub use llm_client::*;
pub use message::*;
pub use providers::{AdapterOptions, GoogleSystemMode};
pub use registry::*;
