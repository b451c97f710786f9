pub mod config;
pub mod error;
pub mod journal;
pub mod models;
pub mod proxy;
pub mod relay;
pub mod server;
pub mod translate;

pub use config::{Backend, ProxyConfig};
pub use error::{ErrorEnvelope, ProxyError, Result};
pub use journal::SharedJournal;
pub use server::{build_router, AppState};
