//! Request translation from the OpenAI chat-completions shape to the NIM backend shape.
//!
//! Pure functions only: parsing, defaulting and header construction. Nothing here
//! performs I/O or reads process state.

pub mod request;
pub mod types;

pub use request::{backend_headers, translate_request};
pub use types::{BackendPayload, ChatRequest};
