pub mod chat;
pub mod cors;
pub mod guard;
pub mod protocol;
pub mod state;

// Re-export the handlers and the OpenAPI definition so the server binary
// can build its router without reaching into submodules.
pub use chat::{chat_handler, chat_preflight_handler, ApiDoc};
