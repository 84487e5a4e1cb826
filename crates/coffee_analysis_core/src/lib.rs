pub mod domain;
pub mod extract;
pub mod ports;

pub use domain::{Attachment, ChatMessage, CoffeeAnalysis, FlavorProfile, Origin, RoastLevel, Role};
pub use extract::{extract, REJECTION_PHRASE};
pub use ports::{ChatStream, ChatStreamService, PortError, PortResult, RateLimitDecision, RateLimitStore};
