pub mod chat_llm;
pub mod rate_limit;

pub use chat_llm::OpenAiChatAdapter;
pub use rate_limit::InMemoryRateLimiter;
