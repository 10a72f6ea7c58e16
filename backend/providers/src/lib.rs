pub mod decode;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use registry::ProviderRegistry;
