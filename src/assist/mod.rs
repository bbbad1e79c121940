pub mod interfaces;
pub mod prompts;
pub mod providers;

pub use interfaces::{DraftExtractor, DraftReply, DraftRequest, DraftResponse};
pub use prompts::{DraftPrompts, PromptTemplate};
pub use providers::{DraftProviderFactory, HttpDraftProvider};
