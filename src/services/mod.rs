pub mod providers;
pub mod suggestions;

pub use suggestions::SuggestionService;
