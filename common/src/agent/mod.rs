pub mod executor;
pub mod parser;
pub mod prompt;

pub use executor::{QueryOutcome, QueryPipeline};
pub use parser::{normalize_statement, ALLOWED_KEYWORDS, INVALID_GENERATION_SENTINEL};
pub use prompt::build_query_prompt;
