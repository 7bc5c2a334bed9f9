mod client;
mod documents;
mod enrich;
mod retry;
mod run;
mod scores;
mod segment;
mod throttle;
mod validate;

pub use documents::discover_documents;
pub use run::run;
