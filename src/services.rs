pub mod analysis_service;
pub mod history;

pub use analysis_service::{AnalysisService, BatchEntry, BatchReport};
pub use history::apply_history;
