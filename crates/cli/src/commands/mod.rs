//! Command handlers for the CRAG CLI.

pub mod ask;
pub mod grade;

pub use ask::AskCommand;
pub use grade::GradeCommand;
