//! Specialized pipeline agents
//!
//! Each agent assembles a prompt for exactly one capability call and
//! validates the shape of what comes back. Sequencing, timeouts, retries,
//! and history live in the orchestrator, never here.

pub mod critic;
pub mod planner;
pub mod retriever;
pub mod stylist;
pub mod visualizer;

pub use critic::Critic;
pub use planner::Planner;
pub use retriever::Retriever;
pub use stylist::Stylist;
pub use visualizer::Visualizer;
