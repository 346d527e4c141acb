pub mod census;
pub mod merged;
pub mod state_counts;
