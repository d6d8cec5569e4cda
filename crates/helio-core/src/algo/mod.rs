pub mod isolation_forest;
pub mod random_forest;

// Re-exports for convenience
pub use isolation_forest::{IsolationForest, IsolationForestConfig};
pub use random_forest::{RandomForestConfig, RandomForestRegressor};
