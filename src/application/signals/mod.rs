pub mod heuristic;
pub mod model_scorer;
pub mod scorer;
pub mod service;

pub use heuristic::{HeuristicScorer, HeuristicWeights};
pub use model_scorer::ModelScorer;
pub use scorer::Scorer;
pub use service::SignalService;
