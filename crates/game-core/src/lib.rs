pub use shakmaty;

pub mod error;
pub mod pgn;
pub mod rating;
pub mod record;
pub mod replay;

pub use error::GameError;
pub use pgn::PgnTags;
pub use record::{EvaluationData, GameRecord};
