//! Live grading: one [`DanceSession`] per connection, scoring tracked dancers against
//! the steps of a reference video.

pub mod catalog;
pub mod events;
pub mod session;
pub mod state;

pub use catalog::StepCatalog;
pub use events::{
    DanceResult, DancerRegistration, DancerResult, FinalScores, PrepareResult, RegisteredDancer,
    Registration,
};
pub use session::{DanceSession, SessionState};
pub use state::{DancerEntry, GameState};
