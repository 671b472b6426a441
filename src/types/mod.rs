//! Public types for the Mindful API.

mod assessment;
mod capability;
mod feature;
mod journal;
mod mode;
mod page;
mod summary;

pub use assessment::{NO_RELEVANT_POINTS, ScoreBand, UsefulnessAssessment};
pub use capability::{Availability, CapabilityKind, DownloadMonitor, DownloadProgress};
pub use feature::{Feature, FeatureOutcome, Provenance};
pub use journal::{DEFAULT_MOODS, JournalEntry};
pub use mode::Mode;
pub use page::PageSnapshot;
pub use summary::{CalmSummary, SummaryPipeline};
