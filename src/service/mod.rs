pub mod matcher;
pub mod reporter;
pub mod tolerance;

pub use matcher::{DuplicateTracker, MatchEngine};
pub use reporter::{aggregate, write_dispositions_csv, RunSummary};
pub use tolerance::{variance_pct, within_tolerance, TolerancePolicy, Tolerances};
