pub mod identity;
pub mod jobs;
pub mod leader;
pub mod registration;
pub mod secret;

pub use identity::{known_node_id, NodeData, NodeStore};
pub use jobs::{AssignedJob, JobBatchReport, JobOutcome, JobStage, JobStatus, JobTracker};
pub use leader::{LeaderCoordinator, LeaderEvaluation, LeadershipStatus};
pub use registration::{register, required_stake};
pub use secret::{compute_commitment, RevealOutcome, Secret, SecretLifecycle};
