/// Node run statistics collection and reporting
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::Phase;

/// Node statistics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStatistics {
    // Loop
    pub uptime: Duration,
    pub phases_observed: u64,
    pub current_phase: Option<Phase>,
    pub tick_failures: u64,

    // Actions
    pub actions_dispatched: u64,
    pub action_failures: u64,
    pub commits: u64,
    pub reveals: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub epochs_processed: u64,

    // Errors
    pub last_error: Option<String>,
}

/// Statistics collector for the orchestrator loop
pub struct StatsCollector {
    stats: NodeStatistics,
    start_time: Instant,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            stats: NodeStatistics::default(),
            start_time: Instant::now(),
        }
    }

    pub fn phase_observed(&mut self, phase: Phase) {
        self.stats.phases_observed += 1;
        self.stats.current_phase = Some(phase);
    }

    pub fn action_dispatched(&mut self) {
        self.stats.actions_dispatched += 1;
    }

    pub fn commit_submitted(&mut self) {
        self.stats.commits += 1;
    }

    pub fn secret_revealed(&mut self) {
        self.stats.reveals += 1;
    }

    pub fn action_failed(&mut self, message: String) {
        self.stats.action_failures += 1;
        self.stats.last_error = Some(message);
    }

    pub fn tick_failed(&mut self, message: String) {
        self.stats.tick_failures += 1;
        self.stats.last_error = Some(message);
    }

    pub fn jobs_processed(&mut self, completed: usize, failed: usize) {
        self.stats.jobs_completed += completed as u64;
        self.stats.jobs_failed += failed as u64;
    }

    pub fn epoch_processed(&mut self) {
        self.stats.epochs_processed += 1;
    }

    /// Get current statistics snapshot
    pub fn get_stats(&self) -> NodeStatistics {
        let mut stats = self.stats.clone();
        stats.uptime = self.start_time.elapsed();
        stats
    }
}
