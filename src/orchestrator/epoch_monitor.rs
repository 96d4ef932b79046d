/// Epoch Monitor - Tracks the ledger's phase readings and detects phase entry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Phase of the ledger's epoch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Nodes publish a commitment to a fresh secret
    Commit,
    /// Nodes disclose the committed secret
    Reveal,
    /// Leader election from the revealed secrets
    Elect,
    /// The leader starts the assignment round
    Execute,
    /// Assigned nodes confirm, run and complete their jobs
    Confirm,
    /// Settlement of the epoch
    Dispute,
    /// Ledger-side pause; not part of the cycle
    Paused,
}

impl Phase {
    /// The six phases of one epoch, in order
    pub const CYCLE: [Phase; 6] = [
        Phase::Commit,
        Phase::Reveal,
        Phase::Elect,
        Phase::Execute,
        Phase::Confirm,
        Phase::Dispute,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Phase::Commit),
            1 => Some(Phase::Reveal),
            2 => Some(Phase::Elect),
            3 => Some(Phase::Execute),
            4 => Some(Phase::Confirm),
            5 => Some(Phase::Dispute),
            6 => Some(Phase::Paused),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Phase::Commit => 0,
            Phase::Reveal => 1,
            Phase::Elect => 2,
            Phase::Execute => 3,
            Phase::Confirm => 4,
            Phase::Dispute => 5,
            Phase::Paused => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Commit => "COMMIT",
            Phase::Reveal => "REVEAL",
            Phase::Elect => "ELECT",
            Phase::Execute => "EXECUTE",
            Phase::Confirm => "CONFIRM",
            Phase::Dispute => "DISPUTE",
            Phase::Paused => "PAUSED",
        }
    }

    /// Successor in the cycle. A paused ledger resumes at COMMIT.
    pub fn next(self) -> Self {
        match self {
            Phase::Commit => Phase::Reveal,
            Phase::Reveal => Phase::Elect,
            Phase::Elect => Phase::Execute,
            Phase::Execute => Phase::Confirm,
            Phase::Confirm => Phase::Dispute,
            Phase::Dispute | Phase::Paused => Phase::Commit,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reading of the ledger's epoch state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochState {
    pub phase: Phase,
    pub time_remaining: Duration,
}

impl EpochState {
    pub fn new(phase: Phase, time_remaining: Duration) -> Self {
        Self { phase, time_remaining }
    }
}

/// Remembers the last observed phase and when it was entered
#[derive(Debug)]
pub struct PhaseMonitor {
    last_phase: Option<Phase>,
    phase_start: Instant,
}

impl Default for PhaseMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMonitor {
    pub fn new() -> Self {
        Self {
            last_phase: None,
            phase_start: Instant::now(),
        }
    }

    pub fn last_phase(&self) -> Option<Phase> {
        self.last_phase
    }

    /// Time spent in the current phase so far
    pub fn elapsed(&self) -> Duration {
        self.phase_start.elapsed()
    }

    /// Record a reading. Returns true when it enters a different phase.
    pub fn observe(&mut self, state: &EpochState) -> bool {
        if self.last_phase == Some(state.phase) {
            return false;
        }

        if let Some(previous) = self.last_phase {
            log::info!(
                "Completed {} phase (duration {:.1}s)",
                previous,
                self.elapsed().as_secs_f64()
            );
        }
        log::info!(
            "Entering {} phase (time left {}s)",
            state.phase,
            state.time_remaining.as_secs()
        );

        self.last_phase = Some(state.phase);
        self.phase_start = Instant::now();
        true
    }
}
