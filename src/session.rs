use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{ManagerId, PeriodSelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorecardRequest {
    pub manager: ManagerId,
    pub period: PeriodSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    request: ScorecardRequest,
}

impl Ticket {
    pub fn request(&self) -> ScorecardRequest {
        self.request
    }
}

#[derive(Debug, Default)]
struct Current {
    generation: u64,
    request: Option<ScorecardRequest>,
}

/// Tracks the latest manager/period selection so results computed for an
/// older selection are dropped instead of shown.
#[derive(Debug, Default)]
pub struct ScorecardSession {
    current: Mutex<Current>,
}

impl ScorecardSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `request` the current selection and supersedes every earlier ticket.
    pub async fn begin(&self, request: ScorecardRequest) -> Ticket {
        let mut current = self.current.lock().await;
        current.generation += 1;
        current.request = Some(request);
        Ticket {
            generation: current.generation,
            request,
        }
    }

    /// Returns `result` only if `ticket` still names the current selection.
    pub async fn accept<T>(&self, ticket: Ticket, result: T) -> Option<T> {
        let current = self.current.lock().await;
        if current.generation == ticket.generation && current.request == Some(ticket.request) {
            Some(result)
        } else {
            debug!(
                manager = %ticket.request.manager,
                stale_generation = ticket.generation,
                current_generation = current.generation,
                "discarding stale scorecard result"
            );
            None
        }
    }
}
