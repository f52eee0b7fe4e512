use chrono::{DateTime, Utc};

use live_core::StatusBoard;

/// Read-only view over the running notifier, shared with every handler.
#[derive(Clone)]
pub struct AppState {
    pub board: StatusBoard,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            board: StatusBoard::new(),
            started_at: Utc::now(),
        }
    }

    pub fn with_board(mut self, board: StatusBoard) -> Self {
        self.board = board;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
