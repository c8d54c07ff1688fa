/// Lifecycle state of the session coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Tracking,
    Paused,
}

impl SessionState {
    /// A session exists, whether or not it is paused.
    pub fn is_active(self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, SessionState::Paused)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Tracking => "tracking",
            SessionState::Paused => "paused",
        };
        f.write_str(name)
    }
}
