/// Lifecycle of one boundary corpus within a session.
///
/// NotRequested → Requested → Resident | Failed. Resident and Failed are
/// terminal: a corpus is never fetched twice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ResidencyState {
    #[default]
    NotRequested,
    Requested,
    Resident,
    Failed,
}

impl ResidencyState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ResidencyState::Resident | ResidencyState::Failed)
    }
}
