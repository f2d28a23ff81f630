/// What a non-fatal report is about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Transition,
    Rejected,
    StaleDiscarded,
    FetchFailed,
    GeometryUnavailable,
    ReconcileCollision,
    StyleSkipped,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::Transition => "transition",
            DiagnosticKind::Rejected => "rejected",
            DiagnosticKind::StaleDiscarded => "stale_discarded",
            DiagnosticKind::FetchFailed => "fetch_failed",
            DiagnosticKind::GeometryUnavailable => "geometry_unavailable",
            DiagnosticKind::ReconcileCollision => "reconcile_collision",
            DiagnosticKind::StyleSkipped => "style_skipped",
        }
    }
}

/// A sequenced, human-readable report.
///
/// Sequence numbers start at 1 and are never reused within one log, even
/// across `drain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub seq: u64,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct DiagnosticLog {
    next_seq: u64,
    events: Vec<DiagnosticEvent>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, kind: DiagnosticKind, message: impl Into<String>) -> u64 {
        self.next_seq += 1;
        self.events.push(DiagnosticEvent {
            seq: self.next_seq,
            kind,
            message: message.into(),
        });
        self.next_seq
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn last(&self, kind: DiagnosticKind) -> Option<&DiagnosticEvent> {
        self.events.iter().rev().find(|e| e.kind == kind)
    }

    pub fn drain(&mut self) -> Vec<DiagnosticEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagnosticKind, DiagnosticLog};

    #[test]
    fn sequence_survives_drain() {
        let mut log = DiagnosticLog::new();
        assert_eq!(log.emit(DiagnosticKind::Transition, "national -> region"), 1);
        assert_eq!(log.drain().len(), 1);
        assert!(log.events().is_empty());
        assert_eq!(log.emit(DiagnosticKind::Rejected, "unknown region"), 2);
    }

    #[test]
    fn counts_and_last_by_kind() {
        let mut log = DiagnosticLog::new();
        log.emit(DiagnosticKind::StaleDiscarded, "a");
        log.emit(DiagnosticKind::Transition, "b");
        log.emit(DiagnosticKind::StaleDiscarded, "c");
        assert_eq!(log.count(DiagnosticKind::StaleDiscarded), 2);
        assert_eq!(log.last(DiagnosticKind::StaleDiscarded).unwrap().message, "c");
        assert!(log.last(DiagnosticKind::FetchFailed).is_none());
    }
}
