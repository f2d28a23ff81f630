use std::collections::BTreeMap;

use foundation::RequestToken;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Issued {
    token: RequestToken,
    settled: bool,
}

/// Latest-request-wins bookkeeping.
///
/// Tokens come from one counter shared by every channel, so they are
/// strictly increasing across the whole session. Superseded requests are
/// not cancelled; their responses are recognised and refused on arrival.
#[derive(Debug)]
pub struct RequestLedger<K: Ord + Copy> {
    next: u64,
    latest: BTreeMap<K, Issued>,
}

impl<K: Ord + Copy> Default for RequestLedger<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Copy> RequestLedger<K> {
    pub fn new() -> Self {
        Self {
            next: 1,
            latest: BTreeMap::new(),
        }
    }

    /// Issues a token for `channel`, superseding any outstanding one.
    pub fn issue(&mut self, channel: K) -> RequestToken {
        let token = RequestToken::new(self.next);
        self.next += 1;
        self.latest.insert(
            channel,
            Issued {
                token,
                settled: false,
            },
        );
        token
    }

    pub fn latest(&self, channel: K) -> Option<RequestToken> {
        self.latest.get(&channel).map(|i| i.token)
    }

    /// Outstanding (issued, not yet accepted) token for `channel`.
    pub fn pending(&self, channel: K) -> Option<RequestToken> {
        self.latest
            .get(&channel)
            .filter(|i| !i.settled)
            .map(|i| i.token)
    }

    /// Accepts a response when `token` is the latest unsettled one for
    /// `channel`. Returns `false` for stale or duplicate responses.
    pub fn accept(&mut self, channel: K, token: RequestToken) -> bool {
        match self.latest.get_mut(&channel) {
            Some(issued) if issued.token == token && !issued.settled => {
                issued.settled = true;
                true
            }
            _ => false,
        }
    }

    /// Forgets `channel` so every in-flight response for it becomes stale.
    pub fn invalidate(&mut self, channel: K) {
        self.latest.remove(&channel);
    }
}

#[cfg(test)]
mod tests {
    use super::RequestLedger;

    #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
    enum Ch {
        A,
        B,
    }

    #[test]
    fn latest_request_wins() {
        let mut ledger = RequestLedger::new();
        let first = ledger.issue(Ch::A);
        let second = ledger.issue(Ch::A);
        assert!(second > first);

        assert!(!ledger.accept(Ch::A, first));
        assert_eq!(ledger.pending(Ch::A), Some(second));
        assert!(ledger.accept(Ch::A, second));
        assert_eq!(ledger.pending(Ch::A), None);
        assert!(!ledger.accept(Ch::A, second), "duplicate delivery");
    }

    #[test]
    fn channels_are_independent_but_share_the_counter() {
        let mut ledger = RequestLedger::new();
        let a = ledger.issue(Ch::A);
        let b = ledger.issue(Ch::B);
        assert!(b > a);
        assert!(!ledger.accept(Ch::B, a));
        assert!(ledger.accept(Ch::A, a));
        assert!(ledger.accept(Ch::B, b));
    }

    #[test]
    fn invalidate_refuses_in_flight_responses() {
        let mut ledger = RequestLedger::new();
        let a = ledger.issue(Ch::A);
        ledger.invalidate(Ch::A);
        assert_eq!(ledger.latest(Ch::A), None);
        assert!(!ledger.accept(Ch::A, a));
    }
}
