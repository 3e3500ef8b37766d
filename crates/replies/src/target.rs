use std::fmt;

use popchat_conversation::SessionId;

/// Sequence number of one submit/reply exchange within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

impl ExchangeId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Routing key for a reply. Completions carrying a stale target are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeTarget {
    pub session_id: SessionId,
    pub exchange: ExchangeId,
}

impl ExchangeTarget {
    pub const fn new(session_id: SessionId, exchange: ExchangeId) -> Self {
        Self {
            session_id,
            exchange,
        }
    }
}

impl fmt::Display for ExchangeTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}{}", self.session_id, self.exchange)
    }
}
