use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use snafu::{OptionExt, ensure};

use super::error::{
    ConversationResult, DuplicateIdSnafu, EmptyTextSnafu, IdSpaceExhaustedSnafu, OutOfOrderSnafu,
};
use super::ids::MessageId;
use super::types::{MessageRecord, NewMessage, Origin};

/// Ordered, append-only message log. Insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    records: Vec<MessageRecord>,
    ids: HashSet<MessageId>,
    next_id: MessageId,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log holding a single Peer-origin greeting.
    pub fn seeded(welcome_text: impl Into<String>, now_unix_ms: u64) -> Self {
        let mut log = Self::new();
        let welcome = MessageRecord::peer(log.next_id, welcome_text, now_unix_ms);
        log.insert(welcome);
        log
    }

    /// Appends `record` at the end of the log.
    ///
    /// Rejects blank user text, reused ids, and timestamps older than the last record.
    /// A rejected record leaves the log untouched.
    pub fn append(&mut self, record: MessageRecord) -> ConversationResult<&MessageRecord> {
        if record.origin.is_user() {
            validate_user_text(&record.text)?;
        }

        ensure!(
            !self.ids.contains(&record.id),
            DuplicateIdSnafu {
                stage: "append-validate-id",
                id: record.id,
            }
        );

        let last_unix_ms = self.last_timestamp();
        ensure!(
            record.created_at_unix_ms >= last_unix_ms,
            OutOfOrderSnafu {
                stage: "append-validate-order",
                id: record.id,
                created_at_unix_ms: record.created_at_unix_ms,
                last_unix_ms,
            }
        );

        Ok(self.insert(record))
    }

    /// Mints an id and a non-decreasing timestamp for `message`, then appends it.
    pub fn push(
        &mut self,
        message: NewMessage,
        now_unix_ms: u64,
    ) -> ConversationResult<&MessageRecord> {
        let created_at_unix_ms = now_unix_ms.max(self.last_timestamp());
        let record = MessageRecord::new(
            self.next_free_id()?,
            message.origin,
            message.text,
            created_at_unix_ms,
        );
        self.append(record)
    }

    /// Returns an owned copy of every record in display order.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.records.clone()
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&MessageRecord> {
        self.records.last()
    }

    pub fn get(&self, id: MessageId) -> Option<&MessageRecord> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.records.iter().find(|record| record.id == id)
    }

    pub fn count_by_origin(&self, origin: Origin) -> usize {
        self.records
            .iter()
            .filter(|record| record.origin == origin)
            .count()
    }

    fn last_timestamp(&self) -> u64 {
        self.records
            .last()
            .map_or(0, |record| record.created_at_unix_ms)
    }

    fn next_free_id(&self) -> ConversationResult<MessageId> {
        // Caller-supplied ids may already occupy the counter value.
        let mut candidate = self.next_id;
        while self.ids.contains(&candidate) {
            candidate = candidate.next().context(IdSpaceExhaustedSnafu {
                stage: "mint-message-id",
                last: candidate,
            })?;
        }
        Ok(candidate)
    }

    fn insert(&mut self, record: MessageRecord) -> &MessageRecord {
        if record.id >= self.next_id {
            // At the top of the range the counter parks on a taken id; minting then fails.
            self.next_id = record.id.next().unwrap_or(record.id);
        }
        self.ids.insert(record.id);
        tracing::trace!(
            message_id = %record.id,
            origin = ?record.origin,
            len = self.records.len() + 1,
            "appended conversation record"
        );
        self.records.push(record);
        // Just pushed, so the vector is non-empty.
        &self.records[self.records.len() - 1]
    }
}

/// Checks the rule every User-origin record must satisfy: some non-whitespace text.
pub fn validate_user_text(text: &str) -> ConversationResult<()> {
    ensure!(
        !text.trim().is_empty(),
        EmptyTextSnafu {
            stage: "validate-user-text",
        }
    );
    Ok(())
}

pub fn current_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversationError;

    fn welcome_log() -> ConversationLog {
        let mut log = ConversationLog::new();
        log.append(MessageRecord::peer(MessageId::new(1), "Welcome", 100))
            .expect("welcome record");
        log
    }

    #[test]
    fn append_grows_by_one_and_keeps_prior_entries() {
        let mut log = welcome_log();
        let before = log.snapshot();

        log.append(MessageRecord::user(MessageId::new(2), "hi", 150))
            .expect("valid append");

        assert_eq!(log.len(), before.len() + 1);
        assert_eq!(&log.records()[..before.len()], before.as_slice());
        assert_eq!(log.last().map(|record| record.text.as_str()), Some("hi"));
    }

    #[test]
    fn blank_user_text_is_rejected_without_mutation() {
        let mut log = welcome_log();
        let before = log.snapshot();

        for text in ["", "   ", "\t\n"] {
            let error = log
                .append(MessageRecord::user(MessageId::new(9), text, 200))
                .expect_err("blank text must fail");
            assert!(matches!(error, ConversationError::EmptyText { .. }));
            assert!(error.is_validation());
        }

        assert_eq!(log.snapshot(), before);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut log = welcome_log();
        let error = log
            .append(MessageRecord::user(MessageId::new(1), "hi", 200))
            .expect_err("id collision must fail");
        assert!(matches!(error, ConversationError::DuplicateId { id, .. } if id == MessageId::new(1)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn older_timestamp_is_rejected() {
        let mut log = welcome_log();
        let error = log
            .append(MessageRecord::user(MessageId::new(2), "late", 99))
            .expect_err("out of order must fail");
        assert!(matches!(error, ConversationError::OutOfOrder { .. }));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn push_clamps_clock_skew_and_skips_taken_ids() {
        let mut log = welcome_log();
        log.append(MessageRecord::user(MessageId::new(5), "jump", 300))
            .expect("explicit id");

        // Clock went backwards; the minted record must not break ordering.
        let pushed = log
            .push(NewMessage::peer("reply"), 250)
            .expect("push succeeds")
            .clone();
        assert_eq!(pushed.created_at_unix_ms, 300);
        assert_eq!(pushed.id, MessageId::new(6));

        let timestamps = log
            .records()
            .iter()
            .map(|record| record.created_at_unix_ms)
            .collect::<Vec<_>>();
        assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn push_fails_once_the_id_space_is_used_up() {
        let mut log = welcome_log();
        log.append(MessageRecord::peer(MessageId::new(u64::MAX), "last", 200))
            .expect("explicit max id");
        let before = log.snapshot();

        let error = log
            .push(NewMessage::user("hi"), 300)
            .expect_err("no id left to mint");
        assert!(matches!(error, ConversationError::IdSpaceExhausted { .. }));
        assert!(!error.is_validation());
        assert_eq!(log.snapshot(), before);
    }

    #[test]
    fn peer_records_may_carry_blank_text() {
        let mut log = ConversationLog::new();
        log.push(NewMessage::peer(" "), 1).expect("peer text is not validated");
        assert_eq!(log.count_by_origin(Origin::Peer), 1);
    }

    #[test]
    fn snapshot_is_stable_without_appends() {
        let log = ConversationLog::seeded("Welcome", 42);
        assert_eq!(log.snapshot(), log.snapshot());
        assert_eq!(log.get(MessageId::new(1)).map(|r| r.origin), Some(Origin::Peer));
        assert!(log.get(MessageId::new(2)).is_none());
    }
}
