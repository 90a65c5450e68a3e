//! Ledger lifecycle vocabulary.
//! Rail-agnostic kinds, statuses and the outcome normalization applied to
//! everything the rails report back.

use std::fmt;

/// Push top-ups and subscription payments below this are rejected before any
/// rail call is made.
pub const MIN_PUSH_AMOUNT_KES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Topup,
    Subscription,
    Payout,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Topup => "topup",
            TransactionKind::Subscription => "subscription",
            TransactionKind::Payout => "payout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "topup" => Some(TransactionKind::Topup),
            "subscription" => Some(TransactionKind::Subscription),
            "payout" => Some(TransactionKind::Payout),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal transaction lifecycle. `Completed` is the only credit-eligible
/// state and is terminal once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Rejected => "rejected",
        }
    }

    /// Reads a stored status column. `success` is the legacy spelling of the
    /// credit-eligible terminal state; unknown strings are treated as
    /// `pending`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "completed" | "success" => TransactionStatus::Completed,
            "failed" => TransactionStatus::Failed,
            "rejected" => TransactionStatus::Rejected,
            _ => TransactionStatus::Pending,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Kes,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Kes => "KES",
            Currency::Usd => "USD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "KES" => Some(Currency::Kes),
            "USD" => Some(Currency::Usd),
            _ => None,
        }
    }
}

/// Maps a rail-reported outcome onto the internal lifecycle.
///
/// Rails disagree on vocabulary: some put the verdict in the event name,
/// some in a nested status field, and casing is inconsistent. A
/// case-insensitive substring hit for `success` or `completed` in either
/// place means the payment became creditable; failures and rejections are
/// matched the same way, and anything unrecognized stays `pending`.
pub fn normalize_outcome(event: Option<&str>, status: Option<&str>) -> TransactionStatus {
    let event = event.unwrap_or("").to_ascii_lowercase();
    let status = status.unwrap_or("").to_ascii_lowercase();
    let hit = |needle: &str| event.contains(needle) || status.contains(needle);

    if hit("success") || hit("completed") {
        TransactionStatus::Completed
    } else if hit("fail") {
        TransactionStatus::Failed
    } else if hit("reject") || hit("cancel") {
        TransactionStatus::Rejected
    } else {
        TransactionStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_wins_from_nested_status() {
        let status = normalize_outcome(Some("stk_callback"), Some("Success"));
        assert_eq!(status, TransactionStatus::Completed);
    }

    #[test]
    fn completed_wins_from_event_name() {
        let status = normalize_outcome(Some("payment.completed"), None);
        assert_eq!(status, TransactionStatus::Completed);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            normalize_outcome(None, Some("COMPLETED")),
            TransactionStatus::Completed
        );
        assert_eq!(
            normalize_outcome(Some("STK_SUCCESS"), None),
            TransactionStatus::Completed
        );
    }

    #[test]
    fn failures_map_to_failed() {
        assert_eq!(
            normalize_outcome(Some("stk_callback"), Some("Failed")),
            TransactionStatus::Failed
        );
        assert_eq!(
            normalize_outcome(Some("payment.failure"), None),
            TransactionStatus::Failed
        );
    }

    #[test]
    fn cancellations_map_to_rejected() {
        assert_eq!(
            normalize_outcome(None, Some("cancelled")),
            TransactionStatus::Rejected
        );
    }

    #[test]
    fn absent_outcome_defaults_to_pending() {
        assert_eq!(normalize_outcome(None, None), TransactionStatus::Pending);
        assert_eq!(
            normalize_outcome(Some("stk_callback"), Some("processing")),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn stored_success_parses_as_completed() {
        assert_eq!(
            TransactionStatus::parse("success"),
            TransactionStatus::Completed
        );
        assert_eq!(
            TransactionStatus::parse("completed"),
            TransactionStatus::Completed
        );
    }

    #[test]
    fn kind_round_trips() {
        for kind in [
            TransactionKind::Topup,
            TransactionKind::Subscription,
            TransactionKind::Payout,
        ] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::parse("refund"), None);
    }
}
