//! Queue entry and configuration types: a call waiting to be dialed,
//! the dialer's tunables, and its running counters.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallPriority {
    Urgent = 1,
    High = 3,
    Normal = 5,
    Low = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialerStatus {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Answered,
    NoAnswer,
    Busy,
    Failed,
    Voicemail,
    Declined,
    WrongNumber,
    NoConsent,
}

impl CallOutcome {
    /// Outcomes eligible for retry/SMS fallback.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NoAnswer | Self::Busy | Self::Failed)
    }
}

/// A call waiting to be dialed. Ordered by `(priority, scheduled_at)`
/// ascending, ties broken by insertion sequence.
#[derive(Debug, Clone)]
pub struct QueuedCall {
    pub call_id: Uuid,
    pub priority: CallPriority,
    pub scheduled_at: DateTime<Utc>,
    pub sequence: u64,
    pub patient_id: String,
    pub phone_number: String,
    pub patient_name: String,
    pub campaign_id: Option<Uuid>,
    pub campaign_type: String,
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl PartialEq for QueuedCall {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.scheduled_at == other.scheduled_at && self.sequence == other.sequence
    }
}
impl Eq for QueuedCall {}

impl PartialOrd for QueuedCall {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCall {
    /// `BinaryHeap` is a max-heap; this crate wants the smallest
    /// `(priority, scheduled_at, sequence)` tuple dialed first, so the
    /// comparison is reversed here and un-reversed again at the call site
    /// via `std::cmp::Reverse`.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, self.scheduled_at, self.sequence).cmp(&(other.priority, other.scheduled_at, other.sequence))
    }
}

#[derive(Debug, Clone)]
pub struct DialerConfig {
    pub business_hours_start: NaiveTime,
    pub business_hours_end: NaiveTime,
    pub weekdays_only: bool,
    pub max_concurrent_calls: usize,
    pub min_call_interval: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub sms_after_failed_attempts: u32,
    pub ring_timeout: Duration,
    pub caller_id: String,
    pub gateway: String,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            business_hours_start: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            business_hours_end: NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
            weekdays_only: true,
            max_concurrent_calls: 1,
            min_call_interval: Duration::from_secs(15),
            max_attempts: 3,
            retry_delay: Duration::from_secs(60 * 60),
            sms_after_failed_attempts: 2,
            ring_timeout: Duration::from_secs(25),
            caller_id: String::new(),
            gateway: "sipgate".to_string(),
        }
    }
}

pub(crate) fn is_weekday(weekday: Weekday) -> bool {
    !matches!(weekday, Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DialerStats {
    pub calls_queued: u64,
    pub calls_completed: u64,
    pub calls_answered: u64,
    pub calls_no_answer: u64,
    pub calls_failed: u64,
    pub sms_sent: u64,
    pub connections_active: usize,
}
