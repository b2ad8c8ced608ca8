//! `OutboundDialer` (C8): priority-queue scheduler with business-hours and
//! rate-limit gating, consent/audit/retry/SMS orchestration around each
//! call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use callcore_capabilities::{AuditEntry, AuditLog, Clock, ConsentKind, ConsentStore, SmsGateway, SmsMessage};
use callcore_pbx::{handler, ChannelUuid, HangupCause, OriginateRequest, PbxClient};
use chrono::Datelike;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::policy::{OutboundCallContext, OutboundOutcome, OutboundPolicy, OutboundPolicyConfig};
use crate::queue::CallQueue;
use crate::types::{is_weekday, CallOutcome, CallPriority, DialerConfig, DialerStats, DialerStatus, QueuedCall};

/// Runs the outbound audio exchange once a call is answered: attaches the
/// conversation engine to the channel and drives `policy` turn by turn
/// until it signals completion or the patient hangs up. Implemented
/// outside this crate so `callcore-dialer` stays decoupled from the
/// concrete audio transport.
#[async_trait]
pub trait OutboundCallDriver: Send + Sync {
    async fn run(&self, call: &QueuedCall, channel_uuid: &str, policy: OutboundPolicy) -> OutboundOutcome;
}

fn map_outbound_outcome(outcome: OutboundOutcome) -> CallOutcome {
    match outcome {
        OutboundOutcome::AppointmentConfirmed
        | OutboundOutcome::AppointmentRescheduled
        | OutboundOutcome::InformationDelivered
        | OutboundOutcome::CallbackRequested
        | OutboundOutcome::PatientHungUp => CallOutcome::Answered,
        OutboundOutcome::VoicemailLeft => CallOutcome::Voicemail,
        OutboundOutcome::PatientDeclined => CallOutcome::Declined,
        OutboundOutcome::WrongPerson => CallOutcome::WrongNumber,
        OutboundOutcome::ConversationFailed => CallOutcome::Failed,
    }
}

fn fallback_sms_body(call: &QueuedCall, practice_name: &str) -> String {
    let first_name = call.patient_name.split_whitespace().next().unwrap_or("Patient");
    match call.campaign_type.as_str() {
        "reminder" => {
            let date = call.metadata.get("appointment_date");
            let time = call.metadata.get("appointment_time");
            if let (Some(date), Some(time)) = (date, time) {
                format!(
                    "Terminerinnerung {practice_name}\n\nGuten Tag {first_name},\nwir erinnern Sie an Ihren Termin am {date} um {time} Uhr.\n\nBei Verhinderung rufen Sie uns bitte an.\nIhre {practice_name}"
                )
            } else {
                format!(
                    "Terminerinnerung {practice_name}\n\nGuten Tag {first_name},\nwir wollten Sie an Ihren bevorstehenden Termin erinnern. Bitte kontaktieren Sie uns bei Fragen.\n\nIhre {practice_name}"
                )
            }
        }
        "recall" => format!(
            "Gesundheitsvorsorge {practice_name}\n\nGuten Tag {first_name},\nes ist Zeit für Ihren nächsten Vorsorgetermin. Bitte rufen Sie uns an zur Terminvereinbarung.\n\nIhre {practice_name}"
        ),
        "noshow" => format!(
            "Terminabsage {practice_name}\n\nGuten Tag {first_name},\nwir haben Sie leider bei Ihrem Termin verpasst. Bitte kontaktieren Sie uns zur Neuterminierung.\n\nIhre {practice_name}"
        ),
        "followup" => format!(
            "Nachsorge {practice_name}\n\nGuten Tag {first_name},\nwir möchten uns nach Ihrer Behandlung erkundigen. Bitte rufen Sie uns bei Fragen an.\n\nIhre {practice_name}"
        ),
        _ => format!(
            "{practice_name}\n\nGuten Tag {first_name},\nwir haben versucht, Sie telefonisch zu erreichen. Bitte rufen Sie uns zurück.\n\nIhre {practice_name}"
        ),
    }
}

type CompletionCallback = Arc<dyn Fn(QueuedCall, CallOutcome) + Send + Sync>;

struct Inner {
    config: DialerConfig,
    pbx: Arc<PbxClient>,
    consent: Arc<dyn ConsentStore>,
    audit: Arc<dyn AuditLog>,
    sms: Option<Arc<dyn SmsGateway>>,
    clock: Arc<dyn Clock>,
    driver: Arc<dyn OutboundCallDriver>,
    policy_config: OutboundPolicyConfig,
    practice_name: String,

    status: Mutex<DialerStatus>,
    queue: Mutex<CallQueue>,
    active: DashMap<Uuid, QueuedCall>,
    stats: Mutex<DialerStats>,
    last_call_time: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
    answer_waiters: DashMap<ChannelUuid, oneshot::Sender<()>>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    on_call_complete: Mutex<Option<CompletionCallback>>,
}

#[derive(Clone)]
pub struct OutboundDialer {
    inner: Arc<Inner>,
}

impl OutboundDialer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: DialerConfig,
        pbx: Arc<PbxClient>,
        consent: Arc<dyn ConsentStore>,
        audit: Arc<dyn AuditLog>,
        sms: Option<Arc<dyn SmsGateway>>,
        clock: Arc<dyn Clock>,
        driver: Arc<dyn OutboundCallDriver>,
        policy_config: OutboundPolicyConfig,
        practice_name: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                pbx,
                consent,
                audit,
                sms,
                clock,
                driver,
                policy_config,
                practice_name: practice_name.into(),
                status: Mutex::new(DialerStatus::Stopped),
                queue: Mutex::new(CallQueue::new()),
                active: DashMap::new(),
                stats: Mutex::new(DialerStats::default()),
                last_call_time: Mutex::new(None),
                answer_waiters: DashMap::new(),
                loop_task: Mutex::new(None),
                running: AtomicBool::new(false),
                on_call_complete: Mutex::new(None),
            }),
        }
    }

    pub fn on_call_complete(&self, callback: CompletionCallback) {
        *self.inner.on_call_complete.lock() = Some(callback);
    }

    #[allow(clippy::significant_drop_tightening)]
    pub async fn start(&self) {
        if *self.inner.status.lock() == DialerStatus::Running {
            return;
        }
        *self.inner.status.lock() = DialerStatus::Running;
        self.inner.running.store(true, Ordering::Release);

        let dialer = self.clone();
        self.inner.pbx.on_event(
            "CHANNEL_ANSWER",
            handler(move |event| {
                let dialer = dialer.clone();
                async move {
                    if let Some((_, tx)) = dialer.inner.answer_waiters.remove(&event.channel_uuid) {
                        let _ = tx.send(());
                    }
                    Ok(())
                }
            }),
        );

        let dialer = self.clone();
        let task = tokio::spawn(async move { dialer.run_loop().await }.instrument(info_span!("dialer_loop")));
        *self.inner.loop_task.lock() = Some(task);
        info!("outbound dialer started");
    }

    pub async fn stop(&self) {
        if *self.inner.status.lock() == DialerStatus::Stopped {
            return;
        }
        *self.inner.status.lock() = DialerStatus::Stopped;
        self.inner.running.store(false, Ordering::Release);
        if let Some(task) = self.inner.loop_task.lock().take() {
            task.abort();
        }
        info!("outbound dialer stopped");
    }

    pub fn pause(&self) {
        let mut status = self.inner.status.lock();
        if *status == DialerStatus::Running {
            *status = DialerStatus::Paused;
        }
    }

    pub fn resume(&self) {
        let mut status = self.inner.status.lock();
        if *status == DialerStatus::Paused {
            *status = DialerStatus::Running;
        }
    }

    pub fn status(&self) -> DialerStatus {
        *self.inner.status.lock()
    }

    pub fn stats(&self) -> DialerStats {
        let mut stats = *self.inner.stats.lock();
        stats.connections_active = self.inner.active.len();
        stats
    }

    pub fn queue_size(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn get_queue_snapshot(&self) -> Vec<QueuedCall> {
        self.inner.queue.lock().snapshot()
    }

    pub fn clear_queue(&self) -> usize {
        self.inner.queue.lock().clear()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn queue_call(
        &self,
        patient_id: impl Into<String>,
        phone_number: impl Into<String>,
        patient_name: impl Into<String>,
        priority: CallPriority,
        campaign_id: Option<Uuid>,
        campaign_type: impl Into<String>,
        scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
        metadata: HashMap<String, String>,
    ) -> QueuedCall {
        let mut queue = self.inner.queue.lock();
        let call = QueuedCall {
            call_id: Uuid::new_v4(),
            priority,
            scheduled_at: scheduled_at.unwrap_or_else(|| self.inner.clock.now()),
            sequence: queue.next_sequence(),
            patient_id: patient_id.into(),
            phone_number: phone_number.into(),
            patient_name: patient_name.into(),
            campaign_id,
            campaign_type: campaign_type.into(),
            attempt_number: 1,
            max_attempts: self.inner.config.max_attempts,
            metadata,
            created_at: self.inner.clock.now(),
        };
        queue.push(call.clone());
        self.inner.stats.lock().calls_queued += 1;
        info!(call_id = %call.call_id, patient_id = %call.patient_id, "call queued");
        call
    }

    pub fn cancel_call(&self, call_id: Uuid) -> bool {
        self.inner.queue.lock().remove(call_id)
    }

    fn is_within_business_hours(&self) -> bool {
        let now = self.inner.clock.now();
        if self.inner.config.weekdays_only && !is_weekday(now.weekday()) {
            return false;
        }
        let time = now.time();
        time >= self.inner.config.business_hours_start && time <= self.inner.config.business_hours_end
    }

    fn can_make_call(&self) -> bool {
        match *self.inner.last_call_time.lock() {
            None => true,
            Some(last) => {
                let elapsed = self.inner.clock.now().signed_duration_since(last);
                elapsed.to_std().map(|d| d >= self.inner.config.min_call_interval).unwrap_or(true)
            }
        }
    }

    async fn run_loop(&self) {
        while self.inner.running.load(Ordering::Acquire) {
            if *self.inner.status.lock() == DialerStatus::Paused {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
            if !self.is_within_business_hours() {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                continue;
            }
            if self.inner.active.len() >= self.inner.config.max_concurrent_calls {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
            if !self.can_make_call() {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }

            let next_scheduled = self.inner.queue.lock().peek().map(|c| c.scheduled_at);
            let Some(scheduled_at) = next_scheduled else {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            };
            if scheduled_at > self.inner.clock.now() {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }

            let Some(call) = self.inner.queue.lock().pop() else {
                continue;
            };

            let dialer = self.clone();
            tokio::spawn(async move { dialer.execute_call(call).await });
        }
    }

    async fn execute_call(&self, call: QueuedCall) {
        let span = info_span!("execute_call", call_id = %call.call_id, attempt = call.attempt_number);
        async move {
            self.inner.active.insert(call.call_id, call.clone());
            *self.inner.last_call_time.lock() = Some(self.inner.clock.now());

            let outcome = self.try_execute_call(&call).await;

            self.inner.active.remove(&call.call_id);
            self.handle_outcome(call, outcome).await;
        }
        .instrument(span)
        .await;
    }

    async fn try_execute_call(&self, call: &QueuedCall) -> CallOutcome {
        match self.inner.consent.has_consent(&call.patient_id, &ConsentKind::phone_contact()).await {
            Ok(true) => {}
            Ok(false) => return CallOutcome::NoConsent,
            Err(err) => {
                warn!(%err, "consent check failed, treating as no consent");
                return CallOutcome::NoConsent;
            }
        }

        self.inner
            .audit
            .record(AuditEntry {
                actor_id: "outbound-dialer".to_string(),
                action: "CALL_ATTEMPTED".to_string(),
                resource_type: "patient".to_string(),
                resource_id: call.patient_id.clone(),
                details: HashMap::from([
                    ("call_id".to_string(), call.call_id.to_string()),
                    ("campaign_type".to_string(), call.campaign_type.clone()),
                    ("attempt_number".to_string(), call.attempt_number.to_string()),
                ]),
            })
            .await;

        let mut variables = call.metadata.clone();
        variables.insert("call_id".to_string(), call.call_id.to_string());
        variables.insert("patient_id".to_string(), call.patient_id.clone());
        variables.insert("campaign_type".to_string(), call.campaign_type.clone());

        let request = OriginateRequest {
            destination: call.phone_number.clone(),
            caller_id_number: (!self.inner.config.caller_id.is_empty()).then(|| self.inner.config.caller_id.clone()),
            caller_id_name: None,
            timeout_secs: self.inner.config.ring_timeout.as_secs() as u32,
            gateway: self.inner.config.gateway.clone(),
            variables,
        };

        let channel_uuid = match self.inner.pbx.originate(&request).await {
            Ok(Some(uuid)) => uuid,
            Ok(None) => return CallOutcome::Failed,
            Err(err) => {
                warn!(%err, "originate failed");
                return CallOutcome::Failed;
            }
        };

        let (tx, rx) = oneshot::channel();
        self.inner.answer_waiters.insert(channel_uuid.clone(), tx);
        let answered = tokio::time::timeout(self.inner.config.ring_timeout, rx).await.is_ok();
        self.inner.answer_waiters.remove(&channel_uuid);

        if !answered {
            let _ = self.inner.pbx.hangup(&channel_uuid, HangupCause::NoAnswer).await;
            return CallOutcome::NoAnswer;
        }

        let context = OutboundCallContext {
            practice_name: self.inner.practice_name.clone(),
            patient_name: call.patient_name.clone(),
            appointment_date: call.metadata.get("appointment_date").cloned().unwrap_or_default(),
            appointment_time: call.metadata.get("appointment_time").cloned().unwrap_or_default(),
        };
        let policy = OutboundPolicy::new(self.inner.policy_config.clone(), context);

        let outbound_outcome = self.inner.driver.run(call, &channel_uuid, policy).await;
        let _ = self.inner.pbx.hangup(&channel_uuid, HangupCause::NormalClearing).await;

        map_outbound_outcome(outbound_outcome)
    }

    async fn handle_outcome(&self, call: QueuedCall, outcome: CallOutcome) {
        {
            let mut stats = self.inner.stats.lock();
            stats.calls_completed += 1;
            match outcome {
                CallOutcome::Answered => stats.calls_answered += 1,
                CallOutcome::NoAnswer => stats.calls_no_answer += 1,
                CallOutcome::Failed | CallOutcome::NoConsent => stats.calls_failed += 1,
                _ => {}
            }
        }

        info!(call_id = %call.call_id, ?outcome, "call completed");

        if let Some(callback) = self.inner.on_call_complete.lock().clone() {
            callback(call.clone(), outcome);
        }

        if outcome.is_retryable() && call.attempt_number < call.max_attempts {
            self.schedule_retry(&call);
        } else if outcome.is_retryable() && call.attempt_number >= self.inner.config.sms_after_failed_attempts {
            self.send_sms_fallback(&call).await;
        }
    }

    fn schedule_retry(&self, call: &QueuedCall) {
        let mut queue = self.inner.queue.lock();
        let retry = QueuedCall {
            call_id: Uuid::new_v4(),
            priority: call.priority,
            scheduled_at: self.inner.clock.now() + chrono::Duration::from_std(self.inner.config.retry_delay).expect("retry delay fits in chrono::Duration"),
            sequence: queue.next_sequence(),
            attempt_number: call.attempt_number + 1,
            ..call.clone()
        };
        info!(call_id = %retry.call_id, attempt = retry.attempt_number, "call retry scheduled");
        queue.push(retry);
    }

    async fn send_sms_fallback(&self, call: &QueuedCall) {
        let Some(sms) = &self.inner.sms else {
            warn!(call_id = %call.call_id, "SMS gateway not configured, cannot send fallback SMS");
            return;
        };
        let body = fallback_sms_body(call, &self.inner.practice_name);
        let message = SmsMessage { to: call.phone_number.clone(), body, reference: Some(format!("fallback_{}", call.call_id)) };

        match sms.send(message).await {
            Ok(result) if result.success => {
                self.inner.stats.lock().sms_sent += 1;
                info!(call_id = %call.call_id, message_id = ?result.message_id, "SMS fallback sent");
            }
            Ok(result) => warn!(call_id = %call.call_id, error = ?result.error, "SMS fallback failed"),
            Err(err) => warn!(call_id = %call.call_id, %err, "SMS fallback errored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use callcore_capabilities::{ConsentKind, SmsResult};
    use callcore_pbx::PbxConfig;
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    struct FixedClock(AtomicI64);
    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<Utc> {
            chrono::DateTime::from_timestamp(self.0.load(Ordering::SeqCst), 0).expect("valid timestamp")
        }
    }

    struct AlwaysGrant;
    #[async_trait]
    impl ConsentStore for AlwaysGrant {
        async fn has_consent(&self, _subject_id: &str, _kind: &ConsentKind) -> callcore_capabilities::Result<bool> {
            Ok(true)
        }
    }

    struct AlwaysDeny;
    #[async_trait]
    impl ConsentStore for AlwaysDeny {
        async fn has_consent(&self, _subject_id: &str, _kind: &ConsentKind) -> callcore_capabilities::Result<bool> {
            Ok(false)
        }
    }

    struct NoopAudit;
    #[async_trait]
    impl AuditLog for NoopAudit {
        async fn record(&self, _entry: AuditEntry) {}
    }

    struct CountingSms(AtomicUsize, StdMutex<Vec<String>>);
    impl CountingSms {
        fn new() -> Self {
            Self(AtomicUsize::new(0), StdMutex::new(Vec::new()))
        }
    }
    #[async_trait]
    impl SmsGateway for CountingSms {
        async fn send(&self, message: SmsMessage) -> callcore_capabilities::Result<SmsResult> {
            self.0.fetch_add(1, Ordering::SeqCst);
            self.1.lock().unwrap().push(message.body);
            Ok(SmsResult { success: true, message_id: Some("msg-1".to_string()), error: None })
        }
    }

    struct NoopDriver;
    #[async_trait]
    impl OutboundCallDriver for NoopDriver {
        async fn run(&self, _call: &QueuedCall, _channel_uuid: &str, _policy: OutboundPolicy) -> OutboundOutcome {
            OutboundOutcome::PatientHungUp
        }
    }

    fn dialer_with(config: DialerConfig, consent: Arc<dyn ConsentStore>, sms: Option<Arc<dyn SmsGateway>>) -> OutboundDialer {
        dialer_at(config, consent, sms, 0)
    }

    fn dialer_at(
        config: DialerConfig,
        consent: Arc<dyn ConsentStore>,
        sms: Option<Arc<dyn SmsGateway>>,
        unix_time: i64,
    ) -> OutboundDialer {
        OutboundDialer::new(
            config,
            Arc::new(PbxClient::new(PbxConfig::default())),
            consent,
            Arc::new(NoopAudit),
            sms,
            Arc::new(FixedClock(AtomicI64::new(unix_time))),
            Arc::new(NoopDriver),
            OutboundPolicyConfig::default(),
            "Test Practice",
        )
    }

    fn sample_call(priority: CallPriority, attempt_number: u32, max_attempts: u32) -> QueuedCall {
        QueuedCall {
            call_id: Uuid::new_v4(),
            priority,
            scheduled_at: Utc::now(),
            sequence: 0,
            patient_id: "patient-1".to_string(),
            phone_number: "+49123456".to_string(),
            patient_name: "Max Mustermann".to_string(),
            campaign_id: None,
            campaign_type: "reminder".to_string(),
            attempt_number,
            max_attempts,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn business_hours_check_respects_window_and_weekday_flag() {
        // Monday 2024-01-01 10:00 UTC: within the default 09:00-18:00 window.
        let within = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let dialer = dialer_at(DialerConfig::default(), Arc::new(AlwaysGrant), None, within.timestamp());
        assert!(dialer.is_within_business_hours());

        // Saturday 2024-01-06 10:00 UTC: outside the weekdays-only window.
        let weekend = Utc.with_ymd_and_hms(2024, 1, 6, 10, 0, 0).unwrap();
        let dialer = dialer_at(DialerConfig::default(), Arc::new(AlwaysGrant), None, weekend.timestamp());
        assert!(!dialer.is_within_business_hours());

        // Monday 2024-01-01 20:00 UTC: past the 18:00 end of the window.
        let after_hours = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(20, 0, 0).unwrap();
        let after_hours = Utc.from_utc_datetime(&after_hours);
        let dialer = dialer_at(DialerConfig::default(), Arc::new(AlwaysGrant), None, after_hours.timestamp());
        assert!(!dialer.is_within_business_hours());
    }

    #[test]
    fn min_call_interval_blocks_until_elapsed() {
        let mut config = DialerConfig::default();
        config.min_call_interval = std::time::Duration::from_secs(10);
        let dialer = dialer_with(config, Arc::new(AlwaysGrant), None);

        assert!(dialer.can_make_call(), "no prior call yet, should be allowed");

        let now = dialer.inner.clock.now();
        *dialer.inner.last_call_time.lock() = Some(now);
        assert!(!dialer.can_make_call(), "interval has not elapsed");
    }

    #[tokio::test]
    async fn consent_denial_short_circuits_before_originate() {
        let dialer = dialer_with(DialerConfig::default(), Arc::new(AlwaysDeny), None);
        let call = sample_call(CallPriority::Normal, 1, 3);
        let outcome = dialer.try_execute_call(&call).await;
        assert_eq!(outcome, CallOutcome::NoConsent);
    }

    #[tokio::test]
    async fn no_answer_retry_schedules_next_attempt_and_fires_sms_exactly_once() {
        // Mirrors the spec's worked example: max_attempts=3,
        // sms_after_failed_attempts=2, every attempt is NO_ANSWER.
        let mut config = DialerConfig::default();
        config.max_attempts = 3;
        config.sms_after_failed_attempts = 2;
        config.retry_delay = std::time::Duration::from_secs(3600);
        let sms = Arc::new(CountingSms::new());
        let dialer = dialer_with(config, Arc::new(AlwaysGrant), Some(sms.clone()));

        for attempt in 1..=3u32 {
            let call = sample_call(CallPriority::Normal, attempt, 3);
            dialer.handle_outcome(call, CallOutcome::NoAnswer).await;
        }

        assert_eq!(sms.0.load(Ordering::SeqCst), 1, "SMS fallback must fire exactly once across all attempts");
        let stats = dialer.stats();
        assert_eq!(stats.calls_completed, 3);
        assert_eq!(stats.calls_no_answer, 3);
        assert_eq!(stats.sms_sent, 1);

        // Attempt 1 and 2 each schedule a retry (attempt < max_attempts); attempt 3 does not.
        assert_eq!(dialer.queue_size(), 2);
    }

    #[tokio::test]
    async fn sms_fallback_never_fires_while_a_retry_is_still_scheduled() {
        // sms_after_failed_attempts <= max_attempts - 1: attempt 1 reaches the
        // threshold but still has retries left, so it must retry, not SMS.
        let mut config = DialerConfig::default();
        config.max_attempts = 3;
        config.sms_after_failed_attempts = 1;
        config.retry_delay = std::time::Duration::from_secs(3600);
        let sms = Arc::new(CountingSms::new());
        let dialer = dialer_with(config, Arc::new(AlwaysGrant), Some(sms.clone()));

        let call = sample_call(CallPriority::Normal, 1, 3);
        dialer.handle_outcome(call, CallOutcome::NoAnswer).await;

        assert_eq!(sms.0.load(Ordering::SeqCst), 0, "SMS must not fire while retries remain");
        assert_eq!(dialer.queue_size(), 1, "a retry must still be scheduled");
    }

    #[tokio::test]
    async fn answered_outcome_never_retries_or_sends_sms() {
        let sms = Arc::new(CountingSms::new());
        let dialer = dialer_with(DialerConfig::default(), Arc::new(AlwaysGrant), Some(sms.clone()));
        let call = sample_call(CallPriority::Normal, 1, 3);
        dialer.handle_outcome(call, CallOutcome::Answered).await;

        assert_eq!(sms.0.load(Ordering::SeqCst), 0);
        assert_eq!(dialer.queue_size(), 0);
        assert_eq!(dialer.stats().calls_answered, 1);
    }

    #[tokio::test]
    async fn cancelled_call_never_originates() {
        let dialer = dialer_with(DialerConfig::default(), Arc::new(AlwaysGrant), None);
        let call = dialer.queue_call(
            "patient-1",
            "+49123456",
            "Max Mustermann",
            CallPriority::Normal,
            None,
            "reminder",
            None,
            HashMap::new(),
        );
        assert!(dialer.cancel_call(call.call_id));
        assert_eq!(dialer.queue_size(), 0);
        assert!(dialer.inner.queue.lock().pop().is_none());
    }
}
