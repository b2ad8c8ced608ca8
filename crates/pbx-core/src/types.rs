//! FreeSWITCH-shaped typed enums: channel state, hangup cause, and
//! transfer type, plus the parsed event-socket event envelope.

use std::collections::HashMap;

pub type ChannelUuid = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    New,
    Init,
    Routing,
    SoftExecute,
    Execute,
    ExchangeMedia,
    Park,
    ConsumeMedia,
    Hibernate,
    Reset,
    Hangup,
    Reporting,
    Destroy,
}

impl ChannelState {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "CS_NEW" => Self::New,
            "CS_INIT" => Self::Init,
            "CS_ROUTING" => Self::Routing,
            "CS_SOFT_EXECUTE" => Self::SoftExecute,
            "CS_EXECUTE" => Self::Execute,
            "CS_EXCHANGE_MEDIA" => Self::ExchangeMedia,
            "CS_PARK" => Self::Park,
            "CS_CONSUME_MEDIA" => Self::ConsumeMedia,
            "CS_HIBERNATE" => Self::Hibernate,
            "CS_RESET" => Self::Reset,
            "CS_HANGUP" => Self::Hangup,
            "CS_REPORTING" => Self::Reporting,
            "CS_DESTROY" => Self::Destroy,
            _ => return None,
        })
    }
}

/// Hangup cause. `Other` keeps forward compatibility with PBX-specific
/// causes this enum doesn't enumerate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HangupCause {
    NormalClearing,
    UserBusy,
    NoAnswer,
    CallRejected,
    DestinationOutOfOrder,
    InvalidNumberFormat,
    NormalTemporaryFailure,
    RecoveryOnTimerExpire,
    OriginatorCancel,
    LoseRace,
    UserNotRegistered,
    Other(String),
}

impl HangupCause {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "NORMAL_CLEARING" => Self::NormalClearing,
            "USER_BUSY" => Self::UserBusy,
            "NO_ANSWER" => Self::NoAnswer,
            "CALL_REJECTED" => Self::CallRejected,
            "DESTINATION_OUT_OF_ORDER" => Self::DestinationOutOfOrder,
            "INVALID_NUMBER_FORMAT" => Self::InvalidNumberFormat,
            "NORMAL_TEMPORARY_FAILURE" => Self::NormalTemporaryFailure,
            "RECOVERY_ON_TIMER_EXPIRE" => Self::RecoveryOnTimerExpire,
            "ORIGINATOR_CANCEL" => Self::OriginatorCancel,
            "LOSE_RACE" => Self::LoseRace,
            "USER_NOT_REGISTERED" => Self::UserNotRegistered,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Self::NormalClearing => "NORMAL_CLEARING",
            Self::UserBusy => "USER_BUSY",
            Self::NoAnswer => "NO_ANSWER",
            Self::CallRejected => "CALL_REJECTED",
            Self::DestinationOutOfOrder => "DESTINATION_OUT_OF_ORDER",
            Self::InvalidNumberFormat => "INVALID_NUMBER_FORMAT",
            Self::NormalTemporaryFailure => "NORMAL_TEMPORARY_FAILURE",
            Self::RecoveryOnTimerExpire => "RECOVERY_ON_TIMER_EXPIRE",
            Self::OriginatorCancel => "ORIGINATOR_CANCEL",
            Self::LoseRace => "LOSE_RACE",
            Self::UserNotRegistered => "USER_NOT_REGISTERED",
            Self::Other(raw) => raw,
        }
    }
}

impl Default for HangupCause {
    fn default() -> Self {
        Self::NormalClearing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Blind,
    Attended,
}

/// A parsed `text/event-plain` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbxEvent {
    pub event_name: String,
    pub event_uuid: String,
    pub channel_uuid: String,
    pub caller_id_number: String,
    pub destination_number: String,
    pub channel_state: Option<ChannelState>,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct OriginateRequest {
    pub destination: String,
    pub caller_id_number: Option<String>,
    pub caller_id_name: Option<String>,
    pub timeout_secs: u32,
    pub gateway: String,
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}
