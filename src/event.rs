//! ESL event types and structures

use crate::variables::EslArray;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Event format types supported by FreeSWITCH ESL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    /// Plain text format (default)
    Plain,
    /// JSON format
    Json,
    /// XML format
    Xml,
}

impl fmt::Display for EventFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFormat::Plain => write!(f, "plain"),
            EventFormat::Json => write!(f, "json"),
            EventFormat::Xml => write!(f, "xml"),
        }
    }
}

/// FreeSWITCH event types matching the canonical order from `esl_event.h`
/// and `switch_event.c` EVENT_NAMES[].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EslEventType {
    Custom,
    Clone,
    ChannelCreate,
    ChannelDestroy,
    ChannelState,
    ChannelCallstate,
    ChannelAnswer,
    ChannelHangup,
    ChannelHangupComplete,
    ChannelExecute,
    ChannelExecuteComplete,
    ChannelHold,
    ChannelUnhold,
    ChannelBridge,
    ChannelUnbridge,
    ChannelProgress,
    ChannelProgressMedia,
    ChannelOutgoing,
    ChannelPark,
    ChannelUnpark,
    ChannelApplication,
    ChannelOriginate,
    ChannelUuid,
    Api,
    Log,
    InboundChan,
    OutboundChan,
    Startup,
    Shutdown,
    Publish,
    Unpublish,
    Talk,
    Notalk,
    SessionCrash,
    ModuleLoad,
    ModuleUnload,
    Dtmf,
    Message,
    PresenceIn,
    NotifyIn,
    PresenceOut,
    PresenceProbe,
    MessageWaiting,
    MessageQuery,
    Roster,
    Codec,
    BackgroundJob,
    DetectedSpeech,
    DetectedTone,
    PrivateCommand,
    Heartbeat,
    Trap,
    AddSchedule,
    DelSchedule,
    ExeSchedule,
    ReSchedule,
    ReloadXml,
    Notify,
    PhoneFeature,
    PhoneFeatureSubscribe,
    SendMessage,
    RecvMessage,
    RequestParams,
    ChannelData,
    General,
    Command,
    SessionHeartbeat,
    ClientDisconnected,
    ServerDisconnected,
    SendInfo,
    RecvInfo,
    RecvRtcpMessage,
    SendRtcpMessage,
    CallSecure,
    Nat,
    RecordStart,
    RecordStop,
    PlaybackStart,
    PlaybackStop,
    CallUpdate,
    Failure,
    SocketData,
    MediaBugStart,
    MediaBugStop,
    ConferenceDataQuery,
    ConferenceData,
    CallSetupReq,
    CallSetupResult,
    CallDetail,
    DeviceState,
    Text,
    ShutdownRequested,
    /// Subscribe to all events
    All,
    // --- Not in libs/esl/ EVENT_NAMES[], only in switch_event.c ---
    // check-event-types.sh stops scanning at the All variant above.
    StartRecording,
}

impl fmt::Display for EslEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EslEventType::Custom => "CUSTOM",
            EslEventType::Clone => "CLONE",
            EslEventType::ChannelCreate => "CHANNEL_CREATE",
            EslEventType::ChannelDestroy => "CHANNEL_DESTROY",
            EslEventType::ChannelState => "CHANNEL_STATE",
            EslEventType::ChannelCallstate => "CHANNEL_CALLSTATE",
            EslEventType::ChannelAnswer => "CHANNEL_ANSWER",
            EslEventType::ChannelHangup => "CHANNEL_HANGUP",
            EslEventType::ChannelHangupComplete => "CHANNEL_HANGUP_COMPLETE",
            EslEventType::ChannelExecute => "CHANNEL_EXECUTE",
            EslEventType::ChannelExecuteComplete => "CHANNEL_EXECUTE_COMPLETE",
            EslEventType::ChannelHold => "CHANNEL_HOLD",
            EslEventType::ChannelUnhold => "CHANNEL_UNHOLD",
            EslEventType::ChannelBridge => "CHANNEL_BRIDGE",
            EslEventType::ChannelUnbridge => "CHANNEL_UNBRIDGE",
            EslEventType::ChannelProgress => "CHANNEL_PROGRESS",
            EslEventType::ChannelProgressMedia => "CHANNEL_PROGRESS_MEDIA",
            EslEventType::ChannelOutgoing => "CHANNEL_OUTGOING",
            EslEventType::ChannelPark => "CHANNEL_PARK",
            EslEventType::ChannelUnpark => "CHANNEL_UNPARK",
            EslEventType::ChannelApplication => "CHANNEL_APPLICATION",
            EslEventType::ChannelOriginate => "CHANNEL_ORIGINATE",
            EslEventType::ChannelUuid => "CHANNEL_UUID",
            EslEventType::Api => "API",
            EslEventType::Log => "LOG",
            EslEventType::InboundChan => "INBOUND_CHAN",
            EslEventType::OutboundChan => "OUTBOUND_CHAN",
            EslEventType::Startup => "STARTUP",
            EslEventType::Shutdown => "SHUTDOWN",
            EslEventType::Publish => "PUBLISH",
            EslEventType::Unpublish => "UNPUBLISH",
            EslEventType::Talk => "TALK",
            EslEventType::Notalk => "NOTALK",
            EslEventType::SessionCrash => "SESSION_CRASH",
            EslEventType::ModuleLoad => "MODULE_LOAD",
            EslEventType::ModuleUnload => "MODULE_UNLOAD",
            EslEventType::Dtmf => "DTMF",
            EslEventType::Message => "MESSAGE",
            EslEventType::PresenceIn => "PRESENCE_IN",
            EslEventType::NotifyIn => "NOTIFY_IN",
            EslEventType::PresenceOut => "PRESENCE_OUT",
            EslEventType::PresenceProbe => "PRESENCE_PROBE",
            EslEventType::MessageWaiting => "MESSAGE_WAITING",
            EslEventType::MessageQuery => "MESSAGE_QUERY",
            EslEventType::Roster => "ROSTER",
            EslEventType::Codec => "CODEC",
            EslEventType::BackgroundJob => "BACKGROUND_JOB",
            EslEventType::DetectedSpeech => "DETECTED_SPEECH",
            EslEventType::DetectedTone => "DETECTED_TONE",
            EslEventType::PrivateCommand => "PRIVATE_COMMAND",
            EslEventType::Heartbeat => "HEARTBEAT",
            EslEventType::Trap => "TRAP",
            EslEventType::AddSchedule => "ADD_SCHEDULE",
            EslEventType::DelSchedule => "DEL_SCHEDULE",
            EslEventType::ExeSchedule => "EXE_SCHEDULE",
            EslEventType::ReSchedule => "RE_SCHEDULE",
            EslEventType::ReloadXml => "RELOADXML",
            EslEventType::Notify => "NOTIFY",
            EslEventType::PhoneFeature => "PHONE_FEATURE",
            EslEventType::PhoneFeatureSubscribe => "PHONE_FEATURE_SUBSCRIBE",
            EslEventType::SendMessage => "SEND_MESSAGE",
            EslEventType::RecvMessage => "RECV_MESSAGE",
            EslEventType::RequestParams => "REQUEST_PARAMS",
            EslEventType::ChannelData => "CHANNEL_DATA",
            EslEventType::General => "GENERAL",
            EslEventType::Command => "COMMAND",
            EslEventType::SessionHeartbeat => "SESSION_HEARTBEAT",
            EslEventType::ClientDisconnected => "CLIENT_DISCONNECTED",
            EslEventType::ServerDisconnected => "SERVER_DISCONNECTED",
            EslEventType::SendInfo => "SEND_INFO",
            EslEventType::RecvInfo => "RECV_INFO",
            EslEventType::RecvRtcpMessage => "RECV_RTCP_MESSAGE",
            EslEventType::SendRtcpMessage => "SEND_RTCP_MESSAGE",
            EslEventType::CallSecure => "CALL_SECURE",
            EslEventType::Nat => "NAT",
            EslEventType::RecordStart => "RECORD_START",
            EslEventType::RecordStop => "RECORD_STOP",
            EslEventType::PlaybackStart => "PLAYBACK_START",
            EslEventType::PlaybackStop => "PLAYBACK_STOP",
            EslEventType::CallUpdate => "CALL_UPDATE",
            EslEventType::Failure => "FAILURE",
            EslEventType::SocketData => "SOCKET_DATA",
            EslEventType::MediaBugStart => "MEDIA_BUG_START",
            EslEventType::MediaBugStop => "MEDIA_BUG_STOP",
            EslEventType::ConferenceDataQuery => "CONFERENCE_DATA_QUERY",
            EslEventType::ConferenceData => "CONFERENCE_DATA",
            EslEventType::CallSetupReq => "CALL_SETUP_REQ",
            EslEventType::CallSetupResult => "CALL_SETUP_RESULT",
            EslEventType::CallDetail => "CALL_DETAIL",
            EslEventType::DeviceState => "DEVICE_STATE",
            EslEventType::Text => "TEXT",
            EslEventType::ShutdownRequested => "SHUTDOWN_REQUESTED",
            EslEventType::All => "ALL",
            // Not in libs/esl/ EVENT_NAMES[]
            EslEventType::StartRecording => "START_RECORDING",
        };
        write!(f, "{}", name)
    }
}

impl EslEventType {
    /// Parse event type from wire name (case-insensitive).
    pub fn parse_event_type(s: &str) -> Option<Self> {
        match s
            .to_uppercase()
            .as_str()
        {
            "CUSTOM" => Some(EslEventType::Custom),
            "CLONE" => Some(EslEventType::Clone),
            "CHANNEL_CREATE" => Some(EslEventType::ChannelCreate),
            "CHANNEL_DESTROY" => Some(EslEventType::ChannelDestroy),
            "CHANNEL_STATE" => Some(EslEventType::ChannelState),
            "CHANNEL_CALLSTATE" => Some(EslEventType::ChannelCallstate),
            "CHANNEL_ANSWER" => Some(EslEventType::ChannelAnswer),
            "CHANNEL_HANGUP" => Some(EslEventType::ChannelHangup),
            "CHANNEL_HANGUP_COMPLETE" => Some(EslEventType::ChannelHangupComplete),
            "CHANNEL_EXECUTE" => Some(EslEventType::ChannelExecute),
            "CHANNEL_EXECUTE_COMPLETE" => Some(EslEventType::ChannelExecuteComplete),
            "CHANNEL_HOLD" => Some(EslEventType::ChannelHold),
            "CHANNEL_UNHOLD" => Some(EslEventType::ChannelUnhold),
            "CHANNEL_BRIDGE" => Some(EslEventType::ChannelBridge),
            "CHANNEL_UNBRIDGE" => Some(EslEventType::ChannelUnbridge),
            "CHANNEL_PROGRESS" => Some(EslEventType::ChannelProgress),
            "CHANNEL_PROGRESS_MEDIA" => Some(EslEventType::ChannelProgressMedia),
            "CHANNEL_OUTGOING" => Some(EslEventType::ChannelOutgoing),
            "CHANNEL_PARK" => Some(EslEventType::ChannelPark),
            "CHANNEL_UNPARK" => Some(EslEventType::ChannelUnpark),
            "CHANNEL_APPLICATION" => Some(EslEventType::ChannelApplication),
            "CHANNEL_ORIGINATE" => Some(EslEventType::ChannelOriginate),
            "CHANNEL_UUID" => Some(EslEventType::ChannelUuid),
            "API" => Some(EslEventType::Api),
            "LOG" => Some(EslEventType::Log),
            "INBOUND_CHAN" => Some(EslEventType::InboundChan),
            "OUTBOUND_CHAN" => Some(EslEventType::OutboundChan),
            "STARTUP" => Some(EslEventType::Startup),
            "SHUTDOWN" => Some(EslEventType::Shutdown),
            "PUBLISH" => Some(EslEventType::Publish),
            "UNPUBLISH" => Some(EslEventType::Unpublish),
            "TALK" => Some(EslEventType::Talk),
            "NOTALK" => Some(EslEventType::Notalk),
            "SESSION_CRASH" => Some(EslEventType::SessionCrash),
            "MODULE_LOAD" => Some(EslEventType::ModuleLoad),
            "MODULE_UNLOAD" => Some(EslEventType::ModuleUnload),
            "DTMF" => Some(EslEventType::Dtmf),
            "MESSAGE" => Some(EslEventType::Message),
            "PRESENCE_IN" => Some(EslEventType::PresenceIn),
            "NOTIFY_IN" => Some(EslEventType::NotifyIn),
            "PRESENCE_OUT" => Some(EslEventType::PresenceOut),
            "PRESENCE_PROBE" => Some(EslEventType::PresenceProbe),
            "MESSAGE_WAITING" => Some(EslEventType::MessageWaiting),
            "MESSAGE_QUERY" => Some(EslEventType::MessageQuery),
            "ROSTER" => Some(EslEventType::Roster),
            "CODEC" => Some(EslEventType::Codec),
            "BACKGROUND_JOB" => Some(EslEventType::BackgroundJob),
            "DETECTED_SPEECH" => Some(EslEventType::DetectedSpeech),
            "DETECTED_TONE" => Some(EslEventType::DetectedTone),
            "PRIVATE_COMMAND" => Some(EslEventType::PrivateCommand),
            "HEARTBEAT" => Some(EslEventType::Heartbeat),
            "TRAP" => Some(EslEventType::Trap),
            "ADD_SCHEDULE" => Some(EslEventType::AddSchedule),
            "DEL_SCHEDULE" => Some(EslEventType::DelSchedule),
            "EXE_SCHEDULE" => Some(EslEventType::ExeSchedule),
            "RE_SCHEDULE" => Some(EslEventType::ReSchedule),
            "RELOADXML" => Some(EslEventType::ReloadXml),
            "NOTIFY" => Some(EslEventType::Notify),
            "PHONE_FEATURE" => Some(EslEventType::PhoneFeature),
            "PHONE_FEATURE_SUBSCRIBE" => Some(EslEventType::PhoneFeatureSubscribe),
            "SEND_MESSAGE" => Some(EslEventType::SendMessage),
            "RECV_MESSAGE" => Some(EslEventType::RecvMessage),
            "REQUEST_PARAMS" => Some(EslEventType::RequestParams),
            "CHANNEL_DATA" => Some(EslEventType::ChannelData),
            "GENERAL" => Some(EslEventType::General),
            "COMMAND" => Some(EslEventType::Command),
            "SESSION_HEARTBEAT" => Some(EslEventType::SessionHeartbeat),
            "CLIENT_DISCONNECTED" => Some(EslEventType::ClientDisconnected),
            "SERVER_DISCONNECTED" => Some(EslEventType::ServerDisconnected),
            "SEND_INFO" => Some(EslEventType::SendInfo),
            "RECV_INFO" => Some(EslEventType::RecvInfo),
            "RECV_RTCP_MESSAGE" => Some(EslEventType::RecvRtcpMessage),
            "SEND_RTCP_MESSAGE" => Some(EslEventType::SendRtcpMessage),
            "CALL_SECURE" => Some(EslEventType::CallSecure),
            "NAT" => Some(EslEventType::Nat),
            "RECORD_START" => Some(EslEventType::RecordStart),
            "RECORD_STOP" => Some(EslEventType::RecordStop),
            "PLAYBACK_START" => Some(EslEventType::PlaybackStart),
            "PLAYBACK_STOP" => Some(EslEventType::PlaybackStop),
            "CALL_UPDATE" => Some(EslEventType::CallUpdate),
            "FAILURE" => Some(EslEventType::Failure),
            "SOCKET_DATA" => Some(EslEventType::SocketData),
            "MEDIA_BUG_START" => Some(EslEventType::MediaBugStart),
            "MEDIA_BUG_STOP" => Some(EslEventType::MediaBugStop),
            "CONFERENCE_DATA_QUERY" => Some(EslEventType::ConferenceDataQuery),
            "CONFERENCE_DATA" => Some(EslEventType::ConferenceData),
            "CALL_SETUP_REQ" => Some(EslEventType::CallSetupReq),
            "CALL_SETUP_RESULT" => Some(EslEventType::CallSetupResult),
            "CALL_DETAIL" => Some(EslEventType::CallDetail),
            "DEVICE_STATE" => Some(EslEventType::DeviceState),
            "TEXT" => Some(EslEventType::Text),
            "SHUTDOWN_REQUESTED" => Some(EslEventType::ShutdownRequested),
            "ALL" => Some(EslEventType::All),
            // Not in libs/esl/ EVENT_NAMES[]
            "START_RECORDING" => Some(EslEventType::StartRecording),
            _ => None,
        }
    }
}

/// Event priority levels matching FreeSWITCH `esl_priority_t`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EslEventPriority {
    Normal,
    Low,
    High,
}

impl fmt::Display for EslEventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EslEventPriority::Normal => write!(f, "NORMAL"),
            EslEventPriority::Low => write!(f, "LOW"),
            EslEventPriority::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for EslEventPriority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s
            .to_uppercase()
            .as_str()
        {
            "NORMAL" => Ok(EslEventPriority::Normal),
            "LOW" => Ok(EslEventPriority::Low),
            "HIGH" => Ok(EslEventPriority::High),
            _ => Err(()),
        }
    }
}

/// ESL Event structure containing headers and optional body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EslEvent {
    /// Event type
    pub event_type: Option<EslEventType>,
    /// Event headers as key-value pairs
    pub headers: HashMap<String, String>,
    /// Optional event body content
    pub body: Option<String>,
}

impl EslEvent {
    /// Create a new empty event
    pub fn new() -> Self {
        Self {
            event_type: None,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Create event with specified type
    pub fn with_type(event_type: EslEventType) -> Self {
        Self {
            event_type: Some(event_type),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Get event type
    pub fn event_type(&self) -> Option<EslEventType> {
        self.event_type
    }

    /// Get header value by name
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .get(name)
    }

    /// Set header value
    pub fn set_header(&mut self, name: String, value: String) {
        self.headers
            .insert(name, value);
    }

    /// Remove a header, returning its value if it existed
    pub fn del_header(&mut self, name: &str) -> Option<String> {
        self.headers
            .remove(name)
    }

    /// Get event body
    pub fn body(&self) -> Option<&String> {
        self.body
            .as_ref()
    }

    /// Set event body
    pub fn set_body(&mut self, body: String) {
        self.body = Some(body);
    }

    /// Set event priority, adding a `priority` header.
    pub fn set_priority(&mut self, priority: EslEventPriority) {
        self.set_header("priority".into(), priority.to_string());
    }

    /// Get event priority from the `priority` header.
    pub fn priority(&self) -> Option<EslEventPriority> {
        self.header("priority")?
            .parse()
            .ok()
    }

    /// Append a value to a multi-value header (PUSH semantics).
    ///
    /// If the header doesn't exist, sets it as a plain value.
    /// If it exists as a plain value, converts to `ARRAY::old|:new`.
    /// If it already has an `ARRAY::` prefix, appends the new value.
    pub fn push_header(&mut self, name: &str, value: &str) {
        self.stack_header(name, value, EslArray::push);
    }

    /// Prepend a value to a multi-value header (UNSHIFT semantics).
    ///
    /// Same conversion rules as `push_header()`, but inserts at the front.
    pub fn unshift_header(&mut self, name: &str, value: &str) {
        self.stack_header(name, value, EslArray::unshift);
    }

    fn stack_header(&mut self, name: &str, value: &str, op: fn(&mut EslArray, String)) {
        match self
            .headers
            .get(name)
        {
            None => {
                self.set_header(name.into(), value.into());
            }
            Some(existing) => {
                let mut arr = match EslArray::parse(existing) {
                    Some(arr) => arr,
                    None => EslArray::new(vec![existing.clone()]),
                };
                op(&mut arr, value.into());
                self.set_header(name.into(), arr.to_string());
            }
        }
    }

    /// Get unique ID for the event/channel
    pub fn unique_id(&self) -> Option<&String> {
        self.header("Unique-ID")
            .or_else(|| self.header("Caller-Unique-ID"))
    }

    /// Get job UUID for background jobs
    pub fn job_uuid(&self) -> Option<&String> {
        self.header("Job-UUID")
    }

    /// Check if this is a specific event type
    pub fn is_event_type(&self, event_type: EslEventType) -> bool {
        self.event_type == Some(event_type)
    }

    /// Extract a [`ChannelTimetable`](crate::channel::ChannelTimetable) using the `"Caller"` prefix.
    pub fn caller_timetable(&self) -> Option<crate::channel::ChannelTimetable> {
        crate::channel::ChannelTimetable::from_event(self, "Caller")
    }

    /// Extract a [`ChannelTimetable`](crate::channel::ChannelTimetable) using the `"Other-Leg"` prefix.
    pub fn other_leg_timetable(&self) -> Option<crate::channel::ChannelTimetable> {
        crate::channel::ChannelTimetable::from_event(self, "Other-Leg")
    }

    /// Extract a [`ChannelTimetable`](crate::channel::ChannelTimetable) using a custom header prefix.
    pub fn timetable(&self, prefix: &str) -> Option<crate::channel::ChannelTimetable> {
        crate::channel::ChannelTimetable::from_event(self, prefix)
    }

    /// Serialize to ESL plain text wire format with percent-encoded header values.
    ///
    /// This is the inverse of `EslParser::parse_plain_event()`. The output can
    /// be fed back through the parser to reconstruct an equivalent `EslEvent`
    /// (round-trip).
    ///
    /// `Event-Name` is emitted first, remaining headers are sorted alphabetically
    /// for deterministic output. `Content-Length` from stored headers is skipped
    /// and recomputed from the body if present.
    pub fn to_plain_format(&self) -> String {
        let mut result = String::new();

        if let Some(event_name) = self
            .headers
            .get("Event-Name")
        {
            result.push_str(&format!(
                "Event-Name: {}\n",
                percent_encode(event_name.as_bytes(), NON_ALPHANUMERIC)
            ));
        }

        let mut sorted_headers: Vec<_> = self
            .headers
            .iter()
            .filter(|(k, _)| k.as_str() != "Event-Name" && k.as_str() != "Content-Length")
            .collect();
        sorted_headers.sort_by_key(|(k, _)| k.as_str());

        for (key, value) in sorted_headers {
            result.push_str(&format!(
                "{}: {}\n",
                key,
                percent_encode(value.as_bytes(), NON_ALPHANUMERIC)
            ));
        }

        if let Some(body) = &self.body {
            result.push_str(&format!("Content-Length: {}\n", body.len()));
            result.push('\n');
            result.push_str(body);
        } else {
            result.push('\n');
        }

        result
    }
}

impl Default for EslEvent {
    fn default() -> Self {
        Self::new()
    }
}
