//! Call Orchestrator: drives a single outbound call from a pair of
//! `originate`s through bridging, recording, and teardown.
//!
//! One `tokio::spawn`ed task owns each call end to end; [`Orchestrator`]
//! itself only tracks a cancellation handle per call_id and reports
//! lifecycle transitions over an `mpsc` channel. The ESL connection is a
//! single shared resource (command ordering is already serialized inside
//! [`EslClient`]), so concurrent calls interleave freely on it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::commands::{
    Application, ApplicationList, DialplanType, Endpoint, Originate, UuidBridge, UuidBroadcast,
    UuidExists, UuidKill, Variables, VariablesType,
};
use crate::config::Config;
use crate::connection::EslClient;
use crate::error::EslError;
use crate::event::{EslEvent, EslEventType};
use crate::recording::{RecordingArtifact, RecordingManager};
use crate::router::EventRouter;

/// Depth of the lifecycle-event mailbox. One event per state transition per
/// call; a slow consumer backpressures the orchestrator's `emit` calls
/// rather than losing events.
const LIFECYCLE_CHANNEL_SIZE: usize = 64;

/// Where a call currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    StartingAgent,
    WaitingAgentAnswer,
    DialingLead,
    WaitingLeadAnswer,
    Bridging,
    Bridged,
    Completed,
    Failed,
    Cancelled,
}

/// Which leg of the bridge a [`Leg`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegRole {
    Agent,
    Lead,
}

/// A leg's own progress, independent of the call's overall [`CallState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegState {
    Originating,
    EarlyMedia,
    Answered,
    Bridged,
    HungUp,
}

/// One channel participating in a call.
#[derive(Debug, Clone)]
pub struct Leg {
    pub uuid: String,
    pub role: LegRole,
    pub state: LegState,
}

/// A lifecycle transition reported out of a running call.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub call_id: String,
    pub state: CallState,
    pub cause: Option<String>,
    pub recording_url: Option<String>,
}

/// Request to start a new outbound call.
#[derive(Debug, Clone)]
pub struct StartCallRequest {
    pub call_id: String,
    pub account_id: String,
    pub agent_number: String,
    pub lead_number: String,
}

/// Synchronous result of [`Orchestrator::start_call`] — returned once the
/// call's task is spawned and tracked, not once the call finishes.
#[derive(Debug, Clone)]
pub struct StartCallResult {
    pub agent_uuid: String,
    pub lead_uuid: String,
    pub recording_file: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("ESL transport error: {0}")]
    Transport(#[source] EslError),
    #[error("ESL connection lost")]
    Disconnected,
    #[error("originate rejected: {0}")]
    OriginateRejected(String),
    #[error("agent leg did not answer in time")]
    AgentNoAnswer,
    #[error("lead leg did not answer in time")]
    LeadNoAnswer,
    #[error("agent leg did not survive past early media")]
    EarlyMedia,
    #[error("bridge failed: {0}")]
    BridgeFailed(String),
    #[error("call cancelled")]
    Cancelled,
    #[error("call not found: {0}")]
    NotFound(String),
}

impl OrchestratorError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OrchestratorError::Transport(e) if e.is_recoverable())
    }
}

/// Map a transport-level failure onto the orchestrator's own taxonomy:
/// connection loss gets its own variant since it aborts every in-flight call,
/// not just the one command that surfaced it.
fn classify_transport_error(err: EslError) -> OrchestratorError {
    if err.is_connection_error() {
        OrchestratorError::Disconnected
    } else {
        OrchestratorError::Transport(err)
    }
}

/// Channel variables for the agent leg's `originate`, per the documented
/// bridge sequence: early media is not trusted until confirmed separately,
/// and the call must survive to `uuid_bridge` rather than auto-hanging up.
fn agent_originate_variables(agent_uuid: &str) -> Variables {
    let mut vars = Variables::new(VariablesType::Default);
    vars.insert("origination_uuid", agent_uuid);
    vars.insert("ignore_early_media", "false");
    vars.insert("hangup_after_bridge", "false");
    vars.insert("continue_on_fail", "true");
    vars.insert("originate_timeout", "30");
    vars.insert("bypass_media", "false");
    vars.insert("proxy_media", "false");
    vars
}

fn lead_originate_variables(lead_uuid: &str, caller_id_number: &str) -> Variables {
    let mut vars = Variables::new(VariablesType::Default);
    vars.insert("origination_uuid", lead_uuid);
    vars.insert("origination_caller_id_number", caller_id_number);
    vars.insert("ignore_early_media", "false");
    vars.insert("bypass_media", "false");
    vars.insert("proxy_media", "false");
    vars.insert("hangup_after_bridge", "false");
    vars.insert("originate_timeout", "30");
    vars
}

/// `originate {vars}sofia/gateway/<gateway>/<number> &<app>()`, with the
/// dialplan left unset so [`Originate`]'s `Display` doesn't append a
/// trailing dialplan token after an XML-style application.
fn build_originate(gateway: &str, number: &str, app: &str, variables: Variables) -> Originate {
    Originate {
        endpoint: Endpoint::SofiaGateway {
            uri: number.to_string(),
            gateway: gateway.to_string(),
            variables: Some(variables),
        },
        applications: ApplicationList(vec![Application::new(app, None::<&str>)]),
        dialplan: None,
        context: None,
        cid_name: None,
        cid_num: None,
        timeout: None,
    }
}

/// The outcome of racing an event wait against a timeout and cancellation.
enum WaitOutcome {
    Event(EslEvent),
    TimedOut,
    Cancelled,
    Disconnected,
}

async fn wait_for_event(
    router: &EventRouter,
    event_type: EslEventType,
    uuid: &str,
    wait_timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> WaitOutcome {
    let mut sub = router
        .subscribe_once(event_type, Some(uuid.to_string()))
        .await;

    match wait_timeout {
        Some(dur) => {
            tokio::select! {
                _ = cancel.cancelled() => WaitOutcome::Cancelled,
                result = tokio::time::timeout(dur, sub.recv()) => match result {
                    Ok(Some(event)) => WaitOutcome::Event(event),
                    Ok(None) => WaitOutcome::Disconnected,
                    Err(_) => WaitOutcome::TimedOut,
                },
            }
        }
        None => {
            tokio::select! {
                _ = cancel.cancelled() => WaitOutcome::Cancelled,
                event = sub.recv() => match event {
                    Some(event) => WaitOutcome::Event(event),
                    None => WaitOutcome::Disconnected,
                },
            }
        }
    }
}

/// Race `CHANNEL_HANGUP_COMPLETE` on either leg — whichever hangs up first
/// ends the call.
async fn wait_for_hangup(
    router: &EventRouter,
    agent_uuid: &str,
    lead_uuid: &str,
    cancel: &CancellationToken,
) -> WaitOutcome {
    let mut agent_sub = router
        .subscribe_once(EslEventType::ChannelHangupComplete, Some(agent_uuid.to_string()))
        .await;
    let mut lead_sub = router
        .subscribe_once(EslEventType::ChannelHangupComplete, Some(lead_uuid.to_string()))
        .await;

    tokio::select! {
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        event = agent_sub.recv() => match event {
            Some(event) => WaitOutcome::Event(event),
            None => WaitOutcome::Disconnected,
        },
        event = lead_sub.recv() => match event {
            Some(event) => WaitOutcome::Event(event),
            None => WaitOutcome::Disconnected,
        },
    }
}

/// Force-hangup a leg and advance its tracked state to `HungUp`. A no-op if
/// the leg already hung up on its own (e.g. it's the one that ended the
/// bridge) so we don't issue a redundant `uuid_kill`.
async fn kill_leg(client: &EslClient, leg: &mut Leg) {
    if leg.state == LegState::HungUp {
        return;
    }
    let cmd = UuidKill {
        uuid: leg.uuid.clone(),
        cause: None,
    };
    if let Err(e) = client.api(&cmd.to_string()).await {
        warn!(uuid = %leg.uuid, role = ?leg.role, error = %e, "uuid_kill failed");
    }
    leg.state = LegState::HungUp;
}

/// Everything a spawned call task needs, cloned once per call out of
/// [`Orchestrator`]'s own copy.
#[derive(Clone)]
struct CallContext {
    client: EslClient,
    router: EventRouter,
    recordings: RecordingManager,
    gateway: String,
    did_number: String,
    agent_answer_timeout: Duration,
    lead_answer_timeout: Duration,
    early_media_confirm_delay: Duration,
    lifecycle_tx: mpsc::Sender<LifecycleEvent>,
}

impl CallContext {
    async fn emit(
        &self,
        call_id: &str,
        state: CallState,
        cause: Option<String>,
        recording_url: Option<String>,
    ) {
        let event = LifecycleEvent {
            call_id: call_id.to_string(),
            state,
            cause,
            recording_url,
        };
        if self.lifecycle_tx.send(event).await.is_err() {
            warn!(call_id, "lifecycle receiver dropped, dropping event");
        }
    }
}

struct CallHandle {
    cancel: CancellationToken,
}

/// Tracks in-flight calls and exposes the external control surface
/// (`StartCall` / `CancelCall` / `HangupLeg`).
pub struct Orchestrator {
    context: CallContext,
    calls: Arc<Mutex<HashMap<String, CallHandle>>>,
}

impl Orchestrator {
    /// Build an orchestrator against an already-connected `client` and a
    /// router already fed by that client's event stream. Returns the
    /// lifecycle receiver alongside `self` — callers drive it however they
    /// like (log it, forward it to a webhook, feed a test assertion).
    pub fn new(
        client: EslClient,
        router: EventRouter,
        recordings: RecordingManager,
        config: &Config,
    ) -> (Self, mpsc::Receiver<LifecycleEvent>) {
        let (lifecycle_tx, lifecycle_rx) = mpsc::channel(LIFECYCLE_CHANNEL_SIZE);
        let context = CallContext {
            client,
            router,
            recordings,
            gateway: config.dialer_gateway.clone(),
            did_number: config.dialer_did_number.clone(),
            agent_answer_timeout: Duration::from_millis(config.agent_answer_timeout_ms),
            lead_answer_timeout: Duration::from_millis(config.lead_answer_timeout_ms),
            early_media_confirm_delay: Duration::from_millis(config.early_media_confirm_ms),
            lifecycle_tx,
        };
        (
            Self {
                context,
                calls: Arc::new(Mutex::new(HashMap::new())),
            },
            lifecycle_rx,
        )
    }

    /// Generate both leg UUIDs and the recording filename synchronously,
    /// spawn the call's task, and return. The task outlives this call.
    pub async fn start_call(
        &self,
        request: StartCallRequest,
    ) -> Result<StartCallResult, OrchestratorError> {
        let agent_uuid = Uuid::new_v4().to_string();
        let lead_uuid = Uuid::new_v4().to_string();
        let artifact = self.context.recordings.plan(&request.call_id);

        let cancel = CancellationToken::new();
        self.calls
            .lock()
            .await
            .insert(request.call_id.clone(), CallHandle { cancel: cancel.clone() });

        let result = StartCallResult {
            agent_uuid: agent_uuid.clone(),
            lead_uuid: lead_uuid.clone(),
            recording_file: artifact.filename.clone(),
        };

        let span = tracing::info_span!(
            "call",
            call_id = %request.call_id,
            account_id = %request.account_id,
        );
        let ctx = self.context.clone();
        let calls = self.calls.clone();
        let call_id = request.call_id.clone();

        tokio::spawn(
            async move {
                run_call(ctx, request, agent_uuid, lead_uuid, artifact, cancel).await;
                calls.lock().await.remove(&call_id);
            }
            .instrument(span),
        );

        Ok(result)
    }

    /// Trip the call's cancellation token. Any in-progress wait races this
    /// and unwinds toward [`CallState::Cancelled`]; a call already past
    /// `Bridging` tears down the agent leg and lets the lead leg's own
    /// hangup end things normally.
    pub async fn cancel_call(&self, call_id: &str) -> Result<(), OrchestratorError> {
        match self.calls.lock().await.get(call_id) {
            Some(handle) => {
                handle.cancel.cancel();
                Ok(())
            }
            None => Err(OrchestratorError::NotFound(call_id.to_string())),
        }
    }

    /// Hang up a single leg directly, bypassing call tracking entirely.
    pub async fn hangup_leg(&self, uuid: &str) -> Result<(), OrchestratorError> {
        let cmd = UuidKill {
            uuid: uuid.to_string(),
            cause: None,
        };
        self.context
            .client
            .api(&cmd.to_string())
            .await
            .map_err(classify_transport_error)?;
        Ok(())
    }
}

async fn run_call(
    ctx: CallContext,
    request: StartCallRequest,
    agent_uuid: String,
    lead_uuid: String,
    artifact: RecordingArtifact,
    cancel: CancellationToken,
) {
    let call_id = request.call_id.clone();

    match drive_call(&ctx, &request, &agent_uuid, &lead_uuid, &artifact, &cancel).await {
        Ok(()) => {
            let url = ctx.recordings.resolve_url(&artifact);
            info!(call_id = %call_id, "call completed");
            ctx.emit(&call_id, CallState::Completed, None, Some(url)).await;
        }
        Err(OrchestratorError::Cancelled) => {
            ctx.emit(&call_id, CallState::Cancelled, None, None).await;
        }
        Err(err) => {
            warn!(call_id = %call_id, error = %err, "call failed");
            ctx.emit(&call_id, CallState::Failed, Some(err.to_string()), None)
                .await;
        }
    }
}

/// The "separate originate + uuid_bridge" sequence: two independent
/// originates, each parked on a keep-alive app until the other side is
/// ready, then explicitly bridged together.
async fn drive_call(
    ctx: &CallContext,
    request: &StartCallRequest,
    agent_uuid: &str,
    lead_uuid: &str,
    artifact: &RecordingArtifact,
    cancel: &CancellationToken,
) -> Result<(), OrchestratorError> {
    let call_id = &request.call_id;
    let mut agent_leg = Leg {
        uuid: agent_uuid.to_string(),
        role: LegRole::Agent,
        state: LegState::Originating,
    };
    let mut lead_leg = Leg {
        uuid: lead_uuid.to_string(),
        role: LegRole::Lead,
        state: LegState::Originating,
    };

    ctx.emit(call_id, CallState::StartingAgent, None, None).await;

    let agent_originate = build_originate(
        &ctx.gateway,
        &request.agent_number,
        "echo",
        agent_originate_variables(agent_uuid),
    );
    let response = ctx
        .client
        .api(&agent_originate.to_string())
        .await
        .map_err(classify_transport_error)?;
    if !response.body().is_some_and(|b| b.starts_with("+OK")) {
        return Err(OrchestratorError::OriginateRejected(response.body_string()));
    }

    ctx.emit(call_id, CallState::WaitingAgentAnswer, None, None).await;

    match wait_for_event(
        &ctx.router,
        EslEventType::ChannelAnswer,
        agent_uuid,
        Some(ctx.agent_answer_timeout),
        cancel,
    )
    .await
    {
        WaitOutcome::Event(_) => {
            agent_leg.state = LegState::EarlyMedia;
        }
        WaitOutcome::TimedOut => {
            kill_leg(&ctx.client, &mut agent_leg).await;
            return Err(OrchestratorError::AgentNoAnswer);
        }
        WaitOutcome::Cancelled => {
            kill_leg(&ctx.client, &mut agent_leg).await;
            return Err(OrchestratorError::Cancelled);
        }
        WaitOutcome::Disconnected => return Err(OrchestratorError::Disconnected),
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            kill_leg(&ctx.client, &mut agent_leg).await;
            return Err(OrchestratorError::Cancelled);
        }
        _ = tokio::time::sleep(ctx.early_media_confirm_delay) => {}
    }

    let exists = ctx
        .client
        .api(&UuidExists { uuid: agent_uuid.to_string() }.to_string())
        .await
        .map_err(classify_transport_error)?;
    if !exists.body().is_some_and(|b| b.contains("true")) {
        kill_leg(&ctx.client, &mut agent_leg).await;
        return Err(OrchestratorError::EarlyMedia);
    }
    agent_leg.state = LegState::Answered;

    ctx.emit(call_id, CallState::DialingLead, None, None).await;

    let lead_originate = build_originate(
        &ctx.gateway,
        &request.lead_number,
        "park",
        lead_originate_variables(lead_uuid, &ctx.did_number),
    );
    let response = ctx
        .client
        .api(&lead_originate.to_string())
        .await
        .map_err(classify_transport_error)?;
    if !response.body().is_some_and(|b| b.starts_with("+OK")) {
        kill_leg(&ctx.client, &mut agent_leg).await;
        return Err(OrchestratorError::OriginateRejected(response.body_string()));
    }

    ctx.emit(call_id, CallState::WaitingLeadAnswer, None, None).await;

    match wait_for_event(
        &ctx.router,
        EslEventType::ChannelAnswer,
        lead_uuid,
        Some(ctx.lead_answer_timeout),
        cancel,
    )
    .await
    {
        WaitOutcome::Event(_) => {
            lead_leg.state = LegState::Answered;
        }
        WaitOutcome::TimedOut => {
            kill_leg(&ctx.client, &mut agent_leg).await;
            kill_leg(&ctx.client, &mut lead_leg).await;
            return Err(OrchestratorError::LeadNoAnswer);
        }
        WaitOutcome::Cancelled => {
            kill_leg(&ctx.client, &mut agent_leg).await;
            kill_leg(&ctx.client, &mut lead_leg).await;
            return Err(OrchestratorError::Cancelled);
        }
        WaitOutcome::Disconnected => return Err(OrchestratorError::Disconnected),
    }

    ctx.emit(call_id, CallState::Bridging, None, None).await;

    // Best-effort: stop the agent's keep-alive echo before bridging so the
    // agent doesn't keep hearing themselves once the lead is attached.
    if let Err(e) = ctx
        .client
        .api(&UuidBroadcast { uuid: agent_uuid.to_string() }.to_string())
        .await
    {
        warn!(call_id = %call_id, error = %e, "uuid_broadcast stop failed, continuing");
    }

    let bridge_response = ctx
        .client
        .api(
            &UuidBridge {
                uuid: agent_uuid.to_string(),
                other: lead_uuid.to_string(),
            }
            .to_string(),
        )
        .await
        .map_err(classify_transport_error)?;
    if !bridge_response.body().is_some_and(|b| b.starts_with("+OK")) {
        kill_leg(&ctx.client, &mut agent_leg).await;
        kill_leg(&ctx.client, &mut lead_leg).await;
        return Err(OrchestratorError::BridgeFailed(bridge_response.body_string()));
    }
    agent_leg.state = LegState::Bridged;
    lead_leg.state = LegState::Bridged;

    ctx.recordings
        .start(&ctx.client, call_id, artifact, agent_uuid, lead_uuid)
        .await;
    ctx.emit(call_id, CallState::Bridged, None, None).await;

    match wait_for_hangup(&ctx.router, agent_uuid, lead_uuid, cancel).await {
        WaitOutcome::Event(event) => {
            let agent_hung_up = event.unique_id().map(String::as_str) == Some(agent_uuid);
            let (survivor, hung_up) = if agent_hung_up {
                (&mut lead_leg, &mut agent_leg)
            } else {
                (&mut agent_leg, &mut lead_leg)
            };
            hung_up.state = LegState::HungUp;
            kill_leg(&ctx.client, survivor).await;
            Ok(())
        }
        WaitOutcome::Cancelled => {
            kill_leg(&ctx.client, &mut agent_leg).await;
            Err(OrchestratorError::Cancelled)
        }
        WaitOutcome::TimedOut => unreachable!("hangup wait carries no timeout"),
        WaitOutcome::Disconnected => Err(OrchestratorError::Disconnected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_variables_include_caller_id() {
        let vars = lead_originate_variables("lead-1", "15551234567");
        assert_eq!(vars.get("origination_caller_id_number"), Some("15551234567"));
        assert_eq!(vars.get("origination_uuid"), Some("lead-1"));
    }

    #[test]
    fn build_originate_omits_trailing_dialplan_token() {
        let vars = agent_originate_variables("agent-1");
        let originate = build_originate("gw1", "15559990000", "echo", vars);
        let rendered = originate.to_string();
        assert!(rendered.starts_with("originate {origination_uuid=agent-1"));
        assert!(rendered.contains("}sofia/gateway/gw1/15559990000 &echo()"));
        assert!(!rendered.ends_with("XML"));
    }

    #[test]
    fn classify_transport_error_distinguishes_disconnect() {
        let disconnect = classify_transport_error(EslError::ConnectionClosed);
        assert!(matches!(disconnect, OrchestratorError::Disconnected));

        let other = classify_transport_error(EslError::CommandFailed {
            reply_text: "-ERR no such channel".to_string(),
        });
        assert!(matches!(other, OrchestratorError::Transport(_)));
    }
}
