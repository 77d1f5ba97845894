//! An outbound call orchestrator built on FreeSWITCH's Event Socket Layer (ESL).
//!
//! Dials an agent leg, confirms it survived past early media, dials a lead
//! leg, bridges the two together, and records the result — all driven over
//! a single ESL connection shared by every in-flight call.
//!
//! # Architecture
//!
//! The ESL transport itself uses a split reader/writer design:
//! - [`EslClient`] (Clone + Send) — send commands from any task
//! - [`EslEventStream`] — receive events from a background reader task
//!
//! Events from the stream are fanned out by an [`EventRouter`] to whichever
//! [`Orchestrator`] call task is waiting on them, one task per in-flight
//! call.
//!
//! # Example
//!
//! ```rust,no_run
//! use dialbridge::{Config, EslClient, EventRouter, Orchestrator, RecordingManager, StartCallRequest};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::parse();
//!     let (client, events) = EslClient::connect(
//!         &config.esl_host,
//!         config.esl_port,
//!         &config.esl_password,
//!     )
//!     .await?;
//!     let (router, _reader) = EventRouter::spawn(events);
//!     let recordings = RecordingManager::new(
//!         config.recording_directory.clone(),
//!         config.recording_base_url.clone(),
//!     );
//!     let (orchestrator, mut lifecycle) = Orchestrator::new(client, router, recordings, &config);
//!
//!     let result = orchestrator
//!         .start_call(StartCallRequest {
//!             call_id: "call-1".to_string(),
//!             account_id: "acct-1".to_string(),
//!             agent_number: "15551230000".to_string(),
//!             lead_number: "15559876543".to_string(),
//!         })
//!         .await?;
//!     println!("recording will land at {}", result.recording_file);
//!
//!     while let Some(event) = lifecycle.recv().await {
//!         println!("{}: {:?}", event.call_id, event.state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod buffer;
pub mod channel;
pub mod command;
pub mod commands;
pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod protocol;
pub mod recording;
pub mod router;
pub mod variables;

pub use app::dptools::AppCommand;
pub use channel::ChannelTimetable;
pub use command::{CommandBuilder, EslResponse};
pub use commands::{
    Application, ApplicationList, DialplanType, Endpoint, Originate, OriginateError, UuidAnswer,
    UuidBridge, UuidBroadcast, UuidDeflect, UuidExists, UuidGetVar, UuidHold, UuidKill,
    UuidRecord, UuidSendDtmf, UuidSetVar, UuidTransfer, Variables, VariablesType,
};
pub use config::Config;
pub use connection::{ConnectionMode, ConnectionStatus, DisconnectReason, EslClient, EslEventStream};
pub use error::{EslError, EslResult};
pub use event::{EslEvent, EslEventPriority, EslEventType, EventFormat};
pub use orchestrator::{
    CallState, Leg, LegRole, LegState, LifecycleEvent, Orchestrator, OrchestratorError,
    StartCallRequest, StartCallResult,
};
pub use recording::{RecordingArtifact, RecordingManager};
pub use router::{EventRouter, Subscription};
