//! Per-connection WebSocket handler for the nearby feed.
//!
//! Keeps WebSocket framing and heartbeats at the edge while the injected
//! [`ProximitySubscription`] supplies report events. The public contract pings
//! every 5s and considers a connection idle after 10s without client traffic.
//! Tests shorten these intervals to speed up feedback.

use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::time;
use tracing::{debug, warn};

use crate::domain::ports::SpatialIndexError;
use crate::domain::{Error, GeoPoint, ProximityEvent, ProximitySubscription, RadiusKm};
use crate::inbound::ws::messages::{CriteriaUpdateRequest, NearbyMessage};

/// Time between heartbeats to the client (5s in production, shorter in tests).
#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Max idle time before disconnecting the client (10s in production, shorter in tests).
#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

pub(super) async fn handle_ws_session(
    subscription: ProximitySubscription,
    session: Session,
    stream: MessageStream,
) {
    WsSession::new(subscription).run(session, stream).await;
}

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    InvalidPayload,
    SubscriptionEnded,
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

struct WsSession {
    subscription: ProximitySubscription,
}

impl WsSession {
    fn new(subscription: ProximitySubscription) -> Self {
        Self { subscription }
    }

    async fn run(mut self, mut session: Session, mut stream: MessageStream) {
        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

        loop {
            let result = tokio::select! {
                _ = heartbeat.tick() => {
                    Self::handle_heartbeat_tick(&mut session, &last_heartbeat).await
                }
                message = stream.recv() => {
                    self.handle_stream_message(&mut session, &mut last_heartbeat, message)
                        .await
                }
                event = self.subscription.next_event() => {
                    Self::handle_proximity_event(&mut session, event).await
                }
            };

            if let Err(error) = result {
                Self::log_shutdown_reason(&error);
                self.subscription.close();
                let close_action = Self::close_action_for(&error);
                Self::close_session_if_needed(session, close_action).await;
                return;
            }
        }
    }

    async fn handle_heartbeat_tick(
        session: &mut Session,
        last_heartbeat: &Instant,
    ) -> Result<(), SessionError> {
        if Instant::now().duration_since(*last_heartbeat) > CLIENT_TIMEOUT {
            return Err(SessionError::HeartbeatTimeout);
        }

        session.ping(b"").await.map_err(SessionError::Network)
    }

    async fn handle_proximity_event(
        session: &mut Session,
        event: Option<ProximityEvent>,
    ) -> Result<(), SessionError> {
        let Some(event) = event else {
            return Err(SessionError::SubscriptionEnded);
        };
        Self::send_json(session, &NearbyMessage::from(event))
            .await
            .map_err(SessionError::Network)
    }

    async fn handle_stream_message(
        &mut self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let Some(message) = message else {
            return Err(SessionError::StreamClosed);
        };

        match message {
            Ok(message) => self.handle_message(session, last_heartbeat, message).await,
            Err(error) => Err(SessionError::Protocol(error)),
        }
    }

    async fn handle_message(
        &mut self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Message,
    ) -> Result<(), SessionError> {
        match message {
            Message::Ping(payload) => {
                *last_heartbeat = Instant::now();
                session
                    .pong(&payload)
                    .await
                    .map_err(SessionError::Network)?;
                Ok(())
            }
            Message::Text(text) => {
                *last_heartbeat = Instant::now();
                self.handle_text_message(session, text.as_ref()).await
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                *last_heartbeat = Instant::now();
                Ok(())
            }
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
        }
    }

    async fn handle_text_message(
        &mut self,
        session: &mut Session,
        text: &str,
    ) -> Result<(), SessionError> {
        let request = match serde_json::from_str::<CriteriaUpdateRequest>(text) {
            Ok(request) => request,
            Err(error) => {
                warn!(error = %error, "Rejected malformed WebSocket payload");
                return Err(SessionError::InvalidPayload);
            }
        };

        match self.apply_criteria_update(request).await {
            Ok(()) => Ok(()),
            Err(CriteriaUpdateFailure::Rejected(error)) => {
                debug!(error = %error, "Rejected criteria update");
                Self::send_json(session, &NearbyMessage::from(&error))
                    .await
                    .map_err(SessionError::Network)
            }
            Err(CriteriaUpdateFailure::Index(error)) => {
                warn!(error = %error, "Criteria update failed");
                Err(SessionError::SubscriptionEnded)
            }
        }
    }

    async fn apply_criteria_update(
        &mut self,
        request: CriteriaUpdateRequest,
    ) -> Result<(), CriteriaUpdateFailure> {
        match request {
            CriteriaUpdateRequest::UpdateCenter {
                latitude,
                longitude,
            } => {
                let center = GeoPoint::new(latitude, longitude)
                    .map_err(|error| Error::invalid_request(error.to_string()))?;
                self.subscription.update_center(center).await?;
            }
            CriteriaUpdateRequest::UpdateRadius { radius_km } => {
                let radius = RadiusKm::new(radius_km)
                    .map_err(|error| Error::invalid_request(error.to_string()))?;
                self.subscription.update_radius(radius).await?;
            }
        }
        Ok(())
    }

    async fn send_json<T: serde::Serialize>(
        session: &mut Session,
        payload: &T,
    ) -> Result<(), Closed> {
        match serde_json::to_string(payload) {
            Ok(body) => session.text(body).await,
            Err(error) => {
                warn!(error = %error, "Failed to serialize WebSocket payload");
                Ok(())
            }
        }
    }

    fn log_shutdown_reason(error: &SessionError) {
        match error {
            SessionError::HeartbeatTimeout => {
                warn!("WebSocket heartbeat timeout; closing connection");
            }
            SessionError::Protocol(error) => {
                warn!(error = %error, "WebSocket protocol error");
            }
            SessionError::Network(error) => {
                warn!(error = %error, "WebSocket send failed; closing connection");
            }
            SessionError::SubscriptionEnded => {
                debug!("Proximity subscription ended; closing connection");
            }
            SessionError::InvalidPayload
            | SessionError::ClientClosed(_)
            | SessionError::StreamClosed => {}
        }
    }

    fn close_action_for(error: &SessionError) -> CloseAction {
        match error {
            SessionError::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Normal,
                description: Some("heartbeat timeout".to_owned()),
            })),
            SessionError::Protocol(_) => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Protocol,
                description: Some("protocol error".to_owned()),
            })),
            SessionError::InvalidPayload => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Policy,
                description: Some("invalid payload".to_owned()),
            })),
            SessionError::SubscriptionEnded => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Away,
                description: Some("subscription ended".to_owned()),
            })),
            SessionError::ClientClosed(reason) => CloseAction::Close(reason.clone()),
            SessionError::StreamClosed | SessionError::Network(_) => CloseAction::None,
        }
    }

    async fn close_session_if_needed(session: Session, close_action: CloseAction) {
        if let CloseAction::Close(reason) = close_action {
            if let Err(error) = session.close(reason).await {
                warn!(error = %error, "Failed to close WebSocket session");
            }
        }
    }
}

enum CriteriaUpdateFailure {
    Rejected(Error),
    Index(SpatialIndexError),
}

impl From<Error> for CriteriaUpdateFailure {
    fn from(value: Error) -> Self {
        Self::Rejected(value)
    }
}

impl From<SpatialIndexError> for CriteriaUpdateFailure {
    fn from(value: SpatialIndexError) -> Self {
        Self::Index(value)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
