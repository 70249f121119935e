//! Behavior ingestion handlers
//!
//! A malformed event is never an HTTP error: it is dropped and reported as
//! `{"accepted": false, "reason": ...}` with 200 so clients fire and forget.

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive},
        Json, Sse,
    },
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;

use super::router::AppState;
use super::types::BehaviorRequest;
use crate::errors::{AppError, Result};
use crate::personalization::RecordOutcome;

/// Largest batch accepted by `/api/behavior/batch`
pub const MAX_BATCH_EVENTS: usize = 500;

fn record_one(state: &AppState, req: BehaviorRequest) -> RecordOutcome {
    let event_type = req.event_type.clone();
    let service = state.service();
    match req.into_event(state.clock().now()) {
        Ok(event) => service.record_behavior(event),
        Err(e) => service.reject(&event_type, &e),
    }
}

/// POST /api/behavior
pub async fn record_behavior(
    State(state): State<AppState>,
    Json(req): Json<BehaviorRequest>,
) -> Json<RecordOutcome> {
    Json(record_one(&state, req))
}

#[derive(Debug, Deserialize)]
pub struct BatchBehaviorRequest {
    pub events: Vec<BehaviorRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchBehaviorResponse {
    pub accepted: usize,
    pub rejected: usize,
    pub results: Vec<RecordOutcome>,
}

/// POST /api/behavior/batch
///
/// Events are applied in order; one bad event does not affect the others.
pub async fn record_behavior_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchBehaviorRequest>,
) -> Result<Json<BatchBehaviorResponse>> {
    if req.events.len() > MAX_BATCH_EVENTS {
        return Err(AppError::InvalidInput {
            field: "events".to_string(),
            reason: format!("at most {MAX_BATCH_EVENTS} events per batch"),
        });
    }

    let results: Vec<RecordOutcome> = req
        .events
        .into_iter()
        .map(|event| record_one(&state, event))
        .collect();
    let accepted = results.iter().filter(|r| r.accepted).count();

    Ok(Json(BatchBehaviorResponse {
        accepted,
        rejected: results.len() - accepted,
        results,
    }))
}

/// GET /api/events - live stream of accepted behavior events
pub async fn behavior_events_sse(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.subscribe_events());

    let event_stream = stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                let json = serde_json::to_string(&event).ok()?;
                Some(Ok(Event::default().event(event.event_type().as_str()).data(json)))
            }
            Err(_) => None, // lagged
        }
    });

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("heartbeat"),
    )
}
