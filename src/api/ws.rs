//! `/ws/recognize` (spec §6): bidirectional live recognition. Reads
//! control/audio frames, drives a [`Session`], and hands each recognition
//! attempt to a `spawn_blocking` worker so the DSP pipeline never blocks
//! the connection's I/O task (spec §5). Incoming frames keep being read
//! while an attempt is in flight — only a second attempt is held back
//! until the first resolves (spec §5 "at most one in-flight analysis
//! task per session").

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::MusicaError;
use crate::matcher::MatchOutcome;
use crate::orchestrator::{self, Session, StreamEvent};
use crate::waveform;

use super::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlFrame {
    Config { #[serde(rename = "sampleRate")] sample_rate: u32 },
    Stop,
}

type AttemptHandle = tokio::task::JoinHandle<Result<Option<MatchOutcome>, MusicaError>>;

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut session = Session::new();
    let mut in_flight: Option<AttemptHandle> = None;

    loop {
        tokio::select! {
            frame = socket.recv() => {
                match frame {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Text(text))) => {
                        // Malformed control frames are ignored silently (spec §7 item 5).
                        match serde_json::from_str::<ControlFrame>(&text) {
                            Ok(ControlFrame::Config { sample_rate }) => session.configure_sample_rate(sample_rate),
                            Ok(ControlFrame::Stop) => break,
                            Err(_) => {}
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let samples = match waveform::pcm_f32le_to_samples(&bytes) {
                            Ok(samples) => samples,
                            Err(e) => {
                                send_event(&mut socket, &StreamEvent::Error { message: e.status_message() }).await;
                                break;
                            }
                        };

                        let event = session.push_audio(&samples);
                        send_event(&mut socket, &event).await;

                        if session.expired() {
                            send_event(&mut socket, &StreamEvent::NoMatch {
                                message: "listening window expired with no match".to_string(),
                            }).await;
                            break;
                        }

                        // Backpressure: a trigger is dropped (not the audio) while an
                        // attempt is already in flight.
                        if in_flight.is_none() && session.ready_for_attempt() {
                            send_event(&mut socket, &StreamEvent::Analyzing).await;
                            let buffer = session.begin_attempt();
                            let sample_rate = session.sample_rate();
                            let store = state.store.clone();
                            in_flight = Some(tokio::task::spawn_blocking(move || {
                                orchestrator::analyze_buffer(&store, &buffer, sample_rate)
                            }));
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                }
            }

            result = async { in_flight.as_mut().unwrap().await }, if in_flight.is_some() => {
                in_flight = None;
                match result {
                    Ok(Ok(Some(outcome))) => {
                        session.complete_attempt_match();
                        emit_match(&mut socket, &state, outcome).await;
                        break;
                    }
                    Ok(Ok(None)) => {
                        session.complete_attempt_no_match();
                        if session.expired() {
                            send_event(&mut socket, &StreamEvent::NoMatch {
                                message: "listening window expired with no match".to_string(),
                            }).await;
                            break;
                        }
                    }
                    Ok(Err(e)) => {
                        send_event(&mut socket, &StreamEvent::Error { message: e.status_message() }).await;
                        break;
                    }
                    Err(join_error) => {
                        warn!(error = %join_error, "recognition task panicked");
                        send_event(&mut socket, &StreamEvent::Error {
                            message: "internal recognition error".to_string(),
                        }).await;
                        break;
                    }
                }
            }
        }
    }

    info!("recognition session ended");
}

async fn emit_match(socket: &mut WebSocket, state: &AppState, outcome: MatchOutcome) {
    match state.store.get_song(outcome.song_id) {
        Ok(Some(song)) => {
            send_event(socket, &StreamEvent::MatchFound {
                song: (&song).into(),
                confidence: outcome.confidence,
                source: "fingerprint",
            })
            .await;
        }
        Ok(None) => {
            send_event(socket, &StreamEvent::Error { message: "matched song no longer exists".to_string() }).await;
        }
        Err(e) => {
            send_event(socket, &StreamEvent::Error { message: e.status_message() }).await;
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &StreamEvent) {
    if let Ok(text) = serde_json::to_string(event) {
        let _ = socket.send(Message::Text(text.into())).await;
    }
}
