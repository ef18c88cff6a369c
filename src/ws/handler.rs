//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::http::routes::AppError;
use crate::session::SessionHandle;
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // A full server answers with 503 instead of upgrading
    if state.sessions.is_full() {
        warn!(
            active_sessions = state.sessions.active_sessions(),
            "Refusing WebSocket upgrade, session limit reached"
        );
        return AppError::Unavailable("Session limit reached".to_string()).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    let (handle, output_rx) = match state.sessions.open(state.config.starting_rounds) {
        Ok(opened) => opened,
        Err(e) => {
            warn!(error = %e, "Could not open session");
            let refusal = ServerMsg::Error {
                code: "session_unavailable".to_string(),
                message: e.to_string(),
            };
            let _ = send_msg(&mut ws_sink, &refusal).await;
            let _ = ws_sink.close().await;
            return;
        }
    };
    let session_id = handle.id;
    info!(session_id = %session_id, "New WebSocket connection");

    let welcome = ServerMsg::Welcome {
        session_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
    } else {
        run_connection(
            &handle,
            ws_sink,
            ws_stream,
            output_rx,
            InputRateLimiter::new(state.config.input_rate_limit),
        )
        .await;
    }

    // Stop the tick loop (a no-op if it already ended) and forget the session
    let _ = handle.send(ClientMsg::Leave).await;
    state.sessions.remove(&session_id);

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Pump messages both ways until either side hangs up
async fn run_connection(
    handle: &SessionHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut output_rx: broadcast::Receiver<ServerMsg>,
    rate_limiter: InputRateLimiter,
) {
    let session_id = handle.id;

    // Spawn writer task: session output -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        loop {
            match output_rx.recv().await {
                Ok(msg) => {
                    let closing = matches!(msg, ServerMsg::Closed);
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                        break;
                    }
                    if closing {
                        let _ = ws_sink.close().await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        session_id = %session_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                    // Continue - the next snapshot carries full state
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %session_id, "Output channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        let leaving = client_msg == ClientMsg::Leave;
                        if handle.send(client_msg).await.is_err() {
                            debug!(session_id = %session_id, "Input channel closed");
                            break;
                        }
                        if leaving {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Ask the session to stop, then let the writer flush its Closed message
    let _ = handle.send(ClientMsg::Leave).await;
    if tokio::time::timeout(std::time::Duration::from_millis(250), &mut writer_handle)
        .await
        .is_err()
    {
        writer_handle.abort();
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
