//! WebSocket connection handlers.

use std::{sync::Arc, time::Duration};

use axum::{
    Extension,
    extract::{
        Path, State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

use crate::{
    domain::{Connection, OutboundReceiver, UserId},
    ui::{middleware::AuthenticatedUser, state::AppState},
    usecase::{IngestError, IngestEventUseCase},
};

/// How long the writer may take to send the Close frame after the connection ends
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Upgrade endpoint `/ws/{user_id}`
///
/// 認証ゲートを通過したリクエストのみ到達します。パスのユーザー ID は
/// 認証済みの ID と一致する場合に限り信頼されます。
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(user_id_str): Path<String>,
    Extension(AuthenticatedUser(authenticated)): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> UserId (Domain Model)
    let user_id = match UserId::try_from(user_id_str.as_str()) {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!("Invalid user_id format: '{}'", user_id_str);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    if user_id != authenticated {
        tracing::warn!(
            "User {} attempted to connect as user {}",
            authenticated,
            user_id
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

/// Spawns the socket reader of one connection.
///
/// テキストフレームを受信キューへ転送します。相手の Close・読み取りエラー・
/// ストリーム終端を検知すると接続を閉じるため、取り込み中の待機も解放されます。
fn socket_reader(
    connection: Connection,
    mut receiver: SplitStream<WebSocket>,
    frames: mpsc::Sender<Utf8Bytes>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let user_id = connection.user_id();
        loop {
            let msg = tokio::select! {
                msg = receiver.next() => msg,
                _ = connection.closed() => break,
            };

            match msg {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("Received frame from user {}: {}", user_id, text.as_str());
                    // A full inbound queue waits for ingestion or closure
                    tokio::select! {
                        sent = frames.send(text) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                        _ = connection.closed() => break,
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("User {} requested close", user_id);
                    break;
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::debug!("Ignoring binary frame from user {}", user_id);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("WebSocket read error from user {}: {}", user_id, e);
                    break;
                }
                None => break,
            }
        }
        connection.close();
    })
}

/// Spawns the ingest task of one connection.
///
/// 受信順に 1 フレームずつ取り込みます。キューが満杯で待機している間に
/// 接続が閉じられた場合は、そこで取り込みを打ち切ります。
fn ingest_loop(
    connection: Connection,
    ingest: Arc<IngestEventUseCase>,
    mut frames: mpsc::Receiver<Utf8Bytes>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let user_id = connection.user_id();
        loop {
            // Frames read before closure are still ingested while the queues have room
            let text = tokio::select! {
                biased;
                frame = frames.recv() => match frame {
                    Some(text) => text,
                    None => break,
                },
                _ = connection.closed() => break,
            };

            let result = tokio::select! {
                biased;
                result = ingest.execute(user_id, text.as_str()) => result,
                _ = connection.closed() => {
                    tracing::debug!(
                        "Connection {} of user {} closed while ingesting",
                        connection.id(),
                        user_id
                    );
                    break;
                }
            };
            match result {
                Ok(kind) => tracing::debug!("Ingested {:?} from user {}", kind, user_id),
                Err(IngestError::Decode(e)) => {
                    tracing::warn!("Dropping malformed frame from user {}: {}", user_id, e);
                }
                Err(e) => {
                    tracing::error!("Stopping read loop of user {}: {}", user_id, e);
                    break;
                }
            }
        }
    })
}

/// Spawns the writer task of one connection.
///
/// 出力キューのフレームを WebSocket に書き込み、一定間隔で Ping を送ります。
/// 書き込みに失敗した場合は接続を閉じます。接続が閉じられた場合は
/// Close フレームを送って終了します。
fn pusher_loop(
    connection: Connection,
    mut rx: OutboundReceiver,
    mut sender: SplitSink<WebSocket, Message>,
    keepalive_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut keepalive =
            tokio::time::interval_at(Instant::now() + keepalive_interval, keepalive_interval);
        loop {
            let outgoing = tokio::select! {
                frame = rx.recv() => match frame {
                    Some(frame) => Message::Text(frame.to_string().into()),
                    None => break,
                },
                _ = keepalive.tick() => Message::Ping(Default::default()),
                _ = connection.closed() => {
                    tracing::info!(
                        "Connection {} of user {} closed",
                        connection.id(),
                        connection.user_id()
                    );
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = sender.send(outgoing).await {
                tracing::warn!(
                    "Failed to write to connection {} of user {}: {}",
                    connection.id(),
                    connection.user_id(),
                    e
                );
                connection.close();
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: UserId) {
    let (connection, rx) = state.connect_user_usecase.connect(user_id);
    tracing::info!(
        "User {} connected (connection {})",
        user_id,
        connection.id()
    );

    let (sender, receiver) = socket.split();
    let (frames_tx, frames_rx) = mpsc::channel(state.socket.inbound_buffer.max(1));

    let read_task = socket_reader(connection.clone(), receiver, frames_tx);
    let mut send_task = pusher_loop(
        connection.clone(),
        rx,
        sender,
        state.socket.keepalive_interval,
    );
    let ingest_task = ingest_loop(
        connection.clone(),
        state.ingest_event_usecase.clone(),
        frames_rx,
    );

    // Ingestion ends when the reader stops, the connection is closed or ingestion fails
    if let Err(e) = ingest_task.await {
        tracing::error!("Ingest task of user {} failed: {}", user_id, e);
    }
    connection.close();
    if tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        send_task.abort();
    }
    read_task.abort();

    state.connect_user_usecase.disconnect(&connection);
    tracing::info!("User {} disconnected (connection {})", user_id, connection.id());
}
