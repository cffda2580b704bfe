use std::{
    pin::pin,
    time::{Duration, Instant},
};

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::AggregatedMessage;
use futures_util::{
    future::{select, Either},
    StreamExt as _,
};
use serde_json::json;
use tokio::{sync::mpsc, task::spawn_local, time::interval};

use crate::{server::ChatServerHandle, utils::get_user_id, ConnId};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn chat_ws(
    req: HttpRequest,
    stream: web::Payload,
    http_session: actix_session::Session,
    chat_server: web::Data<ChatServerHandle>,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&http_session)?.to_string();

    let (res, session, msg_stream) = actix_ws::handle(&req, stream)?;

    spawn_local(chat_ws_handler(
        (**chat_server).clone(),
        session,
        msg_stream,
        user_id,
    ));

    Ok(res)
}

async fn chat_ws_handler(
    chat_server: ChatServerHandle,
    mut session: actix_ws::Session,
    msg_stream: actix_ws::MessageStream,
    user_id: String,
) {
    let mut last_heartbeat = Instant::now();
    let mut interval = interval(HEARTBEAT_INTERVAL);

    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel();

    let conn_id = chat_server.connect(conn_tx).await;

    log::info!("user {user_id} connected as conn {conn_id}");

    if session
        .text(
            json!({
                "type": "init",
                "data": {
                    "conn_id": conn_id.to_string(),
                }
            })
            .to_string(),
        )
        .await
        .is_err()
    {
        chat_server.disconnect(conn_id);
        return;
    }

    let msg_stream = msg_stream
        .max_frame_size(128 * 1024)
        .aggregate_continuations()
        .max_continuation_size(2 * 1024 * 1024);

    let mut msg_stream = pin!(msg_stream);

    let close_reason = loop {
        let tick = pin!(interval.tick());
        let msg_rx = pin!(conn_rx.recv());

        let messages = pin!(select(msg_stream.next(), msg_rx));

        match select(messages, tick).await {
            Either::Left((Either::Left((Some(Ok(msg)), _)), _)) => {
                log::debug!("msg: {msg:?}");

                match msg {
                    AggregatedMessage::Ping(bytes) => {
                        last_heartbeat = Instant::now();
                        if session.pong(&bytes).await.is_err() {
                            break None;
                        }
                    }

                    AggregatedMessage::Pong(_) => {
                        last_heartbeat = Instant::now();
                    }

                    AggregatedMessage::Text(text) => {
                        process_text_msg(&chat_server, &mut session, &text, conn_id).await;
                    }

                    AggregatedMessage::Binary(_bin) => {
                        log::warn!("unexpected binary message");
                    }

                    AggregatedMessage::Close(reason) => break reason,
                }
            }

            // client WebSocket stream error
            Either::Left((Either::Left((Some(Err(err)), _)), _)) => {
                log::error!("{}", err);
                break None;
            }

            // client WebSocket stream ended
            Either::Left((Either::Left((None, _)), _)) => break None,

            // room events published while this connection is subscribed
            Either::Left((Either::Right((Some(event), _)), _)) => {
                if session.text(event).await.is_err() {
                    break None;
                }
            }

            // all connection's message senders were dropped
            Either::Left((Either::Right((None, _)), _)) => unreachable!(
                "all connection message senders were dropped; chat server may have panicked"
            ),

            // heartbeat internal tick
            Either::Right((_inst, _)) => {
                // if no heartbeat ping/pong received recently, close the connection
                if Instant::now().duration_since(last_heartbeat) > CLIENT_TIMEOUT {
                    log::info!(
                        "client has not sent heartbeat in over {CLIENT_TIMEOUT:?}; disconnecting"
                    );
                    break None;
                }

                // send heartbeat ping
                let _ = session.ping(b"").await;
            }
        };
    };

    chat_server.disconnect(conn_id);

    let _ = session.close(close_reason).await;
}

/// Text protocol: `/subscribe <room_id>` enters a room's live session,
/// `/unsubscribe <room_id>` leaves it. Everything else mutates over HTTP.
async fn process_text_msg(
    chat_server: &ChatServerHandle,
    session: &mut actix_ws::Session,
    text: &str,
    conn: ConnId,
) {
    let msg = text.trim();

    if !msg.starts_with('/') {
        return;
    }

    let mut cmd_args = msg.splitn(2, ' ');
    let cmd = cmd_args.next().unwrap_or_default();

    match cmd {
        "/subscribe" => match cmd_args.next() {
            Some(room_id) => {
                log::info!("conn {conn} subscribing to room {room_id}");

                chat_server.subscribe(conn, room_id).await;

                let ack = json!({
                    "type": "subscribed",
                    "data": { "room_id": room_id },
                });
                let _ = session.text(ack.to_string()).await;
            }
            None => {
                let _ = session.text("!!! room id is required").await;
            }
        },

        "/unsubscribe" => match cmd_args.next() {
            Some(room_id) => {
                log::info!("conn {conn} unsubscribing from room {room_id}");

                chat_server.unsubscribe(conn, room_id).await;

                let ack = json!({
                    "type": "unsubscribed",
                    "data": { "room_id": room_id },
                });
                let _ = session.text(ack.to_string()).await;
            }
            None => {
                let _ = session.text("!!! room id is required").await;
            }
        },

        _ => {
            let _ = session.text(format!("!!! unknown command: {msg}")).await;
        }
    }
}
