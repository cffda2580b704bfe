//! A long-running task that owns every live websocket connection and the
//! per-room topic subscriptions, driven through a cloneable command handle.

use std::collections::{HashMap, HashSet};
use std::io;
use tokio::sync::{mpsc, oneshot};

use crate::models::RoomEvent;
use crate::{ConnId, Msg, RoomId};

/// Topic key for a room's live session.
pub fn room_topic(room_id: &str) -> RoomId {
    format!("chat_room:{room_id}")
}

#[derive(Debug)]
enum Command {
    Connect {
        conn_tx: mpsc::UnboundedSender<Msg>,
        res_tx: oneshot::Sender<ConnId>,
    },
    Disconnect {
        conn: ConnId,
    },
    Subscribe {
        conn: ConnId,
        topic: RoomId,
        res_tx: oneshot::Sender<()>,
    },
    Unsubscribe {
        conn: ConnId,
        topic: RoomId,
        res_tx: oneshot::Sender<()>,
    },
    Publish {
        topic: RoomId,
        msg: Msg,
    },
}

#[derive(Debug)]
pub struct ChatServer {
    /// message sender per live connection
    sessions: HashMap<ConnId, mpsc::UnboundedSender<Msg>>,
    /// topic key => subscribed connection set
    topics: HashMap<RoomId, HashSet<ConnId>>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl ChatServer {
    pub fn new() -> (Self, ChatServerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        (
            Self {
                sessions: HashMap::new(),
                topics: HashMap::new(),
                cmd_rx,
            },
            ChatServerHandle { cmd_tx },
        )
    }

    /// Best-effort, at-most-once delivery to every current subscriber of the
    /// topic. The publisher's own connection is a subscriber like any other:
    /// the originating client updates its view from this broadcast, there is
    /// no separate local-apply path.
    fn broadcast(&self, topic: &str, msg: &str) {
        if let Some(conns) = self.topics.get(topic) {
            for conn in conns {
                if let Some(tx) = self.sessions.get(conn) {
                    let _ = tx.send(msg.to_owned());
                }
            }
        }
    }

    fn connect(&mut self, conn_tx: mpsc::UnboundedSender<Msg>) -> ConnId {
        let mut id = rand::random::<ConnId>();
        while self.sessions.contains_key(&id) {
            id = rand::random();
        }
        self.sessions.insert(id, conn_tx);

        log::info!("conn {id} connected");

        id
    }

    fn disconnect(&mut self, conn: ConnId) {
        if self.sessions.remove(&conn).is_some() {
            for conns in self.topics.values_mut() {
                conns.remove(&conn);
            }

            log::info!("conn {conn} disconnected");
        }
    }

    pub async fn run(mut self) -> io::Result<()> {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::Connect { conn_tx, res_tx } => {
                    let conn_id = self.connect(conn_tx);
                    let _ = res_tx.send(conn_id);
                }

                Command::Disconnect { conn } => {
                    self.disconnect(conn);
                }

                Command::Subscribe {
                    conn,
                    topic,
                    res_tx,
                } => {
                    self.topics.entry(topic).or_default().insert(conn);
                    let _ = res_tx.send(());
                }

                Command::Unsubscribe {
                    conn,
                    topic,
                    res_tx,
                } => {
                    if let Some(conns) = self.topics.get_mut(&topic) {
                        conns.remove(&conn);
                    }
                    let _ = res_tx.send(());
                }

                Command::Publish { topic, msg } => {
                    self.broadcast(&topic, &msg);
                }
            }
        }

        Ok(())
    }
}

/// Cloneable handle to the [`ChatServer`] task.
#[derive(Debug, Clone)]
pub struct ChatServerHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl ChatServerHandle {
    /// Registers a client's message sender, returning its connection id.
    pub async fn connect(&self, conn_tx: mpsc::UnboundedSender<Msg>) -> ConnId {
        let (res_tx, res_rx) = oneshot::channel();

        // unwrap: chat server should not have been dropped
        self.cmd_tx.send(Command::Connect { conn_tx, res_tx }).unwrap();

        res_rx.await.unwrap()
    }

    pub fn disconnect(&self, conn: ConnId) {
        // unwrap: chat server should not have been dropped
        self.cmd_tx.send(Command::Disconnect { conn }).unwrap();
    }

    /// Enters the room's live session. Resolves once the server has recorded
    /// the subscription, so later publishes are guaranteed to see it.
    pub async fn subscribe(&self, conn: ConnId, room_id: &str) {
        let (res_tx, res_rx) = oneshot::channel();

        // unwrap: chat server should not have been dropped
        self.cmd_tx
            .send(Command::Subscribe {
                conn,
                topic: room_topic(room_id),
                res_tx,
            })
            .unwrap();

        res_rx.await.unwrap();
    }

    pub async fn unsubscribe(&self, conn: ConnId, room_id: &str) {
        let (res_tx, res_rx) = oneshot::channel();

        // unwrap: chat server should not have been dropped
        self.cmd_tx
            .send(Command::Unsubscribe {
                conn,
                topic: room_topic(room_id),
                res_tx,
            })
            .unwrap();

        res_rx.await.unwrap();
    }

    /// Fire-and-forget broadcast of a mutation event on the room's topic.
    /// Connections not subscribed right now never see it; there is no replay.
    pub fn publish(&self, room_id: &str, event: &RoomEvent) {
        match serde_json::to_string(event) {
            Ok(msg) => {
                // unwrap: chat server should not have been dropped
                self.cmd_tx
                    .send(Command::Publish {
                        topic: room_topic(room_id),
                        msg,
                    })
                    .unwrap();
            }
            Err(err) => log::error!("failed to serialize room event: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected(
        handle: &ChatServerHandle,
    ) -> (ConnId, mpsc::UnboundedReceiver<Msg>) {
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let conn_id = handle.connect(conn_tx).await;
        (conn_id, conn_rx)
    }

    fn deleted_event() -> RoomEvent {
        RoomEvent::MessageDeleted {
            id: 7,
            room_id: "r1".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_including_origin() {
        let (server, handle) = ChatServer::new();
        tokio::spawn(server.run());

        let (origin, mut origin_rx) = connected(&handle).await;
        let (other, mut other_rx) = connected(&handle).await;
        handle.subscribe(origin, "r1").await;
        handle.subscribe(other, "r1").await;

        handle.publish("r1", &deleted_event());

        let origin_msg = origin_rx.recv().await.unwrap();
        let other_msg = other_rx.recv().await.unwrap();
        assert_eq!(origin_msg, other_msg);

        let value: serde_json::Value = serde_json::from_str(&origin_msg).unwrap();
        assert_eq!(value["type"], "message_deleted");
        assert_eq!(value["data"]["id"], 7);
        assert_eq!(value["data"]["room_id"], "r1");
    }

    #[tokio::test]
    async fn test_unsubscribed_connections_receive_nothing() {
        let (server, handle) = ChatServer::new();
        tokio::spawn(server.run());

        let (subscriber, mut subscriber_rx) = connected(&handle).await;
        let (bystander, mut bystander_rx) = connected(&handle).await;
        let (leaver, mut leaver_rx) = connected(&handle).await;
        handle.subscribe(subscriber, "r1").await;
        handle.subscribe(leaver, "r1").await;
        handle.unsubscribe(leaver, "r1").await;

        handle.publish("r1", &deleted_event());

        // once the subscriber saw the event, the broadcast has completed
        subscriber_rx.recv().await.unwrap();
        assert!(bystander_rx.try_recv().is_err());
        assert!(leaver_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_drops_subscriptions() {
        let (server, handle) = ChatServer::new();
        tokio::spawn(server.run());

        let (stayer, mut stayer_rx) = connected(&handle).await;
        let (quitter, mut quitter_rx) = connected(&handle).await;
        handle.subscribe(stayer, "r1").await;
        handle.subscribe(quitter, "r1").await;
        handle.disconnect(quitter);

        handle.publish("r1", &deleted_event());

        stayer_rx.recv().await.unwrap();
        assert!(quitter_rx.try_recv().is_err());
    }

    #[test]
    fn test_topic_key_shape() {
        assert_eq!(room_topic("abc"), "chat_room:abc");
    }
}
