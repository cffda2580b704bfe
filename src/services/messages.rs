use actix_web::web;

use crate::db;
use crate::models::{
    MessageForm, MessageResponse, ReplyForm, ReplyResponse, RoomEvent, ValidationErrors,
};
use crate::server::ChatServerHandle;
use crate::types::DbPool;

use super::ServiceError;

/// Validation result for a draft message, nothing persisted. Backs the live
/// form feedback endpoint.
pub fn validate_message(form: &MessageForm) -> Result<(), ValidationErrors> {
    form.validate()
}

pub async fn create_message(
    pool: web::Data<DbPool>,
    server: &ChatServerHandle,
    form: MessageForm,
    user_id: String,
) -> Result<MessageResponse, ServiceError> {
    form.validate()?;

    let room = super::rooms::get_room(pool.clone(), form.room_id.clone()).await?;

    let message = {
        let pool = pool.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            db::messages::insert_new_message(&mut conn, &room.id, &user_id, &form.body)
        })
        .await??
    };

    let response = message_response(pool, message.id)
        .await?
        .ok_or_else(|| ServiceError::Db("created message vanished".into()))?;

    server.publish(
        &response.message.room_id,
        &RoomEvent::NewMessage(response.clone()),
    );

    Ok(response)
}

/// Deletes a message on behalf of its author. A mismatched caller is a hard
/// error, never a silent no-op.
pub async fn delete_message(
    pool: web::Data<DbPool>,
    server: &ChatServerHandle,
    message_id: i32,
    user_id: String,
) -> Result<(), ServiceError> {
    let message = {
        let pool = pool.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            db::messages::get_message_by_id(&mut conn, message_id)
        })
        .await??
    }
    .ok_or_else(|| ServiceError::NotFound("message not found".to_owned()))?;

    if message.user_id != user_id {
        return Err(ServiceError::Forbidden(
            "only the author can delete a message".to_owned(),
        ));
    }

    web::block(move || {
        let mut conn = pool.get()?;
        db::messages::delete_message(&mut conn, message_id)
    })
    .await??;

    server.publish(
        &message.room_id,
        &RoomEvent::MessageDeleted {
            id: message.id,
            room_id: message.room_id.clone(),
        },
    );

    Ok(())
}

pub async fn room_messages(
    pool: web::Data<DbPool>,
    room_id: String,
) -> Result<Vec<MessageResponse>, ServiceError> {
    let room = super::rooms::get_room(pool.clone(), room_id).await?;

    let responses = web::block(move || {
        let mut conn = pool.get()?;
        db::messages::get_messages_for_room(&mut conn, &room.id)
    })
    .await??;

    Ok(responses)
}

pub async fn get_message(
    pool: web::Data<DbPool>,
    message_id: i32,
) -> Result<MessageResponse, ServiceError> {
    message_response(pool, message_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("message not found".to_owned()))
}

pub async fn create_reply(
    pool: web::Data<DbPool>,
    server: &ChatServerHandle,
    form: ReplyForm,
    user_id: String,
) -> Result<ReplyResponse, ServiceError> {
    form.validate()?;

    let parent = {
        let pool = pool.clone();
        let parent_id = form.message_id;
        web::block(move || {
            let mut conn = pool.get()?;
            db::messages::get_message_by_id(&mut conn, parent_id)
        })
        .await??
    }
    .ok_or_else(|| ServiceError::NotFound("message not found".to_owned()))?;

    let reply = {
        let pool = pool.clone();
        let parent_id = parent.id;
        web::block(move || {
            let mut conn = pool.get()?;
            db::replies::insert_new_reply(&mut conn, parent_id, &user_id, &form.body)
        })
        .await??
    };

    // subscribers resync the whole thread from the reloaded parent
    let parent_response = message_response(pool, parent.id)
        .await?
        .ok_or_else(|| ServiceError::Db("parent message vanished".into()))?;

    let reply_response = parent_response
        .replies
        .iter()
        .find(|r| r.reply.id == reply.id)
        .cloned()
        .ok_or_else(|| ServiceError::Db("created reply vanished".into()))?;

    server.publish(&parent.room_id, &RoomEvent::NewReply(parent_response));

    Ok(reply_response)
}

pub async fn delete_reply(
    pool: web::Data<DbPool>,
    server: &ChatServerHandle,
    reply_id: i32,
    user_id: String,
) -> Result<(), ServiceError> {
    let reply = {
        let pool = pool.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            db::replies::get_reply_by_id(&mut conn, reply_id)
        })
        .await??
    }
    .ok_or_else(|| ServiceError::NotFound("reply not found".to_owned()))?;

    if reply.user_id != user_id {
        return Err(ServiceError::Forbidden(
            "only the author can delete a reply".to_owned(),
        ));
    }

    let parent = {
        let pool = pool.clone();
        let parent_id = reply.message_id;
        web::block(move || {
            let mut conn = pool.get()?;
            db::messages::get_message_by_id(&mut conn, parent_id)
        })
        .await??
    }
    .ok_or_else(|| ServiceError::NotFound("message not found".to_owned()))?;

    {
        let pool = pool.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            db::replies::delete_reply(&mut conn, reply_id)
        })
        .await??;
    }

    let parent_response = message_response(pool, parent.id)
        .await?
        .ok_or_else(|| ServiceError::Db("parent message vanished".into()))?;

    server.publish(&parent.room_id, &RoomEvent::DeletedReply(parent_response));

    Ok(())
}

async fn message_response(
    pool: web::Data<DbPool>,
    message_id: i32,
) -> Result<Option<MessageResponse>, ServiceError> {
    let response = web::block(move || {
        let mut conn = pool.get()?;
        db::messages::get_message_response(&mut conn, message_id)
    })
    .await??;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::models::{Room, User};
    use crate::server::ChatServer;
    use crate::Msg;
    use diesel::prelude::*;
    use tokio::sync::mpsc;

    struct Fixture {
        pool: web::Data<DbPool>,
        server: ChatServerHandle,
        ada: User,
        bob: User,
        room: Room,
    }

    fn fixture() -> Fixture {
        let pool = web::Data::new(test_db::pool());
        let (chat_server, server) = ChatServer::new();
        tokio::spawn(chat_server.run());

        let (ada, bob, room) = {
            let mut conn = pool.get().unwrap();
            (
                test_db::insert_user(&mut conn, "ada@example.com"),
                test_db::insert_user(&mut conn, "bob@example.com"),
                test_db::insert_room(&mut conn, "general"),
            )
        };

        Fixture {
            pool,
            server,
            ada,
            bob,
            room,
        }
    }

    async fn subscribed(fx: &Fixture) -> mpsc::UnboundedReceiver<Msg> {
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        let conn_id = fx.server.connect(conn_tx).await;
        fx.server.subscribe(conn_id, &fx.room.id).await;
        conn_rx
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Msg>) -> serde_json::Value {
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    fn message_count(fx: &Fixture) -> i64 {
        use crate::schema::messages;
        let mut conn = fx.pool.get().unwrap();
        messages::table.count().get_result(&mut conn).unwrap()
    }

    fn message_form(fx: &Fixture, body: &str) -> MessageForm {
        MessageForm {
            room_id: fx.room.id.clone(),
            body: body.to_owned(),
        }
    }

    #[actix_web::test]
    async fn test_create_message_broadcasts_to_subscribers() {
        let fx = fixture();
        let mut rx = subscribed(&fx).await;

        let response = create_message(
            fx.pool.clone(),
            &fx.server,
            message_form(&fx, "hello there"),
            fx.ada.id.clone(),
        )
        .await
        .unwrap();
        assert!(response.replies.is_empty());
        assert_eq!(response.user.name, "ada");

        let event = next_event(&mut rx).await;
        assert_eq!(event["type"], "new_message");
        assert_eq!(event["data"]["message"]["body"], "hello there");
        assert_eq!(event["data"]["replies"].as_array().unwrap().len(), 0);
    }

    #[actix_web::test]
    async fn test_blank_message_is_rejected_and_not_persisted() {
        let fx = fixture();

        let err = create_message(
            fx.pool.clone(),
            &fx.server,
            message_form(&fx, "   "),
            fx.ada.id.clone(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(message_count(&fx), 0);
    }

    #[actix_web::test]
    async fn test_message_in_missing_room_is_not_found() {
        let fx = fixture();

        let err = create_message(
            fx.pool.clone(),
            &fx.server,
            MessageForm {
                room_id: "missing".to_owned(),
                body: "hi".to_owned(),
            },
            fx.ada.id.clone(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_web::test]
    async fn test_delete_message_requires_ownership() {
        let fx = fixture();

        let response = create_message(
            fx.pool.clone(),
            &fx.server,
            message_form(&fx, "mine"),
            fx.ada.id.clone(),
        )
        .await
        .unwrap();
        let message_id = response.message.id;

        // a non-owner fails hard and nothing is removed
        let err = delete_message(fx.pool.clone(), &fx.server, message_id, fx.bob.id.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(message_count(&fx), 1);

        delete_message(fx.pool.clone(), &fx.server, message_id, fx.ada.id.clone())
            .await
            .unwrap();
        assert_eq!(message_count(&fx), 0);
    }

    #[actix_web::test]
    async fn test_delete_broadcasts_id_and_room() {
        let fx = fixture();

        let response = create_message(
            fx.pool.clone(),
            &fx.server,
            message_form(&fx, "short-lived"),
            fx.ada.id.clone(),
        )
        .await
        .unwrap();

        let mut rx = subscribed(&fx).await;
        delete_message(
            fx.pool.clone(),
            &fx.server,
            response.message.id,
            fx.ada.id.clone(),
        )
        .await
        .unwrap();

        let event = next_event(&mut rx).await;
        assert_eq!(event["type"], "message_deleted");
        assert_eq!(event["data"]["id"], response.message.id);
        assert_eq!(event["data"]["room_id"], fx.room.id.as_str());
    }

    #[actix_web::test]
    async fn test_reply_events_carry_the_reloaded_parent() {
        let fx = fixture();

        let parent = create_message(
            fx.pool.clone(),
            &fx.server,
            message_form(&fx, "parent"),
            fx.ada.id.clone(),
        )
        .await
        .unwrap();

        let mut rx = subscribed(&fx).await;

        let reply = create_reply(
            fx.pool.clone(),
            &fx.server,
            ReplyForm {
                message_id: parent.message.id,
                body: "first!".to_owned(),
            },
            fx.bob.id.clone(),
        )
        .await
        .unwrap();
        assert_eq!(reply.user.name, "bob");

        let event = next_event(&mut rx).await;
        assert_eq!(event["type"], "new_reply");
        assert_eq!(event["data"]["message"]["id"], parent.message.id);
        assert_eq!(event["data"]["replies"].as_array().unwrap().len(), 1);
        assert_eq!(event["data"]["replies"][0]["reply"]["body"], "first!");

        // round trip: the parent now carries the reply
        let reloaded = get_message(fx.pool.clone(), parent.message.id).await.unwrap();
        assert_eq!(reloaded.replies.len(), 1);
        assert_eq!(reloaded.replies[0].reply.id, reply.reply.id);

        delete_reply(fx.pool.clone(), &fx.server, reply.reply.id, fx.bob.id.clone())
            .await
            .unwrap();

        let event = next_event(&mut rx).await;
        assert_eq!(event["type"], "deleted_reply");
        assert_eq!(event["data"]["replies"].as_array().unwrap().len(), 0);
    }

    #[actix_web::test]
    async fn test_delete_reply_requires_ownership() {
        let fx = fixture();

        let parent = create_message(
            fx.pool.clone(),
            &fx.server,
            message_form(&fx, "parent"),
            fx.ada.id.clone(),
        )
        .await
        .unwrap();
        let reply = create_reply(
            fx.pool.clone(),
            &fx.server,
            ReplyForm {
                message_id: parent.message.id,
                body: "mine".to_owned(),
            },
            fx.bob.id.clone(),
        )
        .await
        .unwrap();

        let err = delete_reply(
            fx.pool.clone(),
            &fx.server,
            reply.reply.id,
            fx.ada.id.clone(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let reloaded = get_message(fx.pool.clone(), parent.message.id).await.unwrap();
        assert_eq!(reloaded.replies.len(), 1);
    }

    #[actix_web::test]
    async fn test_validate_message_persists_nothing() {
        let fx = fixture();

        assert!(validate_message(&message_form(&fx, "draft")).is_ok());
        assert!(validate_message(&message_form(&fx, "")).is_err());
        assert_eq!(message_count(&fx), 0);
    }
}
