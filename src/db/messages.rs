use crate::models::{Message, MessageResponse, NewMessage, PublicUser, Reply, ReplyResponse, User};
use crate::schema::{messages, replies, users};
use diesel::prelude::*;
use std::collections::{HashMap, HashSet};

use super::{iso_date, DbError};

pub fn insert_new_message(
    conn: &mut SqliteConnection,
    rid: &str,
    uid: &str,
    body: &str,
) -> Result<Message, DbError> {
    let new_message = NewMessage {
        room_id: rid.to_owned(),
        user_id: uid.to_owned(),
        body: body.to_owned(),
        created_at: iso_date(),
    };

    let message = diesel::insert_into(messages::table)
        .values(&new_message)
        .get_result(conn)?;

    Ok(message)
}

pub fn get_message_by_id(conn: &mut SqliteConnection, mid: i32) -> Result<Option<Message>, DbError> {
    let message = messages::table
        .find(mid)
        .first::<Message>(conn)
        .optional()?;

    Ok(message)
}

/// One message with its author and full reply thread, or None.
pub fn get_message_response(
    conn: &mut SqliteConnection,
    mid: i32,
) -> Result<Option<MessageResponse>, DbError> {
    let message = match get_message_by_id(conn, mid)? {
        Some(message) => message,
        None => return Ok(None),
    };

    let mut responses = load_message_responses(conn, vec![message])?;
    Ok(responses.pop())
}

/// All messages of a room ordered by (created_at, id), each with its author
/// and its replies in the same order.
pub fn get_messages_for_room(
    conn: &mut SqliteConnection,
    rid: &str,
) -> Result<Vec<MessageResponse>, DbError> {
    let room_messages: Vec<Message> = messages::table
        .filter(messages::room_id.eq(rid))
        .order((messages::created_at.asc(), messages::id.asc()))
        .load(conn)?;

    load_message_responses(conn, room_messages)
}

/// Deletes a message together with its replies. Ownership is the caller's
/// concern.
pub fn delete_message(conn: &mut SqliteConnection, mid: i32) -> Result<(), DbError> {
    conn.transaction::<(), DbError, _>(|conn| {
        diesel::delete(replies::table.filter(replies::message_id.eq(mid))).execute(conn)?;
        diesel::delete(messages::table.find(mid)).execute(conn)?;
        Ok(())
    })
}

fn load_message_responses(
    conn: &mut SqliteConnection,
    room_messages: Vec<Message>,
) -> Result<Vec<MessageResponse>, DbError> {
    let message_replies: Vec<Reply> = Reply::belonging_to(&room_messages)
        .order((replies::created_at.asc(), replies::id.asc()))
        .load(conn)?;

    let mut ids = HashSet::new(); // user ids
    for message in &room_messages {
        ids.insert(message.user_id.clone());
    }
    for reply in &message_replies {
        ids.insert(reply.user_id.clone());
    }
    let ids = ids.into_iter().collect::<Vec<_>>();

    let users_data: Vec<User> = users::table
        .filter(users::id.eq_any(&ids))
        .load(conn)?;
    let users_map: HashMap<String, PublicUser> = HashMap::from_iter(
        users_data
            .iter()
            .map(|user| (user.id.clone(), PublicUser::from(user))),
    );

    let grouped = message_replies.grouped_by(&room_messages);

    room_messages
        .into_iter()
        .zip(grouped)
        .map(|(message, thread)| {
            let user = users_map
                .get(&message.user_id)
                .cloned()
                .ok_or("message author missing from users table")?;
            let replies = thread
                .into_iter()
                .map(|reply| {
                    let user = users_map
                        .get(&reply.user_id)
                        .cloned()
                        .ok_or("reply author missing from users table")?;
                    Ok(ReplyResponse { reply, user })
                })
                .collect::<Result<Vec<_>, DbError>>()?;

            Ok(MessageResponse {
                message,
                user,
                replies,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{replies as db_replies, test_db};

    #[test]
    fn test_room_messages_preload_authors_and_replies() {
        let mut conn = test_db::connection();
        let ada = test_db::insert_user(&mut conn, "ada@example.com");
        let bob = test_db::insert_user(&mut conn, "bob@example.com");
        let room = test_db::insert_room(&mut conn, "general");

        let first = insert_new_message(&mut conn, &room.id, &ada.id, "first").unwrap();
        let second = insert_new_message(&mut conn, &room.id, &bob.id, "second").unwrap();
        db_replies::insert_new_reply(&mut conn, first.id, &bob.id, "re: first").unwrap();

        let responses = get_messages_for_room(&mut conn, &room.id).unwrap();
        assert_eq!(responses.len(), 2);

        assert_eq!(responses[0].message, first);
        assert_eq!(responses[0].user.name, "ada");
        assert_eq!(responses[0].replies.len(), 1);
        assert_eq!(responses[0].replies[0].reply.body, "re: first");
        assert_eq!(responses[0].replies[0].user.name, "bob");

        assert_eq!(responses[1].message, second);
        assert!(responses[1].replies.is_empty());
    }

    #[test]
    fn test_reply_round_trip_through_parent() {
        let mut conn = test_db::connection();
        let ada = test_db::insert_user(&mut conn, "ada@example.com");
        let room = test_db::insert_room(&mut conn, "general");
        let parent = insert_new_message(&mut conn, &room.id, &ada.id, "parent").unwrap();

        let r1 = db_replies::insert_new_reply(&mut conn, parent.id, &ada.id, "one").unwrap();
        let r2 = db_replies::insert_new_reply(&mut conn, parent.id, &ada.id, "two").unwrap();

        let response = get_message_response(&mut conn, parent.id).unwrap().unwrap();
        let reply_ids = response
            .replies
            .iter()
            .map(|r| r.reply.id)
            .collect::<Vec<_>>();
        assert_eq!(reply_ids, vec![r1.id, r2.id]);
    }

    #[test]
    fn test_delete_message_removes_its_replies() {
        let mut conn = test_db::connection();
        let ada = test_db::insert_user(&mut conn, "ada@example.com");
        let room = test_db::insert_room(&mut conn, "general");
        let parent = insert_new_message(&mut conn, &room.id, &ada.id, "parent").unwrap();
        let reply = db_replies::insert_new_reply(&mut conn, parent.id, &ada.id, "re").unwrap();

        delete_message(&mut conn, parent.id).unwrap();

        assert_eq!(get_message_by_id(&mut conn, parent.id).unwrap(), None);
        assert_eq!(db_replies::get_reply_by_id(&mut conn, reply.id).unwrap(), None);
    }

    #[test]
    fn test_missing_message_loads_as_none() {
        let mut conn = test_db::connection();
        assert_eq!(get_message_response(&mut conn, 41).unwrap(), None);
    }
}
