use crate::models::{NewReply, Reply};
use crate::schema::replies;
use diesel::prelude::*;

use super::{iso_date, DbError};

pub fn insert_new_reply(
    conn: &mut SqliteConnection,
    mid: i32,
    uid: &str,
    body: &str,
) -> Result<Reply, DbError> {
    let new_reply = NewReply {
        message_id: mid,
        user_id: uid.to_owned(),
        body: body.to_owned(),
        created_at: iso_date(),
    };

    let reply = diesel::insert_into(replies::table)
        .values(&new_reply)
        .get_result(conn)?;

    Ok(reply)
}

pub fn get_reply_by_id(conn: &mut SqliteConnection, rid: i32) -> Result<Option<Reply>, DbError> {
    let reply = replies::table.find(rid).first::<Reply>(conn).optional()?;

    Ok(reply)
}

pub fn delete_reply(conn: &mut SqliteConnection, rid: i32) -> Result<(), DbError> {
    diesel::delete(replies::table.find(rid)).execute(conn)?;

    Ok(())
}
