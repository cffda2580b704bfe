use crate::models::{Room, RoomForm, RoomListing, UnreadRoom};
use crate::schema::{messages, room_memberships, rooms};
use diesel::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

use super::{iso_date, DbError};

/// Fixed page size for the room browser.
pub const PAGE_SIZE: i64 = 10;

pub fn insert_new_room(conn: &mut SqliteConnection, form: &RoomForm) -> Result<Room, DbError> {
    let new_room = Room {
        id: Uuid::new_v4().to_string(),
        name: form.name.clone(),
        topic: form.topic.clone(),
        created_at: iso_date(),
    };

    diesel::insert_into(rooms::table)
        .values(&new_room)
        .execute(conn)?;

    Ok(new_room)
}

pub fn update_room(
    conn: &mut SqliteConnection,
    room_id: &str,
    form: &RoomForm,
) -> Result<Room, DbError> {
    let room = diesel::update(rooms::table.find(room_id))
        .set((
            rooms::name.eq(&form.name),
            rooms::topic.eq(form.topic.clone()),
        ))
        .get_result(conn)?;

    Ok(room)
}

pub fn find_room_by_id(conn: &mut SqliteConnection, rid: &str) -> Result<Option<Room>, DbError> {
    let room = rooms::table.find(rid).first::<Room>(conn).optional()?;

    Ok(room)
}

/// True when another room already uses the name. The unique constraint stays
/// authoritative; this pre-check only exists to report a field error instead
/// of a constraint violation in the common case.
pub fn name_taken(
    conn: &mut SqliteConnection,
    room_name: &str,
    exclude_id: Option<&str>,
) -> Result<bool, DbError> {
    let count: i64 = match exclude_id {
        Some(rid) => rooms::table
            .filter(rooms::name.eq(room_name))
            .filter(rooms::id.ne(rid))
            .count()
            .get_result(conn)?,
        None => rooms::table
            .filter(rooms::name.eq(room_name))
            .count()
            .get_result(conn)?,
    };

    Ok(count > 0)
}

pub fn get_all_rooms(conn: &mut SqliteConnection) -> Result<Vec<Room>, DbError> {
    let rooms_data = rooms::table.order(rooms::name.asc()).load(conn)?;

    Ok(rooms_data)
}

pub fn get_first_room(conn: &mut SqliteConnection) -> Result<Option<Room>, DbError> {
    let room = rooms::table
        .order(rooms::name.asc())
        .first::<Room>(conn)
        .optional()?;

    Ok(room)
}

/// One page of rooms ordered by name, each flagged with whether `uid` is a
/// member. Pages are 1-based.
pub fn get_rooms_page_with_joined(
    conn: &mut SqliteConnection,
    uid: &str,
    page: i64,
) -> Result<Vec<RoomListing>, DbError> {
    let page = page.max(1);

    let rooms_page: Vec<Room> = rooms::table
        .order(rooms::name.asc())
        .limit(PAGE_SIZE)
        .offset((page - 1) * PAGE_SIZE)
        .load(conn)?;

    let ids = rooms_page.iter().map(|r| r.id.clone()).collect::<Vec<_>>();

    let joined: HashSet<String> = room_memberships::table
        .filter(room_memberships::user_id.eq(uid))
        .filter(room_memberships::room_id.eq_any(&ids))
        .select(room_memberships::room_id)
        .load::<String>(conn)?
        .into_iter()
        .collect();

    let listings = rooms_page
        .into_iter()
        .map(|room| RoomListing {
            joined: joined.contains(&room.id),
            room,
        })
        .collect();

    Ok(listings)
}

/// Every room `uid` has joined, with the count of messages past the
/// membership's last-read marker. A membership that never marked anything
/// read counts every message in the room.
pub fn get_joined_rooms_with_unread(
    conn: &mut SqliteConnection,
    uid: &str,
) -> Result<Vec<UnreadRoom>, DbError> {
    use crate::models::RoomMembership;

    let joined: Vec<(RoomMembership, Room)> = room_memberships::table
        .inner_join(rooms::table)
        .filter(room_memberships::user_id.eq(uid))
        .order(rooms::name.asc())
        .load(conn)?;

    let mut result = Vec::with_capacity(joined.len());
    for (membership, room) in joined {
        let unread_count: i64 = match membership.last_read_id {
            Some(last_read) => messages::table
                .filter(messages::room_id.eq(&room.id))
                .filter(messages::id.gt(last_read))
                .count()
                .get_result(conn)?,
            None => messages::table
                .filter(messages::room_id.eq(&room.id))
                .count()
                .get_result(conn)?,
        };

        result.push(UnreadRoom { room, unread_count });
    }

    Ok(result)
}
