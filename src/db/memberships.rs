use crate::models::{NewMembership, RoomMembership};
use crate::schema::{messages, room_memberships};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;

use super::DbError;

pub fn find_membership(
    conn: &mut SqliteConnection,
    rid: &str,
    uid: &str,
) -> Result<Option<RoomMembership>, DbError> {
    let membership = room_memberships::table
        .filter(room_memberships::room_id.eq(rid))
        .filter(room_memberships::user_id.eq(uid))
        .first::<RoomMembership>(conn)
        .optional()?;

    Ok(membership)
}

/// Leave the room when a membership exists, join it otherwise. Returns the
/// resulting joined state. The check-then-act runs in one transaction; a
/// concurrent duplicate join loses against the (room_id, user_id) unique
/// constraint and is reported as already joined.
pub fn toggle_membership(
    conn: &mut SqliteConnection,
    rid: &str,
    uid: &str,
) -> Result<bool, DbError> {
    conn.transaction::<bool, DbError, _>(|conn| {
        match find_membership(conn, rid, uid)? {
            Some(membership) => {
                diesel::delete(room_memberships::table.find(membership.id)).execute(conn)?;
                Ok(false)
            }
            None => {
                let new_membership = NewMembership {
                    room_id: rid.to_owned(),
                    user_id: uid.to_owned(),
                };
                match diesel::insert_into(room_memberships::table)
                    .values(&new_membership)
                    .execute(conn)
                {
                    Ok(_) => Ok(true),
                    Err(diesel::result::Error::DatabaseError(
                        DatabaseErrorKind::UniqueViolation,
                        _,
                    )) => Ok(true),
                    Err(err) => Err(err.into()),
                }
            }
        }
    })
}

/// Advance the membership's last-read marker to the room's current max
/// message id. No-op when the user is not a member, the room has no
/// messages, or the marker is already at or past the max; the marker never
/// moves backwards.
pub fn update_last_read(conn: &mut SqliteConnection, rid: &str, uid: &str) -> Result<(), DbError> {
    conn.transaction::<(), DbError, _>(|conn| {
        let membership = match find_membership(conn, rid, uid)? {
            Some(membership) => membership,
            None => return Ok(()),
        };

        let max_id: Option<i32> = messages::table
            .filter(messages::room_id.eq(rid))
            .select(diesel::dsl::max(messages::id))
            .first(conn)?;

        if let Some(new_marker) = max_id {
            if membership.last_read_id.map_or(true, |old| new_marker > old) {
                diesel::update(room_memberships::table.find(membership.id))
                    .set(room_memberships::last_read_id.eq(Some(new_marker)))
                    .execute(conn)?;
            }
        }

        Ok(())
    })
}
