use actix_web::web;

use crate::db;
use crate::models::{Room, RoomForm, RoomListing, UnreadRoom, ValidationErrors};
use crate::types::DbPool;

use super::{is_unique_violation, ServiceError};

pub async fn create_room(pool: web::Data<DbPool>, form: RoomForm) -> Result<Room, ServiceError> {
    form.validate()?;

    let taken = {
        let pool = pool.clone();
        let room_name = form.name.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            db::rooms::name_taken(&mut conn, &room_name, None)
        })
        .await??
    };
    if taken {
        return Err(name_taken_error());
    }

    web::block(move || {
        let mut conn = pool.get()?;
        db::rooms::insert_new_room(&mut conn, &form)
    })
    .await?
    .map_err(|err| {
        // a create racing past the pre-check lands on the unique constraint
        if is_unique_violation(&err) {
            name_taken_error()
        } else {
            err.into()
        }
    })
}

pub async fn update_room(
    pool: web::Data<DbPool>,
    room_id: String,
    form: RoomForm,
) -> Result<Room, ServiceError> {
    form.validate()?;

    let room = get_room(pool.clone(), room_id).await?;

    let taken = {
        let pool = pool.clone();
        let room_name = form.name.clone();
        let exclude_id = room.id.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            db::rooms::name_taken(&mut conn, &room_name, Some(&exclude_id))
        })
        .await??
    };
    if taken {
        return Err(name_taken_error());
    }

    web::block(move || {
        let mut conn = pool.get()?;
        db::rooms::update_room(&mut conn, &room.id, &form)
    })
    .await?
    .map_err(|err| {
        if is_unique_violation(&err) {
            name_taken_error()
        } else {
            err.into()
        }
    })
}

pub async fn list_rooms(pool: web::Data<DbPool>) -> Result<Vec<Room>, ServiceError> {
    let rooms = web::block(move || {
        let mut conn = pool.get()?;
        db::rooms::get_all_rooms(&mut conn)
    })
    .await??;

    Ok(rooms)
}

/// The default room a view lands on when no id is given. Failing here is
/// fatal to the request: nothing can render without at least one room.
pub async fn first_room(pool: web::Data<DbPool>) -> Result<Room, ServiceError> {
    let room = web::block(move || {
        let mut conn = pool.get()?;
        db::rooms::get_first_room(&mut conn)
    })
    .await??;

    room.ok_or_else(|| ServiceError::NotFound("no rooms exist".to_owned()))
}

pub async fn get_room(pool: web::Data<DbPool>, room_id: String) -> Result<Room, ServiceError> {
    let room = web::block(move || {
        let mut conn = pool.get()?;
        db::rooms::find_room_by_id(&mut conn, &room_id)
    })
    .await??;

    room.ok_or_else(|| ServiceError::NotFound("room not found".to_owned()))
}

pub async fn browse_rooms(
    pool: web::Data<DbPool>,
    user_id: String,
    page: i64,
) -> Result<Vec<RoomListing>, ServiceError> {
    let listings = web::block(move || {
        let mut conn = pool.get()?;
        db::rooms::get_rooms_page_with_joined(&mut conn, &user_id, page)
    })
    .await??;

    Ok(listings)
}

pub async fn joined_rooms_with_unread(
    pool: web::Data<DbPool>,
    user_id: String,
) -> Result<Vec<UnreadRoom>, ServiceError> {
    let unread = web::block(move || {
        let mut conn = pool.get()?;
        db::rooms::get_joined_rooms_with_unread(&mut conn, &user_id)
    })
    .await??;

    Ok(unread)
}

/// Joins the room when not a member, leaves it otherwise. Returns the
/// resulting joined state.
pub async fn toggle_membership(
    pool: web::Data<DbPool>,
    room_id: String,
    user_id: String,
) -> Result<bool, ServiceError> {
    let room = get_room(pool.clone(), room_id).await?;

    let joined = web::block(move || {
        let mut conn = pool.get()?;
        db::memberships::toggle_membership(&mut conn, &room.id, &user_id)
    })
    .await??;

    Ok(joined)
}

pub async fn mark_room_read(
    pool: web::Data<DbPool>,
    room_id: String,
    user_id: String,
) -> Result<(), ServiceError> {
    let room = get_room(pool.clone(), room_id).await?;

    web::block(move || {
        let mut conn = pool.get()?;
        db::memberships::update_last_read(&mut conn, &room.id, &user_id)
    })
    .await??;

    Ok(())
}

fn name_taken_error() -> ServiceError {
    let mut errors = ValidationErrors::default();
    errors.add("name", "has already been taken");
    ServiceError::Validation(errors)
}
