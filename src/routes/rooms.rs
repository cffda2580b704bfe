use crate::models::{Room, RoomForm, RoomResponse};
use crate::services::{self, ServiceError};
use crate::types::DbPool;
use crate::utils::get_user_id;
use actix_session::Session;
use actix_web::{get, post, put, web, Error, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[get("")]
pub async fn get_rooms(pool: web::Data<DbPool>) -> Result<HttpResponse, Error> {
    let rooms = services::rooms::list_rooms(pool).await?;

    Ok(HttpResponse::Ok().json(rooms))
}

#[derive(Deserialize)]
struct BrowseQuery {
    page: Option<i64>,
}

#[get("/browse")]
pub async fn browse_rooms(
    pool: web::Data<DbPool>,
    session: Session,
    query: web::Query<BrowseQuery>,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    let listings =
        services::rooms::browse_rooms(pool, user_id.to_string(), query.page.unwrap_or(1)).await?;

    Ok(HttpResponse::Ok().json(listings))
}

#[get("/joined")]
pub async fn joined_rooms(
    pool: web::Data<DbPool>,
    session: Session,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    let unread = services::rooms::joined_rooms_with_unread(pool, user_id.to_string()).await?;

    Ok(HttpResponse::Ok().json(unread))
}

#[get("/first")]
pub async fn first_room(pool: web::Data<DbPool>) -> Result<HttpResponse, Error> {
    let room = services::rooms::first_room(pool.clone()).await?;
    let response = room_response(pool, room).await?;

    Ok(HttpResponse::Ok().json(response))
}

#[post("")]
pub async fn create_room(
    pool: web::Data<DbPool>,
    form: web::Json<RoomForm>,
) -> Result<HttpResponse, Error> {
    let room = services::rooms::create_room(pool, form.into_inner()).await?;

    Ok(HttpResponse::Ok().json(room))
}

#[put("/{room_id}")]
pub async fn update_room(
    pool: web::Data<DbPool>,
    room_id: web::Path<String>,
    form: web::Json<RoomForm>,
) -> Result<HttpResponse, Error> {
    let room =
        services::rooms::update_room(pool, room_id.into_inner(), form.into_inner()).await?;

    Ok(HttpResponse::Ok().json(room))
}

#[post("/{room_id}/toggle")]
pub async fn toggle_membership(
    pool: web::Data<DbPool>,
    room_id: web::Path<String>,
    session: Session,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    let joined =
        services::rooms::toggle_membership(pool, room_id.into_inner(), user_id.to_string())
            .await?;

    Ok(HttpResponse::Ok().json(json!({ "joined": joined })))
}

#[post("/{room_id}/read")]
pub async fn mark_room_read(
    pool: web::Data<DbPool>,
    room_id: web::Path<String>,
    session: Session,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    services::rooms::mark_room_read(pool, room_id.into_inner(), user_id.to_string()).await?;

    Ok(HttpResponse::Ok().json(json!({})))
}

#[get("/{room_id}")]
pub async fn get_room(
    pool: web::Data<DbPool>,
    room_id: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let room = services::rooms::get_room(pool.clone(), room_id.into_inner()).await?;
    let response = room_response(pool, room).await?;

    Ok(HttpResponse::Ok().json(response))
}

async fn room_response(pool: web::Data<DbPool>, room: Room) -> Result<RoomResponse, ServiceError> {
    let messages = services::messages::room_messages(pool, room.id.clone()).await?;

    Ok(RoomResponse { room, messages })
}
