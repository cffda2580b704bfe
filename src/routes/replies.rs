use crate::models::ReplyForm;
use crate::server::ChatServerHandle;
use crate::services;
use crate::types::DbPool;
use crate::utils::get_user_id;
use actix_session::Session;
use actix_web::{delete, post, web, Error, HttpResponse};
use serde_json::json;

#[post("")]
pub async fn create_reply(
    pool: web::Data<DbPool>,
    form: web::Json<ReplyForm>,
    session: Session,
    chat_server: web::Data<ChatServerHandle>,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    let response = services::messages::create_reply(
        pool,
        &chat_server,
        form.into_inner(),
        user_id.to_string(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(response))
}

#[delete("/{reply_id}")]
pub async fn delete_reply(
    pool: web::Data<DbPool>,
    reply_id: web::Path<i32>,
    session: Session,
    chat_server: web::Data<ChatServerHandle>,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    services::messages::delete_reply(
        pool,
        &chat_server,
        reply_id.into_inner(),
        user_id.to_string(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({})))
}
