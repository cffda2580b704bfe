use crate::models::MessageForm;
use crate::server::ChatServerHandle;
use crate::services;
use crate::types::DbPool;
use crate::utils::get_user_id;
use actix_session::Session;
use actix_web::{delete, get, post, web, Error, HttpResponse};
use serde_json::json;

#[post("")]
pub async fn create_message(
    pool: web::Data<DbPool>,
    form: web::Json<MessageForm>,
    session: Session,
    chat_server: web::Data<ChatServerHandle>,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    let response = services::messages::create_message(
        pool,
        &chat_server,
        form.into_inner(),
        user_id.to_string(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// Live form feedback: validates a draft without persisting anything.
#[post("/validate")]
pub async fn validate_message(form: web::Json<MessageForm>) -> HttpResponse {
    match services::messages::validate_message(&form) {
        Ok(()) => HttpResponse::Ok().json(json!({ "valid": true })),
        Err(errors) => HttpResponse::UnprocessableEntity().json(json!({
            "valid": false,
            "errors": errors,
        })),
    }
}

#[get("/{message_id}")]
pub async fn get_message(
    pool: web::Data<DbPool>,
    message_id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let response = services::messages::get_message(pool, message_id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(response))
}

#[delete("/{message_id}")]
pub async fn delete_message(
    pool: web::Data<DbPool>,
    message_id: web::Path<i32>,
    session: Session,
    chat_server: web::Data<ChatServerHandle>,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    services::messages::delete_message(
        pool,
        &chat_server,
        message_id.into_inner(),
        user_id.to_string(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({})))
}
