use actix_session::Session;
use actix_web::error::{self, Error};
use serde_json::json;
use uuid::Uuid;

/// The signed-in user's id, or an unauthorized error. The `/ws` route sits
/// outside the `/api` authentication middleware, so it checks here too.
pub fn get_user_id(session: &Session) -> Result<Uuid, Error> {
    session
        .get::<Uuid>("user_id")
        .ok()
        .flatten()
        .ok_or_else(|| {
            error::ErrorUnauthorized(json!({
                "message": "Signin required.",
            }))
        })
}
