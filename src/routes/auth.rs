use crate::{db, services::is_unique_violation, types::DbPool, utils::get_user_id};
use actix_session::Session;
use actix_web::{get, post, web, Error, HttpResponse};
use bcrypt::verify;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct SignUpData {
    email: String,
    password: String,
    sign_in: bool,
}

#[derive(Deserialize)]
struct SignInData {
    email: String,
    password: String,
}

#[post("/signup")]
pub async fn sign_up(
    pool: web::Data<DbPool>,
    form: web::Json<SignUpData>,
    session: Session,
) -> Result<HttpResponse, Error> {
    let SignUpData {
        email,
        password,
        sign_in,
    } = form.into_inner();
    let email_taken_msg = format!("Email {email} is already registered.");

    let user = web::block(move || {
        let mut conn = pool.get()?;
        db::users::insert_new_user(&mut conn, &email, &password)
    })
    .await?
    .map_err(|err| {
        let error_msg = if is_unique_violation(&err) {
            email_taken_msg
        } else {
            err.to_string()
        };

        actix_web::error::ErrorUnprocessableEntity(json!({
            "success": false,
            "message": error_msg,
        }))
    })?;

    if sign_in {
        session.insert("user_id", user.id.clone())?;
    }

    let name = user.display_name().to_owned();
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "email": user.email,
            "name": name,
        },
    })))
}

#[post("/signin")]
pub async fn sign_in(
    pool: web::Data<DbPool>,
    session: Session,
    form: web::Json<SignInData>,
) -> Result<HttpResponse, Error> {
    let SignInData { email, password } = form.into_inner();

    let user = {
        let email = email.clone();
        web::block(move || {
            let mut conn = pool.get()?;
            db::users::find_user_by_email(&mut conn, &email)
        })
        .await?
        .map_err(actix_web::error::ErrorInternalServerError)?
    };

    if let Some(user) = user {
        let password_matches =
            verify(password, &user.password).map_err(actix_web::error::ErrorInternalServerError)?;

        if password_matches {
            session.insert("user_id", user.id.clone())?;
            let name = user.display_name().to_owned();
            Ok(HttpResponse::Ok().json(json!({
                "id": user.id,
                "email": user.email,
                "name": name,
            })))
        } else {
            Ok(HttpResponse::Unauthorized().json(json!({
                "message": format!("Wrong password for email: {email}"),
            })))
        }
    } else {
        Ok(HttpResponse::NotFound().json(json!({
            "message": format!("No user found with email: {email}"),
        })))
    }
}

#[post("/logout")]
pub async fn log_out(session: Session) -> HttpResponse {
    match get_user_id(&session) {
        Ok(_) => {
            session.purge();
            HttpResponse::Ok().json(json!({}))
        }
        Err(_) => HttpResponse::Unauthorized().json(json!({
            "message": "You're not signed in.",
        })),
    }
}

#[get("/user")]
pub async fn get_current_user(
    pool: web::Data<DbPool>,
    session: Session,
) -> Result<HttpResponse, Error> {
    let user_id = get_user_id(&session)?;

    let user = web::block(move || {
        let mut conn = pool.get()?;
        db::users::find_user_by_id(&mut conn, &user_id.to_string())
    })
    .await?
    .map_err(actix_web::error::ErrorInternalServerError)?;

    match user {
        Some(user) => {
            let name = user.display_name().to_owned();
            Ok(HttpResponse::Ok().json(json!({
                "id": user.id,
                "email": user.email,
                "name": name,
            })))
        }
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": format!("User {user_id} does not exist."),
        }))),
    }
}
