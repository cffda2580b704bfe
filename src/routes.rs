use actix_web::{web, Scope};

pub mod auth;
pub mod messages;
pub mod replies;
pub mod rooms;
pub mod ws;

pub fn create_auth_scope() -> Scope {
    web::scope("/auth")
        .service(auth::sign_up)
        .service(auth::sign_in)
        .service(auth::get_current_user)
        .service(auth::log_out)
}

pub fn create_room_scope() -> Scope {
    // literal paths are registered ahead of the `{room_id}` matchers
    web::scope("/rooms")
        .service(rooms::get_rooms)
        .service(rooms::browse_rooms)
        .service(rooms::joined_rooms)
        .service(rooms::first_room)
        .service(rooms::create_room)
        .service(rooms::toggle_membership)
        .service(rooms::mark_room_read)
        .service(rooms::update_room)
        .service(rooms::get_room)
}

pub fn create_message_scope() -> Scope {
    web::scope("/messages")
        .service(messages::validate_message)
        .service(messages::create_message)
        .service(messages::get_message)
        .service(messages::delete_message)
}

pub fn create_reply_scope() -> Scope {
    web::scope("/replies")
        .service(replies::create_reply)
        .service(replies::delete_reply)
}
