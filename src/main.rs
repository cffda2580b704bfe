use actix_cors::Cors;
use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, http, middleware, web, App, HttpServer};
use diesel::{
    r2d2::{self, ConnectionManager},
    SqliteConnection,
};
use env_logger::Env;
use middlewares::auth::Authentication;
use server::ChatServer;
use tokio::{task::spawn, try_join};

mod db;
mod middlewares;
mod models;
mod routes;
mod schema;
mod server;
mod services;
mod types;
mod utils;

pub type ConnId = usize;
pub type RoomId = String;
pub type Msg = String;

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let conn_spec = std::env::var("DATABASE_URL").unwrap_or_else(|_| "chat.db".to_owned());
    let manager = ConnectionManager::<SqliteConnection>::new(conn_spec);
    let pool = r2d2::Pool::builder()
        .build(manager)
        .expect("Failed to create pool.");

    let server_addr = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let server_port = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse::<u16>().ok())
        .unwrap_or(8080);

    let (chat_server, server_tx) = ChatServer::new();

    let chat_server = spawn(chat_server.run());

    let app = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:8080")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![http::header::AUTHORIZATION, http::header::ACCEPT])
            .allowed_header(http::header::CONTENT_TYPE)
            .max_age(3600);

        let api_scope = web::scope("/api")
            .service(routes::create_auth_scope())
            .service(routes::create_room_scope())
            .service(routes::create_message_scope())
            .service(routes::create_reply_scope());

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(server_tx.clone()))
            .wrap(Authentication)
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[0; 64]))
                    .cookie_secure(false)
                    .session_lifecycle(
                        PersistentSession::default()
                            .session_ttl(actix_web::cookie::time::Duration::hours(12)),
                    )
                    .build(),
            )
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .service(web::resource("/ws").route(web::get().to(routes::ws::chat_ws)))
            .service(api_scope)
            .wrap(middleware::NormalizePath::trim())
    })
    .workers(2)
    .bind((server_addr.as_str(), server_port))?
    .run();

    log::info!("Server running at http://{server_addr}:{server_port}");

    try_join!(app, async move { chat_server.await.unwrap() })?;

    Ok(())
}
