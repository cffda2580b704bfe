use chrono::{DateTime, Utc};
use std::time::SystemTime;

pub mod memberships;
pub mod messages;
pub mod replies;
pub mod rooms;
pub mod users;

pub type DbError = Box<dyn std::error::Error + Send + Sync>;

pub fn iso_date() -> String {
    let now = SystemTime::now();
    let now: DateTime<Utc> = now.into();
    now.to_rfc3339()
}

#[cfg(test)]
pub(crate) mod test_db {
    use crate::db;
    use crate::models::{Room, RoomForm, User};
    use crate::types::DbPool;
    use diesel::connection::SimpleConnection;
    use diesel::prelude::*;
    use diesel::r2d2::{self, ConnectionManager};

    const MIGRATION_SQL: &str =
        include_str!("../migrations/2026-07-21-094500_create_chat_tables/up.sql");

    pub fn connection() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        conn.batch_execute(MIGRATION_SQL).unwrap();
        conn
    }

    /// Size-1 pool over a single in-memory database so every `web::block`
    /// in a service test sees the same data.
    pub fn pool() -> DbPool {
        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        pool.get().unwrap().batch_execute(MIGRATION_SQL).unwrap();
        pool
    }

    pub fn insert_user(conn: &mut SqliteConnection, email: &str) -> User {
        db::users::insert_new_user(conn, email, "secret").unwrap()
    }

    pub fn insert_room(conn: &mut SqliteConnection, name: &str) -> Room {
        let form = RoomForm {
            name: name.to_owned(),
            topic: None,
        };
        db::rooms::insert_new_room(conn, &form).unwrap()
    }
}
