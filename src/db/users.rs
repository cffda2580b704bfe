use crate::{db::iso_date, models::User};
use bcrypt::hash;
use diesel::prelude::*;
use uuid::Uuid;

use super::DbError;

pub fn find_user_by_id(conn: &mut SqliteConnection, uid: &str) -> Result<Option<User>, DbError> {
    use crate::schema::users::dsl::*;

    let user = users.filter(id.eq(uid)).first::<User>(conn).optional()?;

    Ok(user)
}

pub fn find_user_by_email(conn: &mut SqliteConnection, em: &str) -> Result<Option<User>, DbError> {
    use crate::schema::users::dsl::*;

    let user = users.filter(email.eq(em)).first::<User>(conn).optional()?;

    Ok(user)
}

pub fn insert_new_user(conn: &mut SqliteConnection, em: &str, pw: &str) -> Result<User, DbError> {
    use crate::schema::users::dsl::*;

    let hashed_password = hash(pw, 4)?;

    let new_user = User {
        id: Uuid::new_v4().to_string(),
        email: em.to_owned(),
        password: hashed_password,
        created_at: iso_date(),
    };
    diesel::insert_into(users).values(&new_user).execute(conn)?;

    Ok(new_user)
}
