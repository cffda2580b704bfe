use crate::schema::*;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// db models
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Identifiable, Insertable,
)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub created_at: String,
}

impl User {
    /// Display name shown in room and message listings: the local part of
    /// the email address.
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Selectable, Queryable, Identifiable, Insertable,
)]
#[diesel(table_name = rooms)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub topic: Option<String>,
    pub created_at: String,
}

#[derive(Identifiable, Selectable, Queryable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(Room))]
#[diesel(belongs_to(User))]
#[diesel(table_name = room_memberships)]
pub struct RoomMembership {
    pub id: i32,
    pub room_id: String,
    pub user_id: String,
    pub last_read_id: Option<i32>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = room_memberships)]
pub struct NewMembership {
    pub room_id: String,
    pub user_id: String,
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Queryable,
    Identifiable,
    Associations,
    Selectable,
)]
#[diesel(belongs_to(Room))]
#[diesel(belongs_to(User))]
pub struct Message {
    pub id: i32,
    pub room_id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub room_id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: String,
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Queryable,
    Identifiable,
    Associations,
    Selectable,
)]
#[diesel(belongs_to(Message))]
#[diesel(belongs_to(User))]
#[diesel(table_name = replies)]
pub struct Reply {
    pub id: i32,
    pub message_id: i32,
    pub user_id: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = replies)]
pub struct NewReply {
    pub message_id: i32,
    pub user_id: String,
    pub body: String,
    pub created_at: String,
}

// business models
pub const ROOM_NAME_MAX_LEN: usize = 80;
pub const ROOM_TOPIC_MAX_LEN: usize = 200;

/// Field-level validation failures, keyed by field name. Serializes to the
/// `{"field": ["message", ...]}` shape the client renders inline.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ValidationErrors(pub HashMap<&'static str, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomForm {
    pub name: String,
    pub topic: Option<String>,
}

impl RoomForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.name.is_empty() {
            errors.add("name", "can't be blank");
        } else if self.name.chars().count() > ROOM_NAME_MAX_LEN {
            errors.add(
                "name",
                format!("is too long (maximum is {ROOM_NAME_MAX_LEN} characters)"),
            );
        } else if !self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            errors.add("name", "may only contain lowercase letters, digits and dashes");
        }

        if let Some(topic) = &self.topic {
            if topic.chars().count() > ROOM_TOPIC_MAX_LEN {
                errors.add(
                    "topic",
                    format!("is too long (maximum is {ROOM_TOPIC_MAX_LEN} characters)"),
                );
            }
        }

        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageForm {
    pub room_id: String,
    pub body: String,
}

impl MessageForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_body(&self.body)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyForm {
    pub message_id: i32,
    pub body: String,
}

impl ReplyForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_body(&self.body)
    }
}

fn validate_body(body: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if body.trim().is_empty() {
        errors.add("body", "can't be blank");
    }
    errors.into_result()
}

/// User as embedded in room and message payloads: id plus derived display
/// name, nothing else leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.display_name().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub reply: Reply,
    pub user: PublicUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: Message,
    pub user: PublicUser,
    pub replies: Vec<ReplyResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    pub room: Room,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomListing {
    pub room: Room,
    pub joined: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadRoom {
    pub room: Room,
    pub unread_count: i64,
}

/// Events broadcast on a room's topic after a successful mutation. The
/// originating connection receives its own event like any other subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RoomEvent {
    NewMessage(MessageResponse),
    MessageDeleted { id: i32, room_id: String },
    NewReply(MessageResponse),
    DeletedReply(MessageResponse),
}
