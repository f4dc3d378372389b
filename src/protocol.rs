//! Wire format of the chat socket.
//!
//! Every frame is a JSON text message shaped `{"event": "<name>", "data": <payload>}`.
//! Inbound frames are decoded in two steps so that a bad payload can be reported
//! against the event it arrived with.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    directory::Person,
    error::{ChatError, ChatResult},
    store::{LoggedMessage, RoomMessage},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyPayload {
    pub user: User,
    #[serde(rename = "clientVersion")]
    pub client_version: String,
    #[serde(default)]
    pub project_uid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub room_uid: String,
    pub project_uid: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    pub author: User,
    #[serde(default)]
    pub extra_info: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_on: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub uid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub room_uid: String,
    pub project_uid: String,
    pub author: User,
    pub attachment: AttachmentRef,
    #[serde(default)]
    pub extra_info: Value,
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_on: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserEventKind {
    Joined,
    Left,
    StartTyping,
    StopTyping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEventPayload {
    pub room_uid: String,
    pub project_uid: String,
    pub author: User,
    pub event: UserEventKind,
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomRef {
    pub room_uid: String,
    pub project_uid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnreadQuery {
    pub project_uid: String,
    pub author_uid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadRoomPayload {
    pub author_uid: String,
    pub room_uid: String,
    pub project_uid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeopleQuery {
    pub room_uid: String,
    pub project_uid: String,
    #[serde(default)]
    pub extra_info: Value,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Identify(IdentifyPayload),
    Message(MessagePayload),
    Attachment(AttachmentPayload),
    UserEvent(UserEventPayload),
    GetAllMessages(RoomRef),
    GetUnreadRooms(UnreadQuery),
    ReadRoom(ReadRoomPayload),
    GetPeopleInvolved(PeopleQuery),
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> ChatResult<T> {
    serde_json::from_value(data).map_err(|e| ChatError::validation(event, e))
}

impl ClientEvent {
    /// Decodes one text frame. `Ok(None)` means the event name is not one we handle.
    pub fn parse(text: &str) -> ChatResult<Option<ClientEvent>> {
        let Frame { event, data } =
            serde_json::from_str(text).map_err(|e| ChatError::validation("frame", e))?;

        let event = match event.as_str() {
            "identify" => ClientEvent::Identify(payload(&event, data)?),
            "message" => ClientEvent::Message(payload(&event, data)?),
            "attachment" => ClientEvent::Attachment(payload(&event, data)?),
            "userevent" => ClientEvent::UserEvent(payload(&event, data)?),
            "getallmessages" => ClientEvent::GetAllMessages(payload(&event, data)?),
            "getunreadrooms" => ClientEvent::GetUnreadRooms(payload(&event, data)?),
            "readroom" => ClientEvent::ReadRoom(payload(&event, data)?),
            "getpeopleinvolved" => ClientEvent::GetPeopleInvolved(payload(&event, data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Identify(_) => "identify",
            ClientEvent::Message(_) => "message",
            ClientEvent::Attachment(_) => "attachment",
            ClientEvent::UserEvent(_) => "userevent",
            ClientEvent::GetAllMessages(_) => "getallmessages",
            ClientEvent::GetUnreadRooms(_) => "getunreadrooms",
            ClientEvent::ReadRoom(_) => "readroom",
            ClientEvent::GetPeopleInvolved(_) => "getpeopleinvolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Protocol,
    Validation,
    Persistence,
    Collaborator,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(rename = "COMPATIBLE_CLIENT_VERSIONS", skip_serializing_if = "Option::is_none")]
    pub compatible_versions: Option<Vec<String>>,
    #[serde(rename = "clientVersion", skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub room_uid: String,
    pub project_uid: String,
    pub author_uid: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    Handshake,
    Identified,
    Error(ErrorPayload),
    Message(MessagePayload),
    Attachment(AttachmentPayload),
    UserEvent(UserEventPayload),
    AllMessages(Vec<RoomMessage>),
    UnreadRooms(Vec<LoggedMessage>),
    PeopleInvolved(Vec<Person>),
    Response(CommandResponse),
}

impl ServerEvent {
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
