//! Client for the host system's document-access service: who can see the
//! document a room is anchored to.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    error::{ChatError, ChatResult},
    GetField,
};

const LOOKUP_PATH: &str = "/IndividualInformation/GetIndividualInformation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomType {
    Drawing,
    Rfi,
    TechSubmittal,
    Document,
}

impl RoomType {
    pub fn parse(room_type: &str) -> Option<RoomType> {
        use RoomType::*;
        match room_type {
            "DWG" => Some(Drawing),
            "RFI" => Some(Rfi),
            "TECH" => Some(TechSubmittal),
            "DOCS" => Some(Document),
            _ => None,
        }
    }

    /// Document table the host system files this room type under.
    pub fn table_name(self) -> &'static str {
        use RoomType::*;
        match self {
            Drawing => "docDrawings",
            Rfi => "docRFI",
            TechSubmittal => "docTechSubmittals",
            Document => "alldocs",
        }
    }
}

/// A person as the directory reports them. Only `key` is read here, the rest
/// is handed to the client as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub key: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl DirectoryClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_owned()),
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Looks up everyone with access to the room's document.
    ///
    /// Rooms whose `extra_info.room_type` is missing or unknown have nobody
    /// involved, without asking the service.
    pub async fn people_involved(
        &self,
        project_uid: &str,
        room_uid: &str,
        extra_info: &Value,
        auth_token: Option<&str>,
    ) -> ChatResult<Vec<Person>> {
        let Some(base_url) = &self.base_url else {
            debug!("no directory configured, nobody involved in {project_uid}/{room_uid}");
            return Ok(Vec::new());
        };

        let room_type = match extra_info.get_str_field("room_type") {
            Ok(room_type) => room_type,
            Err(e) => {
                warn!("room {project_uid}/{room_uid} has no room type: {e}");
                return Ok(Vec::new());
            }
        };
        let Some(room_type) = RoomType::parse(room_type) else {
            warn!("room {project_uid}/{room_uid} has unknown room type {room_type:?}");
            return Ok(Vec::new());
        };

        let mut request = self
            .http
            .get(format!("{base_url}{LOOKUP_PATH}"))
            .query(&[
                ("projectKey", project_uid),
                ("tableName", room_type.table_name()),
                ("recordKey", room_uid),
            ]);
        if let Some(auth_token) = auth_token {
            request = request.header(AUTHORIZATION, auth_token);
        }

        let lookup = async {
            let people: Vec<Person> = request.send().await?.error_for_status()?.json().await?;
            Ok::<_, ChatError>(people)
        };
        tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| ChatError::DirectoryTimeout(self.timeout))?
    }

    /// Like [`people_involved`](Self::people_involved), but a failing service
    /// only means nobody comes from this source.
    pub async fn people_or_nobody(
        &self,
        project_uid: &str,
        room_uid: &str,
        extra_info: &Value,
        auth_token: Option<&str>,
    ) -> Vec<Person> {
        match self.people_involved(project_uid, room_uid, extra_info, auth_token).await {
            Ok(people) => people,
            Err(e) => {
                warn!("treating {project_uid}/{room_uid} as having nobody involved: {e}");
                Vec::new()
            }
        }
    }
}
