use crate::error::DiningError;
use crate::model::{ChatMessage, ChatSession};
use crate::store::{load_list, save_list, KeyValueStore, CHAT_SESSIONS_KEY};
use chrono::Utc;
use log::info;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub fn session_name(dining_hall: &str, meal_period: &str) -> String {
    format!("Chat - {} ({})", dining_hall, meal_period.replace('+', " "))
}

/// A session rendered for download.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionExport {
    pub file_name: String,
    pub json: String,
}

impl SessionExport {
    pub fn new(session: &ChatSession) -> Result<Self, DiningError> {
        Ok(SessionExport {
            file_name: format!(
                "{}_{}.json",
                WHITESPACE_RE.replace_all(&session.name, "_"),
                session.date
            ),
            json: serde_json::to_string_pretty(session)?,
        })
    }
}

/// Saved chat conversations, persisted under `chatSessions`.
pub struct ChatSessions {
    store: Arc<dyn KeyValueStore>,
    sessions: Mutex<Vec<ChatSession>>,
}

impl ChatSessions {
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let sessions: Vec<ChatSession> = load_list(store.as_ref(), CHAT_SESSIONS_KEY).await;
        info!("Loaded {} chat sessions", sessions.len());
        ChatSessions {
            store,
            sessions: Mutex::new(sessions),
        }
    }

    /// Sessions, most recently updated first.
    pub async fn list(&self) -> Vec<ChatSession> {
        let mut sessions = self.sessions.lock().await.clone();
        sessions.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        sessions
    }

    pub async fn get(&self, id: &str) -> Option<ChatSession> {
        self.sessions
            .lock()
            .await
            .iter()
            .find(|session| session.id == id)
            .cloned()
    }

    /// Save the conversation under `id`, replacing any earlier version.
    pub async fn autosave(
        &self,
        id: &str,
        dining_hall: &str,
        meal_period: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<ChatSession, DiningError> {
        let now = Utc::now();
        let session = ChatSession {
            id: id.to_string(),
            name: session_name(dining_hall, meal_period),
            dining_hall: dining_hall.to_string(),
            meal_period: meal_period.to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            messages,
            last_updated: now.timestamp_millis(),
        };

        let mut sessions = self.sessions.lock().await;
        let mut next: Vec<ChatSession> = sessions
            .iter()
            .filter(|existing| existing.id != id)
            .cloned()
            .collect();
        next.push(session.clone());
        self.commit(&mut sessions, next).await?;
        Ok(session)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, DiningError> {
        let mut sessions = self.sessions.lock().await;
        if !sessions.iter().any(|session| session.id == id) {
            return Ok(false);
        }
        let next: Vec<ChatSession> = sessions
            .iter()
            .filter(|session| session.id != id)
            .cloned()
            .collect();
        self.commit(&mut sessions, next).await?;
        Ok(true)
    }

    /// Persist `next` before it replaces the live list.
    async fn commit(
        &self,
        sessions: &mut Vec<ChatSession>,
        next: Vec<ChatSession>,
    ) -> Result<(), DiningError> {
        save_list(self.store.as_ref(), CHAT_SESSIONS_KEY, &next).await?;
        *sessions = next;
        Ok(())
    }

    pub async fn export(&self, id: &str) -> Result<Option<SessionExport>, DiningError> {
        self.get(id).await.as_ref().map(SessionExport::new).transpose()
    }

    /// Write the export for `id` into `dir`, returning the file path.
    pub async fn export_to(&self, id: &str, dir: &Path) -> Result<Option<PathBuf>, DiningError> {
        let Some(export) = self.export(id).await? else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&export.file_name);
        tokio::fs::write(&path, export.json).await?;
        Ok(Some(path))
    }
}
