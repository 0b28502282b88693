use anyhow::Result;
use async_trait::async_trait;
use chatmux_protocol::{Chat, Message};

use crate::api::ApiClient;

/// Request/response operations the TUI needs from the server.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    async fn list_chats(&self, limit: usize) -> Result<Vec<Chat>>;
    async fn list_messages(&self, chat_guid: String, limit: usize) -> Result<Vec<Message>>;
    async fn send_message(&self, chat_guid: String, text: String) -> Result<()>;
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn list_chats(&self, limit: usize) -> Result<Vec<Chat>> {
        ApiClient::list_chats(self, limit).await
    }

    async fn list_messages(&self, chat_guid: String, limit: usize) -> Result<Vec<Message>> {
        ApiClient::list_messages(self, &chat_guid, limit).await
    }

    async fn send_message(&self, chat_guid: String, text: String) -> Result<()> {
        ApiClient::send_message(self, &chat_guid, &text).await
    }
}
