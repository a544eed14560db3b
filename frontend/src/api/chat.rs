use std::{cell::RefCell, rc::Rc};

use super::{
    client::{ApiRequest, AuthorizedClient},
    types::{
        ApiError, Chat, ChatCreateRequest, ChatMessage, ChatsQuery, Folder, FolderCreateRequest,
        GptReply, MessagesQuery, RenameChatRequest, SendMessageRequest,
    },
};

#[derive(Debug, Clone, Default)]
struct ChatState {
    chats: Option<Vec<Chat>>,
    selected: Option<Chat>,
}

/// Chats, folders and text messages. Keeps the last fetched chat list and the
/// selected chat so views can render without refetching.
#[derive(Clone)]
pub struct ChatApi {
    client: AuthorizedClient,
    state: Rc<RefCell<ChatState>>,
}

pub(crate) fn interpret_request(payload: &SendMessageRequest) -> Result<ApiRequest, ApiError> {
    ApiRequest::post("/interpret").json(payload)
}

impl ChatApi {
    pub fn new(client: AuthorizedClient) -> Self {
        Self {
            client,
            state: Rc::new(RefCell::new(ChatState::default())),
        }
    }

    pub fn chats(&self) -> Option<Vec<Chat>> {
        self.state.borrow().chats.clone()
    }

    pub fn selected_chat(&self) -> Option<Chat> {
        self.state.borrow().selected.clone()
    }

    pub fn select_chat(&self, chat: Option<Chat>) {
        self.state.borrow_mut().selected = chat;
    }

    pub async fn send_message(&self, payload: SendMessageRequest) -> Result<GptReply, ApiError> {
        self.client.send_json(interpret_request(&payload)?).await
    }

    pub async fn create_chat(&self, payload: ChatCreateRequest) -> Result<Chat, ApiError> {
        let chat: Chat = self
            .client
            .send_json(ApiRequest::post("/chats").json(&payload)?)
            .await?;

        let mut state = self.state.borrow_mut();
        state.selected = Some(chat.clone());
        if let Some(chats) = state.chats.as_mut() {
            chats.push(chat.clone());
        }
        Ok(chat)
    }

    pub async fn get_chats(&self, query: ChatsQuery) -> Result<Vec<Chat>, ApiError> {
        let chats: Vec<Chat> = self
            .client
            .send_json(ApiRequest::get("/chats").query(&query)?)
            .await?;
        self.state.borrow_mut().chats = Some(chats.clone());
        Ok(chats)
    }

    pub async fn get_chat_messages(
        &self,
        query: MessagesQuery,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        if query.chat_id.trim().is_empty() {
            return Err(ApiError::missing_precondition(
                "chat_id is required to load messages",
            ));
        }
        let request = ApiRequest::get(format!("/chats/{}/messages", query.chat_id)).query(
            &serde_json::json!({ "user_id": query.user_id, "limit": query.limit }),
        )?;
        self.client.send_json(request).await
    }

    pub async fn rename_chat(
        &self,
        chat_id: &str,
        title: &str,
        user_id: &str,
    ) -> Result<Chat, ApiError> {
        if chat_id.trim().is_empty() {
            return Err(ApiError::missing_precondition(
                "chat_id is required to rename a chat",
            ));
        }
        let body = RenameChatRequest {
            user_id: user_id.to_string(),
            title: title.to_string(),
        };
        let chat: Chat = self
            .client
            .send_json(ApiRequest::patch(format!("/chats/{}", chat_id)).json(&body)?)
            .await?;

        let mut state = self.state.borrow_mut();
        if state.selected.as_ref().is_some_and(|c| c.id == chat_id) {
            state.selected = Some(chat.clone());
        }
        if let Some(chats) = state.chats.as_mut() {
            match chats.iter_mut().find(|c| c.id == chat_id) {
                Some(entry) => *entry = chat.clone(),
                None => log::warn!("Chat with id {} not found in state", chat_id),
            }
        }
        Ok(chat)
    }

    pub async fn create_folder(&self, payload: FolderCreateRequest) -> Result<Folder, ApiError> {
        self.client
            .send_json(ApiRequest::post("/folders").json(&payload)?)
            .await
    }

    pub async fn get_folders(&self, user_id: &str) -> Result<Vec<Folder>, ApiError> {
        let request =
            ApiRequest::get("/folders").query(&serde_json::json!({ "user_id": user_id }))?;
        self.client.send_json(request).await
    }
}
