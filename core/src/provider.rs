use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::SaverResult;
use crate::types::{
    ConversationId, ConversationItem, ConversationObject, CreateConversationRequest,
    CreateResponseRequest, InputItem, ResponseId, ResponseObject,
};

/// The slice of the provider API the conversation client depends on
#[async_trait]
pub trait ResponsesApi: Send + Sync {
    /// Issues exactly one create request; implementations must not retry
    async fn create_response(&self, request: &CreateResponseRequest) -> SaverResult<ResponseObject>;

    /// Lists every model id visible to the credential
    async fn list_models(&self) -> SaverResult<Vec<String>>;

    async fn retrieve_response(&self, id: &ResponseId) -> SaverResult<ResponseObject>;

    /// Input items of a stored response, newest first
    async fn list_input_items(&self, id: &ResponseId) -> SaverResult<Vec<InputItem>>;

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> SaverResult<ConversationObject>;

    /// Appends items in the given order; callers keep batches within provider limits
    async fn add_conversation_items(
        &self,
        id: &ConversationId,
        items: &[ConversationItem],
    ) -> SaverResult<()>;

    /// Items of a conversation, newest first
    async fn list_conversation_items(&self, id: &ConversationId) -> SaverResult<Vec<InputItem>>;
}

pub type ResponsesApiRef = Arc<dyn ResponsesApi>;
