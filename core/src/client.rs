use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::SaverConfig;
use crate::errors::{SaverError, SaverResult};
use crate::provider::ResponsesApi;
use crate::types::*;

/// HTTP client for the OpenAI Responses API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl OpenAiClient {
    /// Create a new client from configuration; the API key is required
    pub fn new(config: &SaverConfig) -> SaverResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                SaverError::Auth(
                    "API key is required (set OPENAI_API_KEY or api_key in config)".to_string(),
                )
            })?
            .to_string();

        let base_url = Url::parse(config.base_url()).map_err(|e| {
            SaverError::Config(format!("Invalid base URL '{}': {}", config.base_url(), e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SaverError::Config(format!(
                "Invalid base URL '{}': not a hierarchical URL",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs()))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SaverError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    /// Same configuration with a different API key
    pub fn with_api_key(config: &SaverConfig, api_key: &str) -> SaverResult<Self> {
        let config = SaverConfig {
            api_key: Some(api_key.to_string()),
            ..config.clone()
        };
        Self::new(&config)
    }

    /// Endpoint URL under the base; each segment is percent-encoded as one
    /// path segment, so identifiers cannot change the route
    fn url(&self, segments: &[&str]) -> SaverResult<Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(SaverError::InvalidTurn(format!(
                "Invalid identifier '{}'",
                bad
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SaverError::Config(format!("Invalid base URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> SaverResult<T> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| SaverError::Network(format!("Failed to send request: {}", e)))?;

        let response = check_status(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| SaverError::provider(None, format!("Failed to parse response: {}", e)))
    }
}

/// Maps a non-2xx response to the matching error kind
async fn check_status(response: Response) -> SaverResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorEnvelope>(&body) {
        Ok(envelope) => {
            let error = envelope.error;
            match (error.kind, error.code) {
                (_, Some(code)) => format!("{} [{}]", error.message, code),
                (Some(kind), None) => format!("{} [{}]", error.message, kind),
                (None, None) => error.message,
            }
        }
        Err(_) if body.trim().is_empty() => format!("API request failed with status {}", status),
        Err(_) => format!("API request failed: {}", body.trim()),
    };

    match status.as_u16() {
        401 | 403 => Err(SaverError::Auth(message)),
        code => Err(SaverError::provider(Some(code), message)),
    }
}

#[async_trait]
impl ResponsesApi for OpenAiClient {
    async fn create_response(&self, request: &CreateResponseRequest) -> SaverResult<ResponseObject> {
        let url = self.url(&["responses"])?;
        debug!("POST {} (model {})", url, request.model);
        self.execute(self.client.post(url).json(request)).await
    }

    async fn list_models(&self) -> SaverResult<Vec<String>> {
        let page: ListPage<ModelEntry> = self.execute(self.client.get(self.url(&["models"])?)).await?;
        Ok(page.data.into_iter().map(|model| model.id).collect())
    }

    async fn retrieve_response(&self, id: &ResponseId) -> SaverResult<ResponseObject> {
        let url = self.url(&["responses", id.as_str()])?;
        self.execute(self.client.get(url)).await
    }

    async fn list_input_items(&self, id: &ResponseId) -> SaverResult<Vec<InputItem>> {
        let url = self.url(&["responses", id.as_str(), "input_items"])?;
        let page: ListPage<InputItem> = self.execute(self.client.get(url)).await?;
        Ok(page.data)
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> SaverResult<ConversationObject> {
        let url = self.url(&["conversations"])?;
        debug!("POST {}", url);
        self.execute(self.client.post(url).json(request)).await
    }

    async fn add_conversation_items(
        &self,
        id: &ConversationId,
        items: &[ConversationItem],
    ) -> SaverResult<()> {
        let url = self.url(&["conversations", id.as_str(), "items"])?;
        debug!("POST {} ({} item(s))", url, items.len());
        let _page: ListPage<InputItem> = self
            .execute(self.client.post(url).json(&AddItemsRequest { items }))
            .await?;
        Ok(())
    }

    async fn list_conversation_items(&self, id: &ConversationId) -> SaverResult<Vec<InputItem>> {
        let url = self.url(&["conversations", id.as_str(), "items"])?;
        let page: ListPage<InputItem> = self.execute(self.client.get(url)).await?;
        Ok(page.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_auth_error() {
        let err = OpenAiClient::new(&SaverConfig::default()).unwrap_err();
        assert!(matches!(err, SaverError::Auth(_)));

        let blank = SaverConfig {
            api_key: Some("  ".to_string()),
            ..SaverConfig::default()
        };
        assert!(matches!(
            OpenAiClient::new(&blank).unwrap_err(),
            SaverError::Auth(_)
        ));
    }

    #[test]
    fn test_urls_join_base() {
        let config = SaverConfig {
            base_url: Some("http://localhost:9/v1/".to_string()),
            ..SaverConfig::default()
        };
        let client = OpenAiClient::with_api_key(&config, "sk-test").unwrap();
        assert_eq!(
            client.url(&["responses"]).unwrap().as_str(),
            "http://localhost:9/v1/responses"
        );
    }

    #[test]
    fn test_identifiers_stay_in_one_segment() {
        let client = OpenAiClient::with_api_key(&SaverConfig::default(), "sk-test").unwrap();
        let url = client
            .url(&["responses", "../models?x=", "input_items"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.openai.com/v1/responses/..%2Fmodels%3Fx=/input_items"
        );
        assert_eq!(url.path_segments().unwrap().count(), 4);

        for bad in [".", ".."] {
            assert!(matches!(
                client.url(&["responses", bad]).unwrap_err(),
                SaverError::InvalidTurn(_)
            ));
        }
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let config = SaverConfig {
            base_url: Some("not a url".to_string()),
            ..SaverConfig::default()
        };
        assert!(matches!(
            OpenAiClient::with_api_key(&config, "sk-test").unwrap_err(),
            SaverError::Config(_)
        ));
    }
}
