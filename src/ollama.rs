use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capability::{Capability, SessionFactory, TextSession};
use crate::config::Config;
use crate::error::CapabilityError;

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Single reachability check used at startup. Any failure means "absent".
    pub async fn probe(&self, timeout: Duration) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), "probe rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, "probe failed");
                false
            }
        }
    }

    /// Non-streaming completion. No timeout is applied.
    pub async fn query(&self, prompt: &str) -> Result<String, CapabilityError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(CapabilityError::Status(response.status()));
        }

        let body = response.text().await?;
        let ollama_response: OllamaResponse =
            serde_json::from_str(&body).map_err(|e| CapabilityError::Decode(e.to_string()))?;
        Ok(ollama_response.response)
    }

    pub async fn list_models(&self) -> Result<Vec<String>, CapabilityError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(CapabilityError::Status(response.status()));
        }

        let body = response.text().await?;
        let models_response: OllamaModelsResponse =
            serde_json::from_str(&body).map_err(|e| CapabilityError::Decode(e.to_string()))?;
        Ok(models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect())
    }

    pub async fn has_model(&self, name: &str) -> Result<bool, CapabilityError> {
        let models = self.list_models().await?;
        // Ollama reports `llama3.2:latest` for a model pulled as `llama3.2`.
        Ok(models
            .iter()
            .any(|m| m == name || m.strip_suffix(":latest") == Some(name)))
    }
}

/// One prompt/response exchange against the configured model.
pub struct OllamaSession {
    client: OllamaClient,
}

impl TextSession for OllamaSession {
    fn prompt<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String, CapabilityError>> {
        self.client.query(query).boxed()
    }
}

impl SessionFactory for OllamaClient {
    fn create_session(&self) -> BoxFuture<'_, Result<Box<dyn TextSession>, CapabilityError>> {
        async move {
            if !self.has_model(&self.model).await? {
                return Err(CapabilityError::ModelMissing(self.model.clone()));
            }
            let session: Box<dyn TextSession> = Box::new(OllamaSession {
                client: self.clone(),
            });
            Ok(session)
        }
        .boxed()
    }

    fn describe(&self) -> String {
        format!("ollama: {}", self.model)
    }
}

/// Resolve the capability once, before the UI starts.
pub async fn detect(config: &Config) -> Capability {
    let client = OllamaClient::new(&config.endpoint, &config.model);
    if client.probe(config.probe_timeout()).await {
        info!(endpoint = %config.endpoint, model = %config.model, "text capability available");
        Capability::available(client)
    } else {
        info!(endpoint = %config.endpoint, "text capability not available");
        Capability::Unavailable
    }
}
