//! Endpoint reachability probe.

use crate::openai_compat::join_url;
use roundtable_proto::BackendError;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Lists the models served at `{base_url}/models`.
///
/// Succeeds with the advertised model ids. Callers treat a failure as a
/// warning, not a reason to abort.
pub async fn probe_endpoint(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<Vec<String>, BackendError> {
    let url = join_url(base_url, "models");
    debug!(url = %url, "Probing endpoint");

    let transport = |e: reqwest::Error| BackendError::Transport {
        endpoint: url.clone(),
        message: e.to_string(),
    };

    let response = client
        .get(&url)
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(transport)?;
    let status = response.status();
    let text = response.text().await.map_err(transport)?;

    if !status.is_success() {
        return Err(BackendError::Status {
            endpoint: url,
            status: status.as_u16(),
            body: text,
        });
    }

    let list: ModelList = serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse {
        endpoint: url.clone(),
        message: e.to_string(),
    })?;
    let models: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
    debug!(url = %url, models = models.len(), "Endpoint reachable");
    Ok(models)
}
