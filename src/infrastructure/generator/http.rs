//! Generic JSON-over-HTTP generator
//!
//! Posts `{"step_type", "model", "parameters"}` to the model's endpoint and
//! expects `{"output", "cost"?, "elapsed_ms"?}` back. Relative endpoints are
//! joined onto the configured base URL.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::generator::{
    GenerationOutput, GenerationRequest, Generator, GeneratorBinding, GeneratorError,
};
use crate::domain::DomainError;

#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    step_type: &'a str,
    model: &'a str,
    parameters: &'a BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    output: String,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    elapsed_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct HttpGenerator {
    name: String,
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    bindings: Vec<GeneratorBinding>,
}

impl HttpGenerator {
    /// Create a generator serving every binding
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            base_url: None,
            api_key: None,
            bindings: vec![GeneratorBinding::any()],
        }
    }

    /// Create with a request timeout on the underlying client
    pub fn with_timeout(name: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            ..Self::new(name)
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_bindings(mut self, bindings: Vec<GeneratorBinding>) -> Self {
        self.bindings = bindings;
        self
    }

    fn url_for(&self, endpoint: &str) -> Result<String, GeneratorError> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(endpoint.to_string());
        }

        match &self.base_url {
            Some(base) => Ok(format!("{}/{}", base, endpoint.trim_start_matches('/'))),
            None => Err(GeneratorError::fatal(format!(
                "Endpoint '{}' is relative and generator '{}' has no base URL",
                endpoint, self.name
            ))),
        }
    }
}

/// Map a failed response status onto the retry classification
fn classify_status(status: StatusCode, body: String) -> GeneratorError {
    let message = format!("HTTP {}: {}", status, body);

    match status {
        StatusCode::TOO_MANY_REQUESTS => GeneratorError::Retryable(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            GeneratorError::InvalidInput(message)
        }
        s if s.is_server_error() => GeneratorError::Retryable(message),
        _ => GeneratorError::Fatal(message),
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn bindings(&self) -> Vec<GeneratorBinding> {
        self.bindings.clone()
    }

    async fn invoke(&self, request: GenerationRequest) -> Result<GenerationOutput, GeneratorError> {
        let url = self.url_for(request.model.endpoint())?;
        let body = InvokeBody {
            step_type: &request.step_type,
            model: request.model.key(),
            parameters: &request.parameters,
        };

        debug!(generator = %self.name, step = %request.step_name, url = %url, "Invoking generator");

        let mut http_request = self.client.post(&url).json(&body);

        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| GeneratorError::retryable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, error_body));
        }

        let parsed: InvokeResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::fatal(format!("Failed to parse response: {}", e)))?;

        let mut output = GenerationOutput::new(
            parsed.output,
            parsed.cost.unwrap_or_else(|| request.model.cost_estimate()),
        );
        if let Some(elapsed_ms) = parsed.elapsed_ms {
            output = output.with_elapsed_ms(elapsed_ms);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ModelDefinition;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(endpoint: &str) -> GenerationRequest {
        let model = ModelDefinition::new("flux-dev", "FLUX.1 dev", "fal", endpoint)
            .with_category("generate_image")
            .with_cost_estimate(0.025);

        let mut parameters = BTreeMap::new();
        parameters.insert("prompt".to_string(), json!("a red bicycle"));

        GenerationRequest::new("img", "generate_image", model, parameters)
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/fal-ai/flux/dev"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({
                "step_type": "generate_image",
                "model": "flux-dev",
                "parameters": {"prompt": "a red bicycle"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": "https://cdn.example.com/img.png",
                "cost": 0.03,
                "elapsed_ms": 2100
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpGenerator::new("http")
            .with_base_url(server.uri())
            .with_api_key("secret");

        let output = generator.invoke(request("fal-ai/flux/dev")).await.unwrap();

        assert_eq!(output.output, "https://cdn.example.com/img.png");
        assert_eq!(output.cost, 0.03);
        assert_eq!(output.elapsed_ms, Some(2100));
    }

    #[tokio::test]
    async fn test_cost_falls_back_to_estimate() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"output": "s3://img.png"})),
            )
            .mount(&server)
            .await;

        let generator = HttpGenerator::new("http");
        let endpoint = format!("{}/run", server.uri());

        let output = generator.invoke(request(&endpoint)).await.unwrap();

        assert_eq!(output.cost, 0.025);
        assert_eq!(output.elapsed_ms, None);
    }

    #[tokio::test]
    async fn test_error_status_classification() {
        let cases = [
            (429, "retryable"),
            (503, "retryable"),
            (400, "invalid"),
            (422, "invalid"),
            (401, "fatal"),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;

            let generator = HttpGenerator::new("http").with_base_url(server.uri());
            let err = generator.invoke(request("run")).await.unwrap_err();

            let actual = match err {
                GeneratorError::Retryable(_) => "retryable",
                GeneratorError::InvalidInput(_) => "invalid",
                GeneratorError::Fatal(_) => "fatal",
            };
            assert_eq!(actual, expected, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_malformed_response_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new("http").with_base_url(server.uri());
        let err = generator.invoke(request("run")).await.unwrap_err();

        assert!(matches!(err, GeneratorError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_relative_endpoint_without_base_url() {
        let err = HttpGenerator::new("http")
            .invoke(request("fal-ai/flux/dev"))
            .await
            .unwrap_err();

        assert!(matches!(err, GeneratorError::Fatal(msg) if msg.contains("no base URL")));
    }
}
