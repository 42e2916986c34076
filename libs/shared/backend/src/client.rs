use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE},
    Method, Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::{ApiError, Session};

/// JSON client for the clinic REST backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_headers(&self, session: &Session) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if !session.is_anonymous() {
            match HeaderValue::from_str(session.cookie_header()) {
                Ok(value) => {
                    headers.insert(COOKIE, value);
                }
                Err(_) => warn!("Session cookie contains invalid header characters, sending request without it"),
            }
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            session: &Session, body: Option<Value>)
                            -> Result<T, ApiError>
    where T: DeserializeOwned {
        self.request_with_query(method, path, session, &[], body).await
    }

    pub async fn request_with_query<T>(&self, method: Method, path: &str,
                                       session: &Session, query: &[(&str, String)],
                                       body: Option<Value>)
                                       -> Result<T, ApiError>
    where T: DeserializeOwned {
        let response = self.send(method, path, session, query, body).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// For endpoints that answer with an empty body (e.g. `204 No Content`).
    pub async fn request_empty(&self, method: Method, path: &str,
                               session: &Session, body: Option<Value>)
                               -> Result<(), ApiError> {
        self.send(method, path, session, &[], body).await?;
        Ok(())
    }

    async fn send(&self, method: Method, path: &str, session: &Session,
                  query: &[(&str, String)], body: Option<Value>)
                  -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url)
            .headers(self.get_headers(session));

        if !query.is_empty() {
            req = req.query(query);
        }

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(ApiError::from_response(status, &error_text));
        }

        Ok(response)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
