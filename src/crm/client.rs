use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde_json::Value;
use std::future::Future;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::ApiError;

use super::api_types::{ApiErrorBody, ApiList, ApiRecord, Page};
use super::cache::Cacheable;

/// One REST call, independent of how it is carried.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  /// Path segments below the base URL, e.g. `["invoices", "7", "paid"]`
  pub segments: Vec<String>,
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
}

impl ApiRequest {
  pub fn new<I, S>(method: Method, segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      method,
      segments: segments.into_iter().map(Into::into).collect(),
      query: Vec::new(),
      body: None,
    }
  }

  pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
    self.query = query;
    self
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  /// `/invoices/7/paid`, for logging.
  pub fn path(&self) -> String {
    format!("/{}", self.segments.join("/"))
  }
}

/// Carries requests to the backend.
///
/// Resolves to the decoded JSON body of a 2xx response (`Null` when empty),
/// or an [`ApiError`] carrying the status and the body's message.
pub trait Transport: Clone + Send + Sync + 'static {
  fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// Resolve `request` against `base`, keeping any path the base carries.
fn request_url(base: &Url, request: &ApiRequest) -> Result<Url, ApiError> {
  let mut url = base.clone();
  url
    .path_segments_mut()
    .map_err(|_| ApiError::Network(format!("{} cannot carry a path", base)))?
    .pop_if_empty()
    .extend(&request.segments);
  if !request.query.is_empty() {
    url.query_pairs_mut().extend_pairs(&request.query);
  }
  Ok(url)
}

/// Transport over HTTPS with an optional bearer token.
#[derive(Clone)]
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpTransport {
  pub fn new(config: &Config, token: Option<String>) -> Result<Self> {
    let base_url = Url::parse(&config.api.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.api.base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("API base URL {} cannot carry a path", base_url));
    }

    let mut builder = reqwest::Client::builder().user_agent(concat!(
      env!("CARGO_PKG_NAME"),
      "/",
      env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = config.api.timeout() {
      builder = builder.timeout(timeout);
    }
    let http = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token,
    })
  }
}

impl Transport for HttpTransport {
  fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value, ApiError>> + Send {
    let this = self.clone();
    async move {
      let url = request_url(&this.base_url, &request)?;
      debug!(method = %request.method, %url, "request");

      let mut builder = this.http.request(request.method.clone(), url);
      if let Some(token) = &this.token {
        builder = builder.bearer_auth(token);
      }
      if let Some(body) = &request.body {
        builder = builder.json(body);
      }

      let response = builder
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
      let status = response.status();
      let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

      if !status.is_success() {
        let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
          .ok()
          .and_then(ApiErrorBody::into_message);
        return Err(ApiError::from_status(status.as_u16(), message));
      }
      if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
      }
      Ok(serde_json::from_slice(&bytes)?)
    }
  }
}

/// Typed CRM API client.
#[derive(Clone)]
pub struct CrmClient<T = HttpTransport> {
  transport: T,
}

impl CrmClient<HttpTransport> {
  pub fn new(config: &Config) -> Result<Self> {
    let transport = HttpTransport::new(config, Config::get_api_token())?;
    Ok(Self { transport })
  }
}

impl<T: Transport> CrmClient<T> {
  pub fn with_transport(transport: T) -> Self {
    Self { transport }
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  /// Fetch one page of `E` with the given server query.
  pub async fn list<E: Cacheable>(&self, query: Vec<(String, String)>) -> Result<Page<E>, ApiError> {
    let request = ApiRequest::new(Method::GET, [E::entity_type().as_str()]).with_query(query);
    let list: ApiList<E> = serde_json::from_value(self.transport.send(request).await?)?;
    Ok(list.into())
  }

  pub async fn get<E: Cacheable>(&self, id: &str) -> Result<E, ApiError> {
    let request = ApiRequest::new(Method::GET, [E::entity_type().as_str(), id]);
    self.record(request).await
  }

  pub async fn create<E: Cacheable>(&self, input: &E::Input) -> Result<E, ApiError> {
    let request =
      ApiRequest::new(Method::POST, [E::entity_type().as_str()]).with_body(encode_body(input)?);
    self.record(request).await
  }

  pub async fn update<E: Cacheable>(&self, id: &str, input: &E::Input) -> Result<E, ApiError> {
    let request = ApiRequest::new(Method::PUT, [E::entity_type().as_str(), id])
      .with_body(encode_body(input)?);
    self.record(request).await
  }

  /// PATCH a state sub-resource such as `invoices/7/paid`.
  pub async fn transition<E: Cacheable>(&self, id: &str, action: &str) -> Result<E, ApiError> {
    let request = ApiRequest::new(Method::PATCH, [E::entity_type().as_str(), id, action]);
    self.record(request).await
  }

  pub async fn delete<E: Cacheable>(&self, id: &str) -> Result<(), ApiError> {
    let request = ApiRequest::new(Method::DELETE, [E::entity_type().as_str(), id]);
    self.transport.send(request).await?;
    Ok(())
  }

  async fn record<E: Cacheable>(&self, request: ApiRequest) -> Result<E, ApiError> {
    let record: ApiRecord<E> = serde_json::from_value(self.transport.send(request).await?)?;
    Ok(record.into_inner())
  }
}

fn encode_body(input: &impl serde::Serialize) -> Result<Value, ApiError> {
  serde_json::to_value(input).map_err(|e| ApiError::Decode(format!("cannot encode payload: {}", e)))
}
