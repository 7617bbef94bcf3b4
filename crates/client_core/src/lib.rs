use std::borrow::Cow;

use async_trait::async_trait;
use reqwest::{
    header::CONTENT_TYPE, Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{
    error::ApiError,
    protocol::{LoginRequest, LoginResponse},
};
use tracing::{debug, info, trace};
use url::Url;

pub mod error;
pub mod group;
pub mod listnode;
pub mod ontology;
pub mod project;
pub mod property_class;
pub mod resource_class;
pub mod retry;
pub mod tracked;
pub mod user;

pub use error::{DspError, Result};
pub use group::Group;
pub use listnode::ListNode;
pub use ontology::Ontology;
pub use project::Project;
pub use property_class::PropertyClass;
pub use resource_class::{HasProperty, PropertyType, ResourceClass};
pub use retry::{login_with_retry, with_retry, RetryPolicy};
pub use tracked::Tracked;
pub use user::User;

pub const DEFAULT_SERVER: &str = "http://0.0.0.0:3333";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
pub const JSONLD_CONTENT_TYPE: &str = "application/ld+json";

/// Named graphs loaded by `reset_triplestore_content` on a development server.
const TRIPLESTORE_DEFAULTS: [(&str, &str); 8] = [
    ("./knora-ontologies/knora-admin.ttl", "http://www.knora.org/ontology/knora-admin"),
    ("./knora-ontologies/knora-base.ttl", "http://www.knora.org/ontology/knora-base"),
    ("./knora-ontologies/standoff-onto.ttl", "http://www.knora.org/ontology/standoff"),
    ("./knora-ontologies/standoff-data.ttl", "http://www.knora.org/data/standoff"),
    ("./knora-ontologies/salsah-gui.ttl", "http://www.knora.org/ontology/salsah-gui"),
    ("./_test_data/all_data/admin-data.ttl", "http://www.knora.org/data/admin"),
    ("./_test_data/all_data/permissions-data.ttl", "http://www.knora.org/data/permissions"),
    ("./_test_data/all_data/system-data.ttl", "http://www.knora.org/data/0000/SystemProject"),
];

/// Raw JSON access to the DSP API. Models talk to the server only through
/// this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value>;

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value>;

    async fn put(&self, path: &str, body: Option<&Value>, content_type: Option<&str>)
        -> Result<Value>;

    async fn delete(&self, path: &str, params: &[(&str, String)]) -> Result<Value>;
}

/// HTTP connection to one DSP server, holding the session token after login.
#[derive(Debug, Clone)]
pub struct Connection {
    http: Client,
    server_url: String,
    token: Option<String>,
}

impl Connection {
    pub fn new(server_url: impl Into<String>) -> Result<Self> {
        let server_url = server_url.into();
        Url::parse(&server_url)?;
        Ok(Self {
            http: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<()> {
        let body = serde_json::to_value(LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let answer = self.post("/v2/authentication", Some(&body)).await?;
        let login: LoginResponse =
            serde_json::from_value(answer).map_err(|_| DspError::missing("token"))?;
        self.token = Some(login.token);
        info!(server = %self.server_url, email, "logged in");
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<()> {
        if self.token.is_some() {
            self.delete("/v2/authentication", &[]).await?;
            info!(server = %self.server_url, "logged out");
        }
        self.token = None;
        Ok(())
    }

    /// Replaces the triplestore content with the default graphs. Only
    /// development servers accept this.
    pub async fn reset_triplestore_content(&self) -> Result<Value> {
        let graphs: Vec<Value> = TRIPLESTORE_DEFAULTS
            .iter()
            .map(|(path, name)| json!({ "path": path, "name": name }))
            .collect();
        let answer = self
            .post(
                "/admin/store/ResetTriplestoreContent?prependdefaults=false",
                Some(&Value::Array(graphs)),
            )
            .await?;
        info!(server = %self.server_url, "triplestore content reset");
        Ok(answer)
    }

    fn request(&self, method: Method, route: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{route}", self.server_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn dispatch(&self, method: Method, route: &str, builder: RequestBuilder) -> Result<Value> {
        debug!(%method, route, "DSP request");
        let response = builder.send().await?;
        on_api_error(&method, route, response).await
    }
}

#[async_trait]
impl Transport for Connection {
    async fn get(&self, path: &str) -> Result<Value> {
        let route = route(path);
        let builder = self.request(Method::GET, &route);
        self.dispatch(Method::GET, &route, builder).await
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        let route = route(path);
        let builder = with_body(self.request(Method::POST, &route), body, JSON_CONTENT_TYPE)?;
        self.dispatch(Method::POST, &route, builder).await
    }

    async fn put(
        &self,
        path: &str,
        body: Option<&Value>,
        content_type: Option<&str>,
    ) -> Result<Value> {
        let route = route(path);
        let builder = with_body(
            self.request(Method::PUT, &route),
            body,
            content_type.unwrap_or(JSON_CONTENT_TYPE),
        )?;
        self.dispatch(Method::PUT, &route, builder).await
    }

    async fn delete(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let route = route(path);
        let mut builder = self.request(Method::DELETE, &route);
        if !params.is_empty() {
            builder = builder.query(params);
        }
        self.dispatch(Method::DELETE, &route, builder).await
    }
}

fn route(path: &str) -> Cow<'_, str> {
    if path.starts_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{path}"))
    }
}

fn with_body(
    builder: RequestBuilder,
    body: Option<&Value>,
    content_type: &str,
) -> Result<RequestBuilder> {
    match body {
        Some(body) => {
            trace!(%body, "DSP request body");
            Ok(builder
                .header(CONTENT_TYPE, content_type)
                .body(serde_json::to_vec(body)?))
        }
        None => Ok(builder),
    }
}

/// Anything but `200 OK`, or a body with an `error` member, is an API error.
async fn on_api_error(method: &Method, route: &str, response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    debug!(%method, route, status = status.as_u16(), "DSP response");
    trace!(route, body = %text, "DSP response body");
    if status != StatusCode::OK {
        return Err(ApiError::from_response(status.as_u16(), &text).into());
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let body: Value = serde_json::from_str(&text)?;
    if body.get("error").is_some() {
        return Err(ApiError::from_response(status.as_u16(), &text).into());
    }
    Ok(body)
}

/// Percent-encodes an IRI for use as a single path segment or query value.
pub(crate) fn encode(iri: &str) -> String {
    url::form_urlencoded::byte_serialize(iri.as_bytes()).collect()
}

/// Moves `key` out of a server answer and deserializes it.
pub(crate) fn take_field<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<T> {
    let value = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| DspError::missing(key))?;
    parse_record(value)
}

/// Deserializes a server record. An absent mandatory member is reported as
/// `MissingField` with its wire name.
pub(crate) fn parse_record<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| {
        let message = err.to_string();
        match message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split_once('`'))
        {
            Some((field, _)) => DspError::missing(field),
            None => DspError::Json(err),
        }
    })
}

#[cfg(test)]
#[path = "tests/test_support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
