use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::{
    ArtifactId, BlobStore, MetadataStore, NewArtifactRecord, StoreError, StoredArtifactRecord,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const RECORD_COLUMNS: &str = "id,url,user_id,created_at";

#[derive(Debug, Clone)]
pub enum SupabaseAuth {
    ServiceRoleKey(String),
    AnonKey(String),
}

impl SupabaseAuth {
    pub fn from_env() -> Option<Self> {
        if let Ok(key) = std::env::var("SUPABASE_SERVICE_ROLE_KEY") {
            if !key.is_empty() {
                return Some(Self::ServiceRoleKey(key));
            }
        }

        if let Ok(key) = std::env::var("SUPABASE_ANON_KEY") {
            if !key.is_empty() {
                return Some(Self::AnonKey(key));
            }
        }

        None
    }

    fn key(&self) -> &str {
        match self {
            SupabaseAuth::ServiceRoleKey(key) | SupabaseAuth::AnonKey(key) => key,
        }
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", self.key()).bearer_auth(self.key())
    }
}

/// Bucket and table the client writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseTarget {
    pub bucket: String,
    pub table: String,
}

impl Default for SupabaseTarget {
    fn default() -> Self {
        Self {
            bucket: "screenshots".to_string(),
            table: "screenshots".to_string(),
        }
    }
}

/// Supabase storage + PostgREST client implementing both store seams.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    auth: SupabaseAuth,
    base_url: Url,
    target: SupabaseTarget,
}

impl SupabaseClient {
    pub fn new(
        auth: SupabaseAuth,
        base_url: impl AsRef<str>,
        target: SupabaseTarget,
    ) -> Result<Self, StoreError> {
        Self::with_timeout(auth, base_url, target, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        auth: SupabaseAuth,
        base_url: impl AsRef<str>,
        target: SupabaseTarget,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url.as_ref())?;
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            auth,
            base_url,
            target,
        })
    }

    pub fn target(&self) -> &SupabaseTarget {
        &self.target
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        self.auth.apply(builder)
    }

    /// Appends `segments` to the base URL; keys containing `/` become
    /// multiple path segments.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    fn table_endpoint(&self) -> Result<Url, StoreError> {
        self.endpoint(["rest", "v1", self.target.table.as_str()])
    }

    async fn select_one(&self, mut url: Url) -> Result<Option<StoredArtifactRecord>, StoreError> {
        url.query_pairs_mut().append_pair("limit", "1");
        let rows: Vec<StoredArtifactRecord> = self.send_json(self.authed(self.http.get(url))).await?;
        Ok(rows.into_iter().next())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        Err(StoreError::api(
            Some(status),
            error_message(status, &body, retry_after.as_deref()),
        ))
    }
}

#[async_trait]
impl BlobStore for SupabaseClient {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let url = self.endpoint(["storage", "v1", "object", self.target.bucket.as_str(), key])?;
        log::debug!("Uploading {} bytes to {}", bytes.len(), url);

        let response = self
            .authed(self.http.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::api(Some(status), error_message(status, &body, None)))
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        self.endpoint([
            "storage",
            "v1",
            "object",
            "public",
            self.target.bucket.as_str(),
            key,
        ])
    }

    async fn fetch(&self, address: &Url) -> Result<Vec<u8>, StoreError> {
        let response = self.http.get(address.clone()).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(address.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::api(
            Some(status),
            format!(
                "failed to fetch blob (status {}): {}",
                status.as_u16(),
                error_message(status, &body, None)
            ),
        ))
    }
}

#[async_trait]
impl MetadataStore for SupabaseClient {
    async fn insert(&self, record: NewArtifactRecord) -> Result<StoredArtifactRecord, StoreError> {
        let mut url = self.table_endpoint()?;
        url.query_pairs_mut().append_pair("select", RECORD_COLUMNS);

        let request = self
            .authed(self.http.post(url))
            .header("Prefer", "return=representation")
            .json(&record);
        let rows: Vec<StoredArtifactRecord> = self.send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::api(None, "insert returned no rows"))
    }

    async fn latest(
        &self,
        owner: Option<&str>,
    ) -> Result<Option<StoredArtifactRecord>, StoreError> {
        let mut url = self.table_endpoint()?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("select", RECORD_COLUMNS)
                .append_pair("order", "created_at.desc");
            if let Some(owner) = owner {
                query.append_pair("user_id", &format!("eq.{owner}"));
            }
        }
        self.select_one(url).await
    }

    async fn find(&self, id: &ArtifactId) -> Result<Option<StoredArtifactRecord>, StoreError> {
        let mut url = self.table_endpoint()?;
        url.query_pairs_mut()
            .append_pair("select", RECORD_COLUMNS)
            .append_pair("id", &format!("eq.{id}"));
        self.select_one(url).await
    }
}

fn error_message(status: StatusCode, body: &str, retry_after: Option<&str>) -> String {
    let fallback = format!("Supabase returned status {}", status.as_u16());
    let parsed = serde_json::from_str::<Value>(body).ok();
    let from_body = parsed
        .as_ref()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .or_else(|| value.get("msg"))
        })
        .and_then(Value::as_str)
        .map(str::to_owned);

    match (status, retry_after, from_body) {
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), Some(msg)) => {
            format!("{msg} (rate limited, retry after {retry}s)")
        }
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), None) => {
            format!("rate limited by Supabase, retry after {retry}s")
        }
        (_, _, Some(msg)) => msg,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn client(base: &str) -> SupabaseClient {
        SupabaseClient::new(
            SupabaseAuth::AnonKey("anon".into()),
            base,
            SupabaseTarget::default(),
        )
        .unwrap()
    }

    #[test]
    fn auth_sets_apikey_and_bearer_headers() {
        let auth = SupabaseAuth::ServiceRoleKey("secret".into());
        let request = auth
            .apply(Client::new().get("https://proj.supabase.co/rest/v1/screenshots"))
            .build()
            .unwrap();
        let headers = request.headers();

        assert_eq!(headers.get("apikey").unwrap(), "secret");
        assert_eq!(
            headers.get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn public_url_keeps_key_segments() {
        let url = client("https://proj.supabase.co/")
            .public_url("screenshots/1700000000000000.png")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://proj.supabase.co/storage/v1/object/public/screenshots/screenshots/1700000000000000.png"
        );
    }

    #[test]
    fn endpoint_respects_base_path() {
        let url = client("http://127.0.0.1:54321/api").table_endpoint().unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:54321/api/rest/v1/screenshots");
    }

    #[test]
    fn error_message_prefers_body_message() {
        let msg = error_message(
            StatusCode::CONFLICT,
            r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#,
            None,
        );
        assert_eq!(msg, "The resource already exists");

        let msg = error_message(StatusCode::BAD_GATEWAY, "<html>", None);
        assert_eq!(msg, "Supabase returned status 502");

        let msg = error_message(StatusCode::TOO_MANY_REQUESTS, "", Some("3"));
        assert_eq!(msg, "rate limited by Supabase, retry after 3s");
    }

    #[test]
    fn auth_from_env_prefers_service_role_key() {
        let _guard = EnvGuard;
        env::set_var("SUPABASE_SERVICE_ROLE_KEY", "service");
        env::set_var("SUPABASE_ANON_KEY", "anon");

        match SupabaseAuth::from_env().expect("auth from env") {
            SupabaseAuth::ServiceRoleKey(key) => assert_eq!(key, "service"),
            other => panic!("expected service role key, got {other:?}"),
        }
    }

    struct EnvGuard;

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var("SUPABASE_SERVICE_ROLE_KEY");
            env::remove_var("SUPABASE_ANON_KEY");
        }
    }
}
