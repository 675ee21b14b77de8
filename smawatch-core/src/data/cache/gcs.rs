//! Cloud Storage bucket backend (JSON API).
//!
//! Layout: `{bucket}/{prefix}{key}.json`, the same envelope the local
//! backend writes, so the timestamp travels inside the object. Each write
//! is a single media upload, which the store applies atomically.
//!
//! Auth is a bearer token supplied by configuration; minting it is left to
//! the deployment environment. The endpoint is configurable so the backend
//! can point at an emulator.

use super::{CacheBackend, CacheEntry};
use crate::data::provider::DataError;
use reqwest::blocking::RequestBuilder;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

/// Cache entries as objects in a Cloud Storage bucket.
pub struct GcsBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    bucket: String,
    prefix: String,
    token: Option<String>,
}

impl GcsBackend {
    pub fn new(bucket: impl Into<String>, timeout: std::time::Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::CacheBackend(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bucket: bucket.into(),
            prefix: String::new(),
            token: None,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Object name prefix, e.g. `"smawatch/"`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn object_name(&self, key: &str) -> String {
        format!("{}{key}.json", self.prefix)
    }

    fn build_url(&self, segments: &[&str]) -> Result<Url, DataError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            DataError::CacheBackend(format!("invalid storage endpoint '{}': {e}", self.endpoint))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                DataError::CacheBackend(format!("storage endpoint '{}' has no path", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments.iter());
        Ok(url)
    }

    /// `GET`/`DELETE` target for one object.
    fn object_url(&self, key: &str) -> Result<Url, DataError> {
        let name = self.object_name(key);
        self.build_url(&["storage", "v1", "b", &self.bucket, "o", &name])
    }

    fn upload_url(&self, key: &str) -> Result<Url, DataError> {
        let mut url = self.build_url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &self.object_name(key));
        Ok(url)
    }

    fn list_url(&self, page_token: Option<&str>) -> Result<Url, DataError> {
        let mut url = self.build_url(&["storage", "v1", "b", &self.bucket, "o"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("fields", "items(name),nextPageToken");
            if !self.prefix.is_empty() {
                query.append_pair("prefix", &self.prefix);
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send(&self, req: RequestBuilder, what: &str) -> Result<reqwest::blocking::Response, DataError> {
        self.authorize(req)
            .send()
            .map_err(|e| DataError::CacheBackend(format!("{what}: {e}")))
    }

    /// Map a non-success response to a `CacheBackend` error.
    fn status_error(&self, what: &str, status: StatusCode) -> DataError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DataError::CacheBackend(format!(
                "{what}: HTTP {status} (check the storage token and bucket '{}' permissions)",
                self.bucket
            )),
            _ => DataError::CacheBackend(format!("{what}: HTTP {status}")),
        }
    }
}

/// Turn object names from a listing back into cache keys.
fn keys_from_listing(prefix: &str, names: impl IntoIterator<Item = String>) -> Vec<String> {
    names
        .into_iter()
        .filter_map(|name| {
            name.strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .filter(|key| !key.is_empty() && !key.contains('/'))
                .map(String::from)
        })
        .collect()
}

impl CacheBackend for GcsBackend {
    fn name(&self) -> &str {
        "gcs"
    }

    fn read(&self, key: &str) -> Result<Option<CacheEntry>, DataError> {
        let mut url = self.object_url(key)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let what = format!("read gs://{}/{}", self.bucket, self.object_name(key));
        debug!(%url, "reading cache object");

        let resp = self.send(self.client.get(url), &what)?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.status_error(&what, status));
        }

        let body = resp
            .text()
            .map_err(|e| DataError::CacheBackend(format!("{what}: {e}")))?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| DataError::CacheBackend(format!("{what}: corrupt envelope: {e}")))
    }

    fn write(&self, entry: &CacheEntry) -> Result<(), DataError> {
        let url = self.upload_url(&entry.key)?;
        let what = format!("write gs://{}/{}", self.bucket, self.object_name(&entry.key));
        let body = serde_json::to_vec(entry)
            .map_err(|e| DataError::CacheBackend(format!("envelope serialization: {e}")))?;

        let req = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let resp = self.send(req, &what)?;
        if !resp.status().is_success() {
            return Err(self.status_error(&what, resp.status()));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DataError> {
        let url = self.object_url(key)?;
        let what = format!("delete gs://{}/{}", self.bucket, self.object_name(key));
        let resp = self.send(self.client.delete(url), &what)?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.status_error(&what, status))
        }
    }

    fn keys(&self) -> Result<Vec<String>, DataError> {
        let what = format!("list gs://{}/{}", self.bucket, self.prefix);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(page_token.as_deref())?;
            let resp = self.send(self.client.get(url), &what)?;
            if !resp.status().is_success() {
                return Err(self.status_error(&what, resp.status()));
            }
            let page: ObjectList = resp
                .json()
                .map_err(|e| DataError::CacheBackend(format!("{what}: bad listing: {e}")))?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        let mut keys = keys_from_listing(&self.prefix, names);
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn backend() -> GcsBackend {
        GcsBackend::new("sma-cache", Duration::from_secs(1))
            .unwrap()
            .with_prefix("smawatch/")
    }

    #[test]
    fn object_url_encodes_name_as_one_segment() {
        let url = backend().object_url("BRK.B").unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/sma-cache/o/smawatch%2FBRK.B.json"
        );
    }

    #[test]
    fn upload_url_carries_media_type_and_name() {
        let url = backend().upload_url("sp500_constituents").unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/upload/storage/v1/b/sma-cache/o?uploadType=media&name=smawatch%2Fsp500_constituents.json"
        );
    }

    #[test]
    fn custom_endpoint_with_trailing_slash() {
        let url = backend()
            .with_endpoint("http://localhost:4443/")
            .object_url("AAPL")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:4443/storage/v1/b/sma-cache/o/smawatch%2FAAPL.json"
        );
    }

    #[test]
    fn list_url_includes_prefix_and_page_token() {
        let url = backend().list_url(Some("abc")).unwrap();
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("prefix".into(), "smawatch/".into())));
        assert!(query.contains(&("pageToken".into(), "abc".into())));
    }

    #[test]
    fn invalid_endpoint_is_backend_error() {
        let err = backend().with_endpoint("not a url").object_url("A").unwrap_err();
        assert!(matches!(err, DataError::CacheBackend(_)));
    }

    #[test]
    fn listing_names_map_back_to_keys() {
        let keys = keys_from_listing(
            "smawatch/",
            vec![
                "smawatch/AAPL.json".to_string(),
                "smawatch/sp500_constituents.json".to_string(),
                "smawatch/nested/X.json".to_string(),
                "other/MSFT.json".to_string(),
                "smawatch/notes.txt".to_string(),
            ],
        );
        assert_eq!(keys, vec!["AAPL", "sp500_constituents"]);
    }

    #[test]
    fn forbidden_status_mentions_credentials() {
        let err = backend().status_error("read x", StatusCode::FORBIDDEN);
        assert!(err.to_string().contains("check the storage token"));
    }
}
