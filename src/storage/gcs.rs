//! Google Cloud Storage provider using the JSON API.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;

use super::{ObjectReader, StorageError, StorageFuture, StorageProvider};

/// Identifier apps use to select this provider.
pub const GCS_PROVIDER_ID: &str = "gcs";

/// Public endpoint of the JSON API.
pub const DEFAULT_GCS_API_URL: &str = "https://storage.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

/// Lists and downloads objects from Google Cloud Storage buckets.
#[derive(Clone, Debug)]
pub struct GcsStorage {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

impl GcsStorage {
    /// Creates a provider talking to `api_url`. `token` is sent as a bearer
    /// token when present; public buckets need none.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Request`] when the URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let parsed = Url::parse(api_url).map_err(|err| request_error("configure", err))?;
        let client =
            crate::http::client(timeout).map_err(|err| request_error("configure", err))?;
        Ok(Self {
            client,
            api_url: parsed,
            token,
        })
    }

    fn objects_url(&self, bucket: &str) -> Result<Url, StorageError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| request_error("build url", "API URL cannot be a base"))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o"]);
        Ok(url)
    }

    fn authorise(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ObjectList, StorageError> {
        let mut url = self.objects_url(bucket)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", prefix);
            query.append_pair("fields", "items(name),nextPageToken");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self
            .authorise(self.client.get(url))
            .send()
            .await
            .map_err(|err| request_error("list objects", err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error("list objects", status));
        }
        response
            .json::<ObjectList>()
            .await
            .map_err(|err| StorageError::Decode {
                provider: String::from(GCS_PROVIDER_ID),
                message: err.to_string(),
            })
    }

    async fn list_all(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(bucket, prefix, page_token.as_deref()).await?;
            keys.extend(page.items.into_iter().map(|entry| entry.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn fetch(&self, bucket: &str, key: &str) -> Result<ObjectReader, StorageError> {
        let mut url = self.objects_url(bucket)?;
        url.path_segments_mut()
            .map_err(|()| request_error("build url", "API URL cannot be a base"))?
            .push(key);
        url.query_pairs_mut().append_pair("alt", "media");

        let mut response = self
            .authorise(self.client.get(url))
            .send()
            .await
            .map_err(|err| request_error("get object", err))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(status_error("get object", status));
        }

        // Archives can be large, so the body is spooled to disk chunk by chunk.
        let spool_error = |err: std::io::Error| StorageError::Io {
            path: format!("download spool for {bucket}/{key}"),
            message: err.to_string(),
        };
        let mut spool: File = tempfile::tempfile().map_err(spool_error)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| request_error("read object body", err))?
        {
            spool.write_all(&chunk).map_err(spool_error)?;
        }
        spool.seek(SeekFrom::Start(0)).map_err(spool_error)?;
        Ok(Box::new(spool))
    }
}

impl StorageProvider for GcsStorage {
    fn list_keys<'a>(&'a self, bucket: &'a str, prefix: &'a str) -> StorageFuture<'a, Vec<String>> {
        Box::pin(self.list_all(bucket, prefix))
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, ObjectReader> {
        Box::pin(self.fetch(bucket, key))
    }
}

fn request_error(operation: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Request {
        provider: String::from(GCS_PROVIDER_ID),
        operation: operation.to_owned(),
        message: err.to_string(),
    }
}

fn status_error(operation: &str, status: StatusCode) -> StorageError {
    StorageError::Status {
        provider: String::from(GCS_PROVIDER_ID),
        operation: operation.to_owned(),
        status: status.as_u16(),
    }
}
