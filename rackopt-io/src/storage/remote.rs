//! S3 object storage
//!
//! PutObject returns no object URL, so `location` is derived from the
//! addressing in use: virtual-hosted AWS URLs by default, path-style URLs for
//! dotted bucket names and for custom endpoints.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use rackopt_core::domain::storage::UploadResult;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{StorageBackend, StorageError};

/// Credential variables that must be present before a client is built
pub const CREDENTIAL_VARS: [&str; 2] = ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"];

/// S3-backed bucket
#[derive(Debug, Clone)]
pub struct RemoteStorage {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl RemoteStorage {
    /// Builds an S3 client for `bucket` in `region`
    ///
    /// A custom `endpoint` (MinIO, localstack and the like) switches the
    /// client to path-style addressing. Fails if credentials are absent from
    /// the process environment.
    pub async fn new(
        region: &str,
        bucket: &str,
        endpoint: Option<&str>,
    ) -> Result<Self, StorageError> {
        verify_credentials(|key| std::env::var(key).ok())?;

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            config = config.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self::from_client(
            Client::from_conf(config.build()),
            region,
            bucket,
            endpoint,
        ))
    }

    /// Wraps an already configured client
    ///
    /// `endpoint` must match the client's endpoint override, if any; it is
    /// used only to build object locations.
    pub fn from_client(client: Client, region: &str, bucket: &str, endpoint: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            region: region.to_string(),
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
        }
    }

    /// Public URL of an object in this bucket
    pub fn location(&self, key: &str) -> String {
        object_location(self.endpoint.as_deref(), &self.bucket, &self.region, key)
    }
}

#[async_trait]
impl StorageBackend for RemoteStorage {
    async fn download_file(&self, dir: &Path, name: &str) -> Result<(), StorageError> {
        let path = dir.join(name);
        debug!("Downloading file '{}' from s3...", name);

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                remote_error(
                    format!("unable to download '{}' from bucket '{}'", name, self.bucket),
                    e,
                )
            })?;

        debug!("Creating file '{}'...", path.display());
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StorageError::io(format!("failed to create file '{}'", path.display()), e))?;

        let mut body = object.body.into_async_read();
        let copied = match tokio::io::copy(&mut body, &mut file).await {
            Ok(size) => file.flush().await.map(|_| size),
            Err(e) => Err(e),
        };

        match copied {
            Ok(size) => {
                debug!("Downloaded file size: {}", size);
                Ok(())
            }
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                Err(StorageError::io(
                    format!("unable to write '{}' from bucket '{}'", name, self.bucket),
                    e,
                ))
            }
        }
    }

    async fn upload_file(&self, dir: &Path, name: &str) -> Result<UploadResult, StorageError> {
        let path = dir.join(name);
        debug!("Opening file '{}'...", path.display());

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StorageError::io(format!("failed to open file '{}'", path.display()), e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotARegularFile(path));
        }

        let body = ByteStream::from_path(&path).await.map_err(|e| {
            remote_error(format!("failed to read file '{}'", path.display()), e)
        })?;

        debug!("Uploading file '{}' to s3...", name);
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                remote_error(
                    format!(
                        "unable to upload local file '{}' to bucket '{}'",
                        path.display(),
                        self.bucket
                    ),
                    e,
                )
            })?;

        let etag = output.e_tag().unwrap_or_default().to_string();
        let location = self.location(name);
        debug!("Upload successful, location: {}, ETag: {}", location, etag);

        Ok(UploadResult {
            filename: name.to_string(),
            location,
            etag,
        })
    }
}

/// Checks that every credential variable is set and non-empty
pub fn verify_credentials<F>(lookup: F) -> Result<(), StorageError>
where
    F: Fn(&str) -> Option<String>,
{
    for key in CREDENTIAL_VARS {
        match lookup(key) {
            Some(value) if !value.is_empty() => {}
            _ => return Err(StorageError::MissingCredential(key)),
        }
    }
    Ok(())
}

fn object_location(endpoint: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint, bucket, key),
        None if bucket.contains('.') => {
            format!("https://s3.{}.amazonaws.com/{}/{}", region, bucket, key)
        }
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

fn remote_error<E: std::error::Error>(context: String, err: E) -> StorageError {
    StorageError::Remote {
        context,
        message: DisplayErrorContext(&err).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_credentials() {
        let empty: HashMap<&str, String> = HashMap::new();
        assert!(matches!(
            verify_credentials(|k| empty.get(k).cloned()),
            Err(StorageError::MissingCredential("AWS_ACCESS_KEY_ID"))
        ));

        let partial = HashMap::from([("AWS_ACCESS_KEY_ID", "1".to_string())]);
        assert!(matches!(
            verify_credentials(|k| partial.get(k).cloned()),
            Err(StorageError::MissingCredential("AWS_SECRET_ACCESS_KEY"))
        ));

        let blank = HashMap::from([
            ("AWS_ACCESS_KEY_ID", "1".to_string()),
            ("AWS_SECRET_ACCESS_KEY", String::new()),
        ]);
        assert!(verify_credentials(|k| blank.get(k).cloned()).is_err());
    }

    #[test]
    fn test_credentials_present() {
        let full = HashMap::from([
            ("AWS_ACCESS_KEY_ID", "1".to_string()),
            ("AWS_SECRET_ACCESS_KEY", "2".to_string()),
        ]);
        assert!(verify_credentials(|k| full.get(k).cloned()).is_ok());
    }

    #[test]
    fn test_location_format() {
        assert_eq!(
            object_location(None, "results", "eu-central-1", "opt_result_1.tar.gz"),
            "https://results.s3.eu-central-1.amazonaws.com/opt_result_1.tar.gz"
        );
        assert_eq!(
            object_location(None, "results.example.com", "eu-central-1", "a.tar.gz"),
            "https://s3.eu-central-1.amazonaws.com/results.example.com/a.tar.gz"
        );
        assert_eq!(
            object_location(Some("http://minio:9000"), "results", "us-east-1", "a.tar.gz"),
            "http://minio:9000/results/a.tar.gz"
        );
    }

    mod transfer {
        use super::super::*;
        use aws_sdk_s3::config::retry::RetryConfig;
        use aws_sdk_s3::config::{
            Credentials, RequestChecksumCalculation, ResponseChecksumValidation,
        };
        use axum::{
            Router,
            body::Bytes,
            extract::{Path as UrlPath, State},
            http::{StatusCode, header},
            response::{IntoResponse, Response},
            routing::get,
        };
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};
        use tempfile::TempDir;
        use tokio::io::AsyncReadExt;

        const ETAG: &str = "\"9b2cf535f27731c974343645a3985328\"";
        const NO_SUCH_KEY: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
            <Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message>\
            <RequestId>1</RequestId></Error>";
        const ACCESS_DENIED: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
            <Error><Code>AccessDenied</Code><Message>Access Denied</Message>\
            <RequestId>2</RequestId></Error>";

        /// Path-style S3 stand-in keeping objects in memory
        #[derive(Clone, Default)]
        struct FakeS3 {
            objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
            read_only: bool,
        }

        async fn get_object(
            State(s3): State<FakeS3>,
            UrlPath((bucket, key)): UrlPath<(String, String)>,
        ) -> Response {
            let object = s3
                .objects
                .lock()
                .unwrap()
                .get(&format!("{}/{}", bucket, key))
                .cloned();
            match object {
                Some(body) => (StatusCode::OK, [(header::ETAG, ETAG)], body).into_response(),
                None => (
                    StatusCode::NOT_FOUND,
                    [(header::CONTENT_TYPE, "application/xml")],
                    NO_SUCH_KEY,
                )
                    .into_response(),
            }
        }

        async fn put_object(
            State(s3): State<FakeS3>,
            UrlPath((bucket, key)): UrlPath<(String, String)>,
            body: Bytes,
        ) -> Response {
            if s3.read_only {
                return (
                    StatusCode::FORBIDDEN,
                    [(header::CONTENT_TYPE, "application/xml")],
                    ACCESS_DENIED,
                )
                    .into_response();
            }
            s3.objects
                .lock()
                .unwrap()
                .insert(format!("{}/{}", bucket, key), body.to_vec());
            (StatusCode::OK, [(header::ETAG, ETAG)]).into_response()
        }

        async fn serve(s3: FakeS3) -> String {
            let app = Router::new()
                .route("/{bucket}/{key}", get(get_object).put(put_object))
                .with_state(s3);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let endpoint = format!("http://{}", listener.local_addr().unwrap());
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });
            endpoint
        }

        fn storage(endpoint: &str) -> RemoteStorage {
            let config = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .credentials_provider(Credentials::new("key", "secret", None, None, "tests"))
                .endpoint_url(endpoint)
                .force_path_style(true)
                .retry_config(RetryConfig::disabled())
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
                .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
                .build();
            RemoteStorage::from_client(
                Client::from_conf(config),
                "us-east-1",
                "bucket",
                Some(endpoint),
            )
        }

        #[tokio::test]
        async fn test_upload_reports_provider_etag() {
            let s3 = FakeS3::default();
            let endpoint = serve(s3.clone()).await;
            let storage = storage(&endpoint);

            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("result.tar.gz"), b"archive bytes").unwrap();

            let results = storage
                .upload(dir.path(), &["result.tar.gz".to_string()])
                .await
                .unwrap();

            assert_eq!(results.len(), 1);
            assert_eq!(results[0].filename, "result.tar.gz");
            assert_eq!(results[0].etag, ETAG);
            assert_eq!(
                results[0].location,
                format!("{}/bucket/result.tar.gz", endpoint)
            );
            assert_eq!(
                s3.objects.lock().unwrap().get("bucket/result.tar.gz").unwrap(),
                b"archive bytes"
            );
        }

        #[tokio::test]
        async fn test_download_writes_object_bytes() {
            let s3 = FakeS3::default();
            s3.objects
                .lock()
                .unwrap()
                .insert("bucket/input.tar.gz".to_string(), b"input bytes".to_vec());
            let storage = storage(&serve(s3).await);

            let dir = TempDir::new().unwrap();
            storage
                .download(dir.path(), &["input.tar.gz".to_string()])
                .await
                .unwrap();

            assert_eq!(
                std::fs::read(dir.path().join("input.tar.gz")).unwrap(),
                b"input bytes"
            );
        }

        #[tokio::test]
        async fn test_missing_object_is_remote_error() {
            let storage = storage(&serve(FakeS3::default()).await);
            let dir = TempDir::new().unwrap();

            let err = storage
                .download(dir.path(), &["missing.tar.gz".to_string()])
                .await
                .unwrap_err();

            assert!(matches!(err, StorageError::Remote { .. }));
            assert!(!dir.path().join("missing.tar.gz").exists());
        }

        #[tokio::test]
        async fn test_rejected_upload_is_remote_error() {
            let s3 = FakeS3 {
                read_only: true,
                ..FakeS3::default()
            };
            let storage = storage(&serve(s3.clone()).await);

            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("result.tar.gz"), b"archive bytes").unwrap();

            let err = storage
                .upload(dir.path(), &["result.tar.gz".to_string()])
                .await
                .unwrap_err();

            assert!(matches!(err, StorageError::Remote { .. }));
            assert!(s3.objects.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_upload_of_missing_file_sends_nothing() {
            let s3 = FakeS3::default();
            let storage = storage(&serve(s3.clone()).await);
            let dir = TempDir::new().unwrap();

            let err = storage
                .upload(dir.path(), &["absent.tar.gz".to_string()])
                .await
                .unwrap_err();

            assert!(matches!(err, StorageError::Io { .. }));
            assert!(s3.objects.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_truncated_body_removes_partial_file() {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let endpoint = format!("http://{}", listener.local_addr().unwrap());
            tokio::spawn(async move {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\
                          Content-Type: application/octet-stream\r\n\r\npartial",
                    )
                    .await;
                let _ = socket.shutdown().await;
            });

            let storage = storage(&endpoint);
            let dir = TempDir::new().unwrap();

            let err = storage
                .download(dir.path(), &["input.tar.gz".to_string()])
                .await
                .unwrap_err();

            assert!(matches!(err, StorageError::Io { .. }));
            assert!(!dir.path().join("input.tar.gz").exists());
        }
    }
}
