//! Upload API Handler
//!
//! Receives the user's files, packs them into one archive, places the archive
//! in the bucket and forwards its name to the worker. Each step is timed
//! as a stage.

use axum::{
    Json,
    extract::{
        State,
        multipart::{Multipart, MultipartRejection},
    },
};
use rackopt_core::dto::upload::UploadResponse;
use rackopt_io::{EnvironmentProvider, Metrics, timestamped_name};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::AppState;
use super::error::{ApiError, ApiResult};

const ENV_PREFIX: &str = "tmp_uploaded_";
const INPUT_PREFIX: &str = "input_files";
const FILE_FIELD: &str = "file";

/// POST /api/v1/upload
/// Upload files and run an optimization over them
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let multipart = multipart.map_err(ApiError::NotMultipart)?;

    let mut env = EnvironmentProvider::new(&state.env_base_dir, ENV_PREFIX);
    let outcome = process(&state, &mut env, multipart).await;

    if let Err(e) = env.cleanup() {
        warn!("Failed to cleanup upload environment: {}", e);
    }

    outcome.map(Json)
}

async fn process(
    state: &AppState,
    env: &mut EnvironmentProvider,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let dir = env
        .create()
        .map_err(|e| ApiError::InternalError(format!("error creating tempdir: {}", e)))?
        .to_path_buf();

    let filenames = timed(&state.metrics, "receive", async {
        let filenames = receive_files(&dir, &mut multipart).await?;
        if filenames.is_empty() {
            return Err(ApiError::NoFiles);
        }
        Ok::<_, ApiError>(filenames)
    })
    .await?;

    debug!("Adding files to archive: {:?}", filenames);
    let archive_path = timed(
        &state.metrics,
        "compress",
        state
            .archive
            .compress(&dir.join(timestamped_name(INPUT_PREFIX)), &dir, &filenames),
    )
    .await
    .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let archive_name = archive_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ApiError::InternalError("archive path has no file name".to_string()))?;

    let names = [archive_name.clone()];
    timed(&state.metrics, "upload", state.storage.upload(&dir, &names)).await?;

    debug!("Forwarding '{}' to the worker", archive_name);
    let result = timed(
        &state.metrics,
        "optimize",
        state.worker.optimize(&archive_name),
    )
    .await?;
    info!(
        "Optimization of '{}' finished in {} ms, result at {}",
        archive_name, result.execution_time, result.location
    );

    Ok(result.into())
}

/// Awaits `work`, recording its duration and any failure under `stage`
async fn timed<T, E, F>(metrics: &Metrics, stage: &str, work: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let outcome = work.await;
    metrics.observe_stage(stage, started.elapsed());
    if outcome.is_err() {
        metrics.record_failure(stage);
    }
    outcome
}

/// Writes every `file` field into `dir`, returning the stored names in order
async fn receive_files(dir: &Path, multipart: &mut Multipart) -> ApiResult<Vec<String>> {
    let mut filenames: Vec<String> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let raw = field.file_name().unwrap_or_default().to_string();
        let Some(filename) = sanitize_file_name(&raw) else {
            return Err(ApiError::InvalidFileName(raw));
        };

        let data = field.bytes().await?;
        debug!("Received file '{}', size: {}", filename, data.len());

        let path = dir.join(&filename);
        tokio::fs::write(&path, &data).await.map_err(|e| {
            ApiError::InternalError(format!("error writing '{}': {}", path.display(), e))
        })?;

        if !filenames.contains(&filename) {
            filenames.push(filename);
        }
    }

    Ok(filenames)
}

/// Final path component of a client-supplied name
fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::post,
    };
    use http_body_util::BodyExt;
    use rackopt_client::OptimizationClient;
    use rackopt_core::dto::optimization::{OptimizationRequest, OptimizationResponse};
    use rackopt_io::ArchiveCodec;
    use rackopt_io::storage::LocalStorage;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "rackopt-test-boundary";

    struct Fixture {
        bucket: TempDir,
        envs: TempDir,
        requested: Arc<Mutex<Vec<String>>>,
        worker_url: String,
        metrics: Metrics,
    }

    impl Fixture {
        /// Starts a fake worker that answers every job with `status`
        async fn new(status: StatusCode) -> Self {
            let requested = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&requested);

            let worker = Router::new().route(
                "/api/v1/optimize",
                post(move |Json(req): Json<OptimizationRequest>| {
                    let seen = Arc::clone(&seen);
                    async move {
                        seen.lock().unwrap().push(req.filename.clone());
                        let body = OptimizationResponse {
                            filename: format!("opt_{}", req.filename),
                            location: "bucket/result".to_string(),
                            etag: "etag".to_string(),
                            execution_time: 7,
                        };
                        if status.is_success() {
                            (status, Json(serde_json::to_value(body).unwrap()))
                        } else {
                            (status, Json(serde_json::json!({ "text": "script error" })))
                        }
                    }
                }),
            );

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let worker_url = format!("http://{}", listener.local_addr().unwrap());
            tokio::spawn(async move {
                let _ = axum::serve(listener, worker).await;
            });

            Self {
                bucket: TempDir::new().unwrap(),
                envs: TempDir::new().unwrap(),
                requested,
                worker_url,
                metrics: Metrics::new().unwrap(),
            }
        }

        fn app(&self) -> Router {
            let state = AppState {
                storage: Arc::new(LocalStorage::new(self.bucket.path()).unwrap()),
                worker: OptimizationClient::new(&self.worker_url),
                archive: ArchiveCodec::default(),
                env_base_dir: self.envs.path().to_path_buf(),
                metrics: self.metrics.clone(),
            };
            create_router(state, 1024 * 1024)
        }

        /// Value of the `family` sample labelled with `stage`
        fn stage_sample(&self, family: &str, stage: &str) -> Option<String> {
            let label = format!("{{stage=\"{}\"}}", stage);
            self.metrics
                .render()
                .unwrap()
                .lines()
                .find(|l| l.starts_with(family) && l.contains(&label))
                .and_then(|l| l.rsplit(' ').next())
                .map(str::to_string)
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }

        fn assert_no_environments(&self) {
            let left = std::fs::read_dir(self.envs.path()).unwrap().count();
            assert_eq!(left, 0, "upload environments were not removed");
        }
    }

    fn multipart_body(parts: &[(&str, &str, &str)]) -> String {
        let mut body = String::new();
        for (field, filename, content) in parts {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    async fn send(app: Router, body: String) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_upload_forwards_archive() {
        let fixture = Fixture::new(StatusCode::OK).await;
        let body = multipart_body(&[
            ("file", "file1.csv", "value\n1\n"),
            ("file", "nested/file2.csv", "value\n2\n"),
        ]);

        let (status, body) = send(fixture.app(), body).await;
        assert_eq!(status, StatusCode::OK);

        let requested = fixture.requested();
        assert_eq!(requested.len(), 1);
        let archive = &requested[0];
        assert!(archive.starts_with("input_files_"));
        assert!(archive.ends_with(".tar.gz"));

        let response: UploadResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(
            response,
            UploadResponse {
                filename: format!("opt_{}", archive),
                location: "bucket/result".to_string(),
                etag: "etag".to_string(),
            }
        );

        let unpacked = TempDir::new().unwrap();
        ArchiveCodec::default()
            .decompress(&fixture.bucket.path().join(archive), unpacked.path())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(unpacked.path().join("file1.csv")).unwrap(),
            "value\n1\n"
        );
        assert_eq!(
            std::fs::read_to_string(unpacked.path().join("file2.csv")).unwrap(),
            "value\n2\n"
        );

        fixture.assert_no_environments();
    }

    #[tokio::test]
    async fn test_upload_without_files() {
        let fixture = Fixture::new(StatusCode::OK).await;
        let body = multipart_body(&[("comment", "notes.txt", "ignored")]);

        let (status, body) = send(fixture.app(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"text":"no files were provided"}"#);
        assert!(fixture.requested().is_empty());
        fixture.assert_no_environments();
        assert_eq!(
            fixture.stage_sample("stage_failures_total", "receive").as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_file_name() {
        let fixture = Fixture::new(StatusCode::OK).await;
        let body = multipart_body(&[("file", "../", "x")]);

        let (status, _) = send(fixture.app(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(fixture.requested().is_empty());
        fixture.assert_no_environments();
    }

    #[tokio::test]
    async fn test_worker_failure_is_bad_gateway() {
        let fixture = Fixture::new(StatusCode::INTERNAL_SERVER_ERROR).await;
        let body = multipart_body(&[("file", "file1.csv", "value\n1\n")]);

        let (status, body) = send(fixture.app(), body).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, r#"{"text":"script execution error"}"#);
        assert_eq!(fixture.requested().len(), 1);
        fixture.assert_no_environments();

        for stage in ["receive", "compress", "upload", "optimize"] {
            assert_eq!(
                fixture
                    .stage_sample("stage_duration_seconds_count", stage)
                    .as_deref(),
                Some("1"),
                "stage {} was not timed",
                stage
            );
        }
        assert_eq!(
            fixture.stage_sample("stage_failures_total", "optimize").as_deref(),
            Some("1")
        );
        assert_eq!(fixture.stage_sample("stage_failures_total", "upload"), None);
    }

    #[tokio::test]
    async fn test_non_multipart_request() {
        let fixture = Fixture::new(StatusCode::OK).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/upload")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = fixture.app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        fixture.assert_no_environments();
    }

    #[tokio::test]
    async fn test_health() {
        let fixture = Fixture::new(StatusCode::OK).await;
        let request = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();

        let response = fixture.app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"health":true}"#);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("data.csv").as_deref(), Some("data.csv"));
        assert_eq!(sanitize_file_name("a/b/data.csv").as_deref(), Some("data.csv"));
        assert_eq!(sanitize_file_name("C:\\tmp\\data.csv").as_deref(), Some("data.csv"));
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("../"), None);
        assert_eq!(sanitize_file_name(".."), None);
    }
}
