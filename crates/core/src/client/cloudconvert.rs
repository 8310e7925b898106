//! CloudConvert conversion client.
//!
//! Each file becomes one CloudConvert job with three tasks: `import/upload`,
//! `convert` and `export/url`. The file is uploaded to the form returned for
//! the import task, then the job is polled until the export task exposes a
//! download URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CloudConvertConfig;
use super::error::ClientError;
use super::traits::{report_stage, ConversionClient};
use super::types::{stages, JobHandle, ResultReference};

const STAGES: [&str; 3] = [stages::UPLOADING, stages::PROCESSING, stages::FINALIZING];

const IMPORT_TASK: &str = "import-file";
const CONVERT_TASK: &str = "convert-file";
const EXPORT_TASK: &str = "export-file";

/// CloudConvert API v2 client.
pub struct CloudConvertClient {
    client: Client,
    config: CloudConvertConfig,
}

impl CloudConvertClient {
    /// Create a new CloudConvert client.
    pub fn new(config: CloudConvertConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    /// Create the three-task job and return it.
    async fn create_job(&self, target_format: &str) -> Result<ApiJob, ClientError> {
        let url = format!("{}/v2/jobs", self.base_url());
        let body = json!({
            "tasks": {
                IMPORT_TASK: {
                    "operation": "import/upload"
                },
                CONVERT_TASK: {
                    "operation": "convert",
                    "input": IMPORT_TASK,
                    "output_format": target_format
                },
                EXPORT_TASK: {
                    "operation": "export/url",
                    "input": CONVERT_TASK
                }
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::submission(transport_reason(&e)))?;

        if !response.status().is_success() {
            return Err(ClientError::submission(rejection_reason(response).await));
        }

        let envelope: JobEnvelope = response
            .json()
            .await
            .map_err(|e| ClientError::submission(format!("Invalid job response: {}", e)))?;

        Ok(envelope.data)
    }

    /// Upload the file contents to the import task's upload form.
    async fn upload(
        &self,
        form: &UploadForm,
        bytes: Vec<u8>,
        source_name: &str,
    ) -> Result<(), ClientError> {
        let mut multipart_form = multipart::Form::new();
        for (key, value) in &form.parameters {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            multipart_form = multipart_form.text(key.clone(), value);
        }

        let file_part = multipart::Part::bytes(bytes).file_name(source_name.to_string());
        multipart_form = multipart_form.part("file", file_part);

        let response = self
            .client
            .post(&form.url)
            .multipart(multipart_form)
            .send()
            .await
            .map_err(|e| ClientError::submission(transport_reason(&e)))?;

        if !response.status().is_success() {
            return Err(ClientError::submission(format!(
                "Upload failed: {}",
                rejection_reason(response).await
            )));
        }

        Ok(())
    }

    /// Fetch the current state of a job.
    async fn fetch_job(&self, handle: &JobHandle) -> Result<ApiJob, PollFailure> {
        let url = format!("{}/v2/jobs/{}", self.base_url(), handle);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| PollFailure::Transient(transport_reason(&e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(PollFailure::Transient(rejection_reason(response).await));
        }
        if !status.is_success() {
            return Err(PollFailure::Fatal(ClientError::conversion(
                rejection_reason(response).await,
            )));
        }

        let envelope: JobEnvelope = response.json().await.map_err(|e| {
            PollFailure::Fatal(ClientError::conversion(format!(
                "Invalid job response: {}",
                e
            )))
        })?;

        Ok(envelope.data)
    }
}

/// A poll that produced no job state.
enum PollFailure {
    /// Transport failure, rate limiting or a server error. Polling continues.
    Transient(String),
    Fatal(ClientError),
}

#[async_trait]
impl ConversionClient for CloudConvertClient {
    fn name(&self) -> &str {
        "cloudconvert"
    }

    fn stage_labels(&self) -> &[&'static str] {
        &STAGES
    }

    async fn submit(
        &self,
        bytes: Vec<u8>,
        source_name: &str,
        target_format: &str,
        stage_tx: mpsc::Sender<String>,
    ) -> Result<JobHandle, ClientError> {
        report_stage(&stage_tx, stages::UPLOADING).await;

        let job = self.create_job(target_format).await?;
        debug!(job_id = %job.id, source = source_name, "CloudConvert job created");

        let form = job
            .task(IMPORT_TASK)
            .and_then(|task| task.result.as_ref())
            .and_then(|result| result.form.as_ref())
            .ok_or_else(|| {
                ClientError::submission(format!("Job {} has no upload form", job.id))
            })?;

        self.upload(form, bytes, source_name).await?;
        debug!(job_id = %job.id, "Upload complete");

        Ok(JobHandle::new(job.id))
    }

    async fn await_result(
        &self,
        handle: &JobHandle,
        stage_tx: mpsc::Sender<String>,
    ) -> Result<ResultReference, ClientError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut finalizing = false;

        report_stage(&stage_tx, stages::PROCESSING).await;

        loop {
            match self.fetch_job(handle).await {
                Ok(job) => {
                    if !finalizing && job.export_started() {
                        finalizing = true;
                        report_stage(&stage_tx, stages::FINALIZING).await;
                    }

                    match job.status.as_str() {
                        "finished" => {
                            return job
                                .export_url()
                                .map(ResultReference::new)
                                .ok_or_else(|| {
                                    ClientError::conversion(format!(
                                        "Job {} finished without an export URL",
                                        job.id
                                    ))
                                });
                        }
                        "error" => {
                            let reason = job.failure_message();
                            warn!(job_id = %job.id, reason = %reason, "CloudConvert job failed");
                            return Err(ClientError::conversion(reason));
                        }
                        status => {
                            debug!(job_id = %job.id, status, "Waiting for CloudConvert job");
                        }
                    }
                }
                Err(PollFailure::Transient(reason)) => {
                    warn!(job_id = %handle, reason = %reason, "CloudConvert poll failed, retrying");
                }
                Err(PollFailure::Fatal(error)) => return Err(error),
            }

            if Instant::now() >= deadline {
                return Err(ClientError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn describe_progress(&self, handle: &JobHandle) -> Option<String> {
        let job = self.fetch_job(handle).await.ok()?;
        let pending = job.tasks.iter().find(|task| task.status != "finished");
        Some(match pending {
            Some(task) => format!("{}: {}", task.label(), task.status),
            None => job.status,
        })
    }
}

/// Describe a transport-level failure.
fn transport_reason(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        format!("Request failed: {}", e)
    }
}

/// Describe a non-success HTTP response, using the API error message if any.
async fn rejection_reason(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    let prefix = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "Unauthorized",
        StatusCode::PAYLOAD_TOO_LARGE => "Payload too large",
        StatusCode::UNPROCESSABLE_ENTITY => "Invalid request",
        StatusCode::TOO_MANY_REQUESTS => "Rate limited",
        _ => "Service error",
    };

    if message.is_empty() {
        format!("{} (HTTP {})", prefix, status.as_u16())
    } else {
        format!("{} (HTTP {}): {}", prefix, status.as_u16(), message)
    }
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    data: ApiJob,
}

#[derive(Debug, Deserialize)]
struct ApiJob {
    id: String,
    status: String,
    #[serde(default)]
    tasks: Vec<ApiTask>,
}

impl ApiJob {
    fn task(&self, name: &str) -> Option<&ApiTask> {
        self.tasks.iter().find(|t| t.name.as_deref() == Some(name))
    }

    fn export_task(&self) -> Option<&ApiTask> {
        self.task(EXPORT_TASK)
            .or_else(|| self.tasks.iter().find(|t| t.operation == "export/url"))
    }

    fn export_started(&self) -> bool {
        self.export_task()
            .map(|t| t.status == "processing" || t.status == "finished")
            .unwrap_or(false)
    }

    fn export_url(&self) -> Option<String> {
        self.export_task()?
            .result
            .as_ref()?
            .files
            .iter()
            .find_map(|f| f.url.clone())
    }

    fn failure_message(&self) -> String {
        self.tasks
            .iter()
            .find(|t| t.status == "error")
            .map(|t| {
                let message = t.message.as_deref().unwrap_or("unknown error");
                match &t.code {
                    Some(code) => format!("{} failed ({}): {}", t.label(), code, message),
                    None => format!("{} failed: {}", t.label(), message),
                }
            })
            .unwrap_or_else(|| format!("Job {} failed", self.id))
    }
}

#[derive(Debug, Deserialize)]
struct ApiTask {
    #[serde(default)]
    name: Option<String>,
    operation: String,
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    result: Option<ApiTaskResult>,
}

impl ApiTask {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.operation)
    }
}

#[derive(Debug, Deserialize)]
struct ApiTaskResult {
    #[serde(default)]
    form: Option<UploadForm>,
    #[serde(default)]
    files: Vec<ExportedFile>,
}

#[derive(Debug, Deserialize)]
struct UploadForm {
    url: String,
    #[serde(default)]
    parameters: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ExportedFile {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CloudConvertClient {
        CloudConvertClient::new(
            CloudConvertConfig::new("test-key")
                .with_api_url(server.uri())
                .with_poll_interval(10)
                .with_timeout(5),
        )
    }

    fn created_job(server: &MockServer) -> Value {
        json!({
            "data": {
                "id": "job-1",
                "status": "waiting",
                "tasks": [
                    {
                        "id": "t-import",
                        "name": "import-file",
                        "operation": "import/upload",
                        "status": "waiting",
                        "result": {
                            "form": {
                                "url": format!("{}/upload", server.uri()),
                                "parameters": { "expires": 1700000000, "signature": "abc" }
                            }
                        }
                    },
                    { "id": "t-convert", "name": "convert-file", "operation": "convert", "status": "waiting" },
                    { "id": "t-export", "name": "export-file", "operation": "export/url", "status": "waiting" }
                ]
            }
        })
    }

    fn finished_job() -> Value {
        json!({
            "data": {
                "id": "job-1",
                "status": "finished",
                "tasks": [
                    { "name": "import-file", "operation": "import/upload", "status": "finished" },
                    { "name": "convert-file", "operation": "convert", "status": "finished" },
                    {
                        "name": "export-file",
                        "operation": "export/url",
                        "status": "finished",
                        "result": {
                            "files": [
                                { "filename": "movie.mp4", "url": "https://storage.example.com/movie.mp4" }
                            ]
                        }
                    }
                ]
            }
        })
    }

    async fn collect(mut rx: mpsc::Receiver<String>) -> Vec<String> {
        let mut labels = Vec::new();
        while let Some(label) = rx.recv().await {
            labels.push(label);
        }
        labels
    }

    #[tokio::test]
    async fn test_submit_and_await_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "tasks": { "convert-file": { "output_format": "mp4" } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(created_job(&server)))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-1"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(finished_job()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (tx, rx) = mpsc::channel(16);

        let handle = client
            .submit(b"movie bytes".to_vec(), "movie.mov", "mp4", tx.clone())
            .await
            .unwrap();
        assert_eq!(handle.as_str(), "job-1");

        let reference = client.await_result(&handle, tx).await.unwrap();
        assert_eq!(reference.as_str(), "https://storage.example.com/movie.mp4");

        let labels = collect(rx).await;
        assert_eq!(
            labels,
            vec![stages::UPLOADING, stages::PROCESSING, stages::FINALIZING]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_submission_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "message": "Unauthenticated.", "code": "UNAUTHENTICATED" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (tx, _rx) = mpsc::channel(16);

        let err = client
            .submit(vec![1, 2, 3], "a.png", "jpg", tx)
            .await
            .unwrap_err();
        match err {
            ClientError::Submission { reason } => {
                assert!(reason.contains("Unauthorized"));
                assert!(reason.contains("Unauthenticated."));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_upload_is_submission_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .respond_with(ResponseTemplate::new(201).set_body_json(created_job(&server)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(413))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (tx, _rx) = mpsc::channel(16);

        let err = client
            .submit(vec![0; 64], "big.mov", "mp4", tx)
            .await
            .unwrap_err();
        match err {
            ClientError::Submission { reason } => assert!(reason.contains("Payload too large")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_error_is_conversion_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "job-2",
                    "status": "error",
                    "tasks": [
                        { "name": "import-file", "operation": "import/upload", "status": "finished" },
                        {
                            "name": "convert-file",
                            "operation": "convert",
                            "status": "error",
                            "code": "INVALID_CONVERSION_TYPE",
                            "message": "This conversion type is not supported"
                        },
                        { "name": "export-file", "operation": "export/url", "status": "waiting" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (tx, _rx) = mpsc::channel(16);

        let err = client
            .await_result(&JobHandle::new("job-2"), tx)
            .await
            .unwrap_err();
        match err {
            ClientError::Conversion { reason } => {
                assert!(reason.contains("convert-file"));
                assert!(reason.contains("not supported"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_retries_after_server_error() {
        let server = MockServer::start().await;

        // First poll hits a 503, the next one sees the finished job.
        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(finished_job()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (tx, _rx) = mpsc::channel(16);

        let reference = client
            .await_result(&JobHandle::new("job-1"), tx)
            .await
            .unwrap();
        assert_eq!(reference.as_str(), "https://storage.example.com/movie.mp4");
    }

    #[tokio::test]
    async fn test_poll_retries_after_rate_limit() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-1"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(finished_job()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (tx, _rx) = mpsc::channel(16);

        assert!(client
            .await_result(&JobHandle::new("job-1"), tx)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_persistent_server_error_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-1"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = CloudConvertClient::new(
            CloudConvertConfig::new("test-key")
                .with_api_url(server.uri())
                .with_poll_interval(10)
                .with_timeout(0),
        );
        let (tx, _rx) = mpsc::channel(16);

        let err = client
            .await_result(&JobHandle::new("job-1"), tx)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Timeout { timeout_secs: 0 });
    }

    #[tokio::test]
    async fn test_missing_job_is_conversion_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/gone"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "Job not found" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (tx, _rx) = mpsc::channel(16);

        let err = client
            .await_result(&JobHandle::new("gone"), tx)
            .await
            .unwrap_err();
        match err {
            ClientError::Conversion { reason } => assert!(reason.contains("Job not found")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_await_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "job-3", "status": "processing", "tasks": [] }
            })))
            .mount(&server)
            .await;

        let client = CloudConvertClient::new(
            CloudConvertConfig::new("test-key")
                .with_api_url(server.uri())
                .with_poll_interval(10)
                .with_timeout(0),
        );
        let (tx, _rx) = mpsc::channel(16);

        let err = client
            .await_result(&JobHandle::new("job-3"), tx)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Timeout { timeout_secs: 0 });
    }

    #[tokio::test]
    async fn test_describe_progress() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "job-4",
                    "status": "processing",
                    "tasks": [
                        { "name": "import-file", "operation": "import/upload", "status": "finished" },
                        { "name": "convert-file", "operation": "convert", "status": "processing" }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let description = client.describe_progress(&JobHandle::new("job-4")).await;
        assert_eq!(description.as_deref(), Some("convert-file: processing"));

        let missing = client.describe_progress(&JobHandle::new("nope")).await;
        assert_eq!(missing, None);
    }
}
