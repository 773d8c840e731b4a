//! Asynchronous CSV export jobs: submit, poll to a terminal state, download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::client::{PhorestClient, PhorestClientError};

/// Failure reason upstream reports for an empty window. Not an error.
pub const NO_RECORDS_REASON: &str = "No records found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    TransactionsCsv,
    ClientCsv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    Pending,
    Running,
    Done,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub job_type: JobType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportJob {
    pub job_id: String,
    pub job_type: String,
    pub job_status: JobStatus,
    pub temp_csv_external_url: Option<String>,
    pub failure_reason: Option<String>,
    pub total_rows: Option<i64>,
    pub succeeded_rows: Option<i64>,
}

impl ExportJob {
    /// Download URL of a finished job, if upstream supplied a usable one.
    pub fn csv_url(&self) -> Option<&str> {
        self.temp_csv_external_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
    }
}

/// Terminal result of a job that did not fail.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Done(ExportJob),
    /// `FAILED` with [`NO_RECORDS_REASON`]: the window held nothing.
    NoRecords,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Client(#[from] PhorestClientError),

    #[error("export job {job_id} failed: {reason}")]
    Failed { job_id: String, reason: String },

    #[error("export job {job_id} not finished after {waited_secs}s")]
    Timeout { job_id: String, waited_secs: u64 },

    #[error("export download failed with HTTP {status}")]
    Download { status: StatusCode },

    #[error("export file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export wait cancelled")]
    Cancelled,
}

/// Poll interval: starts at `initial`, doubles each round, never above `max`.
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            max: Duration::from_secs(10),
        }
    }
}

impl PollSchedule {
    pub fn next(&self, current: Duration) -> Duration {
        std::cmp::min(current.saturating_mul(2), self.max)
    }
}

#[derive(Clone)]
pub struct ExportClient {
    client: PhorestClient,
    schedule: PollSchedule,
}

impl ExportClient {
    pub fn new(client: PhorestClient) -> Self {
        Self {
            client,
            schedule: PollSchedule::default(),
        }
    }

    pub fn with_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    fn jobs_url(&self, branch_id: &str) -> String {
        format!("{}/branch/{}/csvexportjob", self.client.business_url(), branch_id)
    }

    /// Submit a job. Not retried: a failure here aborts the stream.
    pub async fn create_export(
        &self,
        branch_id: &str,
        request: &ExportRequest,
    ) -> Result<ExportJob, ExportError> {
        let url = self.jobs_url(branch_id);
        let builder = self.client.authed(self.client.http().post(&url).json(request));
        let job: ExportJob = self.client.request_once(builder).await?;

        tracing::info!(
            branch = branch_id,
            job_id = %job.job_id,
            status = ?job.job_status,
            "export job created"
        );
        Ok(job)
    }

    pub async fn poll(&self, branch_id: &str, job_id: &str) -> Result<ExportJob, ExportError> {
        let url = format!("{}/{}", self.jobs_url(branch_id), job_id);
        let builder = self.client.authed(self.client.http().get(&url));
        Ok(self.client.request_once(builder).await?)
    }

    /// Poll until `DONE` or `FAILED`, giving up after `max_wait`.
    pub async fn wait_for_completion(
        &self,
        branch_id: &str,
        job_id: &str,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, ExportError> {
        let started = Instant::now();
        let deadline = started + max_wait;
        let mut backoff = self.schedule.initial;

        loop {
            let job = self.poll(branch_id, job_id).await?;

            match job.job_status {
                JobStatus::Done => return Ok(JobOutcome::Done(job)),
                JobStatus::Failed => {
                    let reason = job.failure_reason.unwrap_or_default();
                    if reason == NO_RECORDS_REASON {
                        return Ok(JobOutcome::NoRecords);
                    }
                    return Err(ExportError::Failed {
                        job_id: job_id.to_string(),
                        reason,
                    });
                }
                status => {
                    tracing::debug!(job_id, ?status, wait_ms = backoff.as_millis() as u64, "export job pending");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ExportError::Timeout {
                    job_id: job_id.to_string(),
                    waited_secs: now.duration_since(started).as_secs(),
                });
            }

            let pause = std::cmp::min(backoff, deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExportError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
            backoff = self.schedule.next(backoff);
        }
    }

    /// Drive one job from submission to a file at `dest`. `None` means the
    /// window held nothing to download.
    pub async fn export_to_file(
        &self,
        branch_id: &str,
        request: &ExportRequest,
        max_wait: Duration,
        cancel: &CancellationToken,
        dest: &Path,
    ) -> Result<Option<PathBuf>, ExportError> {
        let job = self.create_export(branch_id, request).await?;

        match self
            .wait_for_completion(branch_id, &job.job_id, max_wait, cancel)
            .await?
        {
            JobOutcome::NoRecords => {
                tracing::info!(branch = branch_id, job_id = %job.job_id, "export window has no records");
                Ok(None)
            }
            JobOutcome::Done(done) => match done.csv_url() {
                Some(url) => {
                    self.download(url, dest).await?;
                    Ok(Some(dest.to_path_buf()))
                }
                None => {
                    tracing::warn!(branch = branch_id, job_id = %job.job_id, "export finished without a csv url");
                    Ok(None)
                }
            },
        }
    }

    /// Fetch a finished export into `dest`. The URL is normally pre-signed,
    /// so credentials are only attached on the second attempt.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, ExportError> {
        let bytes = match self.try_download(url, false).await {
            Ok(bytes) => bytes,
            Err(first) => {
                tracing::warn!(error = %first, "unsigned download failed, retrying with credentials");
                self.try_download(url, true).await?
            }
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;

        tracing::info!(path = %dest.display(), bytes = bytes.len(), "export downloaded");
        Ok(bytes.len() as u64)
    }

    async fn try_download(&self, url: &str, with_auth: bool) -> Result<Vec<u8>, ExportError> {
        let mut builder = self.client.http().get(url);
        if with_auth {
            builder = self.client.authed(builder);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExportError::Client(e.into()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::Download { status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExportError::Client(e.into()))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phorest::client::tests::test_client;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_schedule() -> PollSchedule {
        PollSchedule {
            initial: Duration::from_millis(5),
            max: Duration::from_millis(20),
        }
    }

    fn export_client(server: &MockServer) -> ExportClient {
        ExportClient::new(test_client(server)).with_schedule(fast_schedule())
    }

    fn job_json(status: &str, reason: Option<&str>, url: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "jobId": "job-1",
            "jobType": "TRANSACTIONS_CSV",
            "jobStatus": status,
            "failureReason": reason,
            "tempCsvExternalUrl": url
        })
    }

    const POLL_PATH: &str = "/business/biz/branch/br-1/csvexportjob/job-1";

    #[test]
    fn schedule_doubles_up_to_cap() {
        let s = PollSchedule::default();
        let mut d = s.initial;
        let mut seen = vec![d.as_secs()];
        for _ in 0..4 {
            d = s.next(d);
            seen.push(d.as_secs());
        }
        assert_eq!(seen, vec![2, 4, 8, 10, 10]);
    }

    #[test]
    fn request_omits_absent_filters() {
        let req = ExportRequest {
            job_type: JobType::ClientCsv,
            start_filter: None,
            finish_filter: None,
            filter_expression: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({ "jobType": "CLIENT_CSV" })
        );
    }

    #[tokio::test]
    async fn create_export_posts_camel_case_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/business/biz/branch/br-1/csvexportjob"))
            .and(body_json(serde_json::json!({
                "jobType": "TRANSACTIONS_CSV",
                "startFilter": "2024-01-01",
                "finishFilter": "2024-01-31",
                "filterExpression": "updated=<2024-01-31T23:59:59.999Z&updated=>2024-01-01T00:00:00.000Z"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_json("SUBMITTED", None, None)))
            .expect(1)
            .mount(&server)
            .await;

        let req = ExportRequest {
            job_type: JobType::TransactionsCsv,
            start_filter: Some("2024-01-01".into()),
            finish_filter: Some("2024-01-31".into()),
            filter_expression: Some(
                "updated=<2024-01-31T23:59:59.999Z&updated=>2024-01-01T00:00:00.000Z".into(),
            ),
        };
        let job = export_client(&server).create_export("br-1", &req).await.unwrap();
        assert_eq!(job.job_id, "job-1");
        assert_eq!(job.job_status, JobStatus::Submitted);
    }

    #[tokio::test]
    async fn create_export_does_not_retry_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/business/biz/branch/br-1/csvexportjob"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(1)
            .mount(&server)
            .await;

        let req = ExportRequest {
            job_type: JobType::ClientCsv,
            start_filter: None,
            finish_filter: None,
            filter_expression: None,
        };
        let err = export_client(&server).create_export("br-1", &req).await.unwrap_err();
        assert!(matches!(
            err,
            ExportError::Client(PhorestClientError::HttpError { .. })
        ));
    }

    #[tokio::test]
    async fn waits_through_pending_until_done() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(POLL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_json("PENDING", None, None)))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(POLL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_json(
                "DONE",
                None,
                Some("https://files.example/export.csv"),
            )))
            .mount(&server)
            .await;

        let outcome = export_client(&server)
            .wait_for_completion("br-1", "job-1", Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            JobOutcome::Done(job) => {
                assert_eq!(job.csv_url(), Some("https://files.example/export.csv"))
            }
            JobOutcome::NoRecords => panic!("expected Done"),
        }
    }

    #[tokio::test]
    async fn no_records_found_is_benign() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(POLL_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(job_json("FAILED", Some(NO_RECORDS_REASON), None)),
            )
            .mount(&server)
            .await;

        let outcome = export_client(&server)
            .wait_for_completion("br-1", "job-1", Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::NoRecords));
    }

    #[tokio::test]
    async fn other_failures_carry_the_reason() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(POLL_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(job_json("FAILED", Some("Export quota exceeded"), None)),
            )
            .mount(&server)
            .await;

        let err = export_client(&server)
            .wait_for_completion("br-1", "job-1", Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ExportError::Failed { job_id, reason } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(reason, "Export quota exceeded");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gives_up_after_max_wait() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(POLL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_json("RUNNING", None, None)))
            .mount(&server)
            .await;

        let err = export_client(&server)
            .wait_for_completion("br-1", "job-1", Duration::from_millis(60), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Timeout { .. }));
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_wait() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(POLL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_json("PENDING", None, None)))
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let client = ExportClient::new(test_client(&server)).with_schedule(PollSchedule {
            initial: Duration::from_secs(30),
            max: Duration::from_secs(30),
        });

        let err = client
            .wait_for_completion("br-1", "job-1", Duration::from_secs(120), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Cancelled));
    }

    #[tokio::test]
    async fn download_falls_back_to_credentials() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("tx.csv");

        Mock::given(method("GET"))
            .and(path("/signed/tx.csv"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_string("transaction_id\nt1\n"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/signed/tx.csv"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/signed/tx.csv", server.uri());
        let written = export_client(&server).download(&url, &dest).await.unwrap();

        assert_eq!(written, 18);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "transaction_id\nt1\n");
    }

    #[tokio::test]
    async fn download_fails_when_both_attempts_fail() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/signed/gone.csv"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let url = format!("{}/signed/gone.csv", server.uri());
        let err = export_client(&server)
            .download(&url, &dir.path().join("gone.csv"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Download { status } if status == StatusCode::NOT_FOUND
        ));
        assert!(!dir.path().join("gone.csv").exists());
    }
}
