use crate::config::RegistryConfig;
use crate::domain::jobs::{Job, JobCompletionReport};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::registry::JobRegistryPort;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::json;

/// Job registry client. Every call carries the static credential in the
/// `authorization` header. Calls have no deadline of their own.
#[derive(Clone)]
pub struct HttpJobRegistry {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpJobRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.server_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/api/{}", self.base_url, path))
            .header("authorization", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> PipelineResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::registry(format!("{}: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::registry(format!("{}: {}", what, status)));
        }
        Ok(response)
    }
}

#[async_trait]
impl JobRegistryPort for HttpJobRegistry {
    async fn get_job(&self, job_id: &str) -> PipelineResult<Job> {
        let response = self
            .send(
                self.request(Method::GET, &format!("job/{}", job_id)),
                "failed to get job",
            )
            .await?;
        response
            .json()
            .await
            .map_err(|e| PipelineError::registry(format!("invalid job payload: {}", e)))
    }

    async fn mark_started(&self, job_id: &str) -> PipelineResult<()> {
        self.send(
            self.request(Method::POST, &format!("job/{}/start", job_id)),
            "failed to start job processing",
        )
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, job_id: &str, error: &str) -> PipelineResult<()> {
        self.send(
            self.request(Method::POST, &format!("job/{}/fail", job_id))
                .json(&json!({ "error": error })),
            "failed to send job failure",
        )
        .await?;
        Ok(())
    }

    async fn complete(&self, report: &JobCompletionReport) -> PipelineResult<()> {
        self.send(
            self.request(Method::POST, "job").json(report),
            "failed to send job completion",
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::JobStatus;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry(server: &MockServer) -> HttpJobRegistry {
        HttpJobRegistry::new(&RegistryConfig {
            server_url: server.uri(),
            api_key: "platform-key".to_string(),
        })
    }

    #[tokio::test]
    async fn test_get_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/job/j1"))
            .and(header("authorization", "platform-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "j1",
                "status": "pending",
                "videoUrl": "v1.mp4"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let job = registry(&server).get_job("j1").await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.video_url, "v1.mp4");
    }

    #[tokio::test]
    async fn test_unknown_job_is_registry_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = registry(&server).get_job("nope").await.unwrap_err();
        assert!(matches!(&err, PipelineError::Registry(msg) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_slow_registry_is_awaited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/job/j1/start"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;

        registry(&server).mark_started("j1").await.unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_webhooks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/job/j1/start"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/job/j1/fail"))
            .and(body_json(json!({"error": "ffmpeg failed: exit status 1"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/job"))
            .and(body_json(json!({
                "id": "j1",
                "status": "done",
                "videoUrl": "https://cdn/x/a_master.m3u8",
                "subtitleTracks": [],
                "videoDuration": 3.0
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server);
        registry.mark_started("j1").await.unwrap();
        registry
            .mark_failed("j1", "ffmpeg failed: exit status 1")
            .await
            .unwrap();
        registry
            .complete(&JobCompletionReport {
                id: "j1".to_string(),
                status: JobStatus::Done,
                video_url: "https://cdn/x/a_master.m3u8".to_string(),
                subtitle_tracks: vec![],
                video_duration: 3.0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = registry(&server).mark_started("j1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Registry(_)));
    }
}
