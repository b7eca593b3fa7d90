use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Job as stored by the external registry. Only the registry mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Object key (or public URL) of the uploaded source asset.
    pub video_url: String,
}

/// Subtitle languages the translator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "cn")]
    Mandarin,
}

impl Language {
    /// Language produced by speech-to-text.
    pub const SOURCE: Language = Language::English;

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Mandarin => "cn",
        }
    }
}

impl FromStr for Language {
    type Err = PipelineError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "en" => Ok(Language::English),
            "cn" => Ok(Language::Mandarin),
            other => Err(PipelineError::validation(format!(
                "unsupported subtitle language {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A subtitle file still on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTrack {
    pub path: PathBuf,
    pub language: Language,
}

/// A published subtitle track, as reported to clients and the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub src: String,
    pub language: Language,
}

/// Payload of the `completed` webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletionReport {
    pub id: String,
    pub status: JobStatus,
    /// Public URL of the master playlist.
    pub video_url: String,
    pub subtitle_tracks: Vec<SubtitleTrack>,
    pub video_duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_from_registry_payload() {
        let job: Job = serde_json::from_value(json!({
            "id": "j1",
            "status": "pending",
            "videoUrl": "v1.mp4"
        }))
        .unwrap();
        assert_eq!(job.id, "j1");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.video_url, "v1.mp4");
    }

    #[test]
    fn test_completion_report_wire_format() {
        let report = JobCompletionReport {
            id: "j1".to_string(),
            status: JobStatus::Done,
            video_url: "https://cdn/x/master.m3u8".to_string(),
            subtitle_tracks: vec![SubtitleTrack {
                src: "https://cdn/a.vtt".to_string(),
                language: Language::Mandarin,
            }],
            video_duration: 12.5,
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "id": "j1",
                "status": "done",
                "videoUrl": "https://cdn/x/master.m3u8",
                "subtitleTracks": [{"src": "https://cdn/a.vtt", "language": "cn"}],
                "videoDuration": 12.5
            })
        );
    }

    #[test]
    fn test_language_codes() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::English);
        assert_eq!("cn".parse::<Language>().unwrap(), Language::Mandarin);
        let err = "fr".parse::<Language>().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(Language::Mandarin.to_string(), "cn");
    }
}
