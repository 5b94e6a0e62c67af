//! Generic adapter over the `yt-dlp` command-line extractor.
//!
//! One [`YtDlpExtractor`] is registered per entry of the site table; all of
//! them share a single [`YtDlpRunner`].

mod dump;
mod sites;

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use driftnet_core::config::ExtractionConfig;
use driftnet_core::{ExtractError, Extractor, Media, MediaSource};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

pub use dump::{
    YtDlpDump, YtDlpFormat, YtDlpThumbnail, item_from_format, media_from_dump, media_shell,
    mime_type_for,
};
pub use sites::{SITES, Site, site};

const COMMON_PATHS: &[&str] = &[
    "/opt/homebrew/bin/yt-dlp",
    "/usr/local/bin/yt-dlp",
    "/usr/bin/yt-dlp",
];

/// Runs yt-dlp and decodes its JSON description of a link.
#[derive(Debug, Clone)]
pub struct YtDlpRunner {
    binary: PathBuf,
    socket_timeout: Duration,
}

impl YtDlpRunner {
    pub fn new(binary: impl Into<PathBuf>, socket_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            socket_timeout,
        }
    }

    /// Uses the configured binary, or the first one found in common install locations.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let binary = config
            .ytdlp_path
            .clone()
            .unwrap_or_else(Self::discover_binary);
        Self::new(binary, config.ytdlp_socket_timeout)
    }

    fn discover_binary() -> PathBuf {
        COMMON_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("yt-dlp"))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn build_args(&self, url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().max(1).to_string(),
            url.to_string(),
        ]
    }

    /// Describes `url` without downloading it.
    ///
    /// The child process is killed if `cancel` fires or the returned future
    /// is dropped.
    ///
    /// # Errors
    ///
    /// - `ExtractError::ToolUnavailable` - If the binary cannot be started
    /// - `ExtractError::Cancelled` - If `cancel` fired first
    /// - `ExtractError::Failed` (transient) - If yt-dlp exited with an error
    /// - `ExtractError::Failed` (permanent) - If the output is not a media description
    pub async fn dump_json(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<YtDlpDump, ExtractError> {
        let child = Command::new(&self.binary)
            .args(self.build_args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled { stage: "yt-dlp" }),
            output = child.wait_with_output() => output
                .map_err(|e| ExtractError::transient(format!("yt-dlp did not finish: {e}")))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no error output");
            return Err(ExtractError::transient(format!(
                "yt-dlp exited with {}: {}",
                output.status, reason
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let document = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| ExtractError::permanent("yt-dlp returned no media description"))?;

        serde_json::from_str(document)
            .map_err(|e| ExtractError::permanent(format!("yt-dlp output did not decode: {e}")))
    }

    fn spawn_error(&self, error: io::Error) -> ExtractError {
        let reason = if error.kind() == io::ErrorKind::NotFound {
            format!("{} not found", self.binary.display())
        } else {
            format!("{} could not be started: {}", self.binary.display(), error)
        };
        ExtractError::ToolUnavailable { reason }
    }
}

/// Capability for one long-tail site, backed by yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    source: MediaSource,
    hosts: &'static [&'static str],
    runner: Arc<YtDlpRunner>,
}

impl YtDlpExtractor {
    pub fn new(site: &Site, runner: Arc<YtDlpRunner>) -> Self {
        Self {
            source: MediaSource::from_static(site.name),
            hosts: site.hosts,
            runner,
        }
    }

    /// One extractor per entry of the site table.
    pub fn for_all_sites(runner: &Arc<YtDlpRunner>) -> Vec<Self> {
        SITES
            .iter()
            .map(|site| Self::new(site, Arc::clone(runner)))
            .collect()
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        self.source.as_str()
    }

    fn hosts(&self) -> Vec<String> {
        self.hosts.iter().map(|host| host.to_string()).collect()
    }

    fn source(&self) -> MediaSource {
        self.source.clone()
    }

    async fn extract(&self, url: &str, cancel: &CancellationToken) -> Result<Media, ExtractError> {
        let dump = self.runner.dump_json(url, cancel).await?;
        let media = media_from_dump(&dump, self.source.clone(), url);

        if media.items.is_empty() {
            return Err(ExtractError::permanent(format!(
                "no downloadable formats for {url}"
            )));
        }
        tracing::debug!("yt-dlp found {} items for {}", media.items.len(), url);
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let runner = YtDlpRunner::new("yt-dlp", Duration::from_secs(30));
        let args = runner.build_args("https://vimeo.com/1");

        assert_eq!(args.first().map(String::as_str), Some("--dump-json"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://vimeo.com/1"));
        assert!(args.windows(2).any(|pair| pair == ["--socket-timeout", "30"]));
    }

    #[test]
    fn test_configured_binary_wins() {
        let config = ExtractionConfig {
            ytdlp_path: Some(PathBuf::from("/custom/yt-dlp")),
            ..ExtractionConfig::default()
        };
        assert_eq!(
            YtDlpRunner::from_config(&config).binary(),
            Path::new("/custom/yt-dlp")
        );
    }

    #[test]
    fn test_one_extractor_per_site() {
        let runner = Arc::new(YtDlpRunner::new("yt-dlp", Duration::from_secs(1)));
        let extractors = YtDlpExtractor::for_all_sites(&runner);

        assert_eq!(extractors.len(), SITES.len());
        let tiktok = extractors.iter().find(|e| e.name() == "tiktok").unwrap();
        assert_eq!(tiktok.source(), MediaSource::TIKTOK);
        assert!(tiktok.hosts().contains(&"vm.tiktok.com".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_unavailable() {
        let runner = YtDlpRunner::new("/nonexistent/driftnet/yt-dlp", Duration::from_secs(1));

        let error = runner
            .dump_json("https://vimeo.com/1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_is_transient() {
        let runner = YtDlpRunner::new("false", Duration::from_secs(1));

        let error = runner
            .dump_json("https://vimeo.com/1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(error.is_transient());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_before_exit() {
        let runner = YtDlpRunner::new("false", Duration::from_secs(1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = runner.dump_json("https://vimeo.com/1", &cancel).await.unwrap_err();
        assert!(error.is_cancelled());
    }
}
