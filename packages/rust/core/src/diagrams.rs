//! Mermaid diagram rendering.
//!
//! Each `*.mmd` source is posted to a Kroki-compatible service which
//! answers with a PNG. Rendered images land in the build directory where
//! pandoc finds them through `--resource-path`. A `.sha256` sidecar next to
//! every image records the source it was rendered from, so unchanged
//! diagrams are not sent again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use url::Url;

use docbuild_shared::{DiagramsConfig, DocBuildError, Result};

/// User-Agent string for renderer requests.
const USER_AGENT: &str = concat!("docbuild/", env!("CARGO_PKG_VERSION"));

/// A diagram image that is present in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Size of the PNG in bytes.
    pub size: u64,
    /// The image was already up to date and no request was made.
    pub cached: bool,
}

/// Client for a Kroki-compatible diagram service.
#[derive(Debug, Clone)]
pub struct DiagramRenderer {
    client: Client,
    endpoint: Url,
}

impl DiagramRenderer {
    /// Build a renderer from the `[diagrams]` config section.
    pub fn new(config: &DiagramsConfig) -> Result<Self> {
        let base = config.renderer_url.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/mermaid/png")).map_err(|e| {
            DocBuildError::config(format!(
                "invalid diagrams.renderer_url '{}': {e}",
                config.renderer_url
            ))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocBuildError::Diagram(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Render one source into `out_dir/<stem>.png`.
    #[instrument(skip(self, out_dir), fields(source = %source.display()))]
    pub async fn render(&self, source: &Path, out_dir: &Path) -> Result<RenderedDiagram> {
        let script = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| DocBuildError::io(source, e))?;

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| DocBuildError::io(out_dir, e))?;

        let output = output_path(source, out_dir);
        let sidecar = sidecar_path(&output);
        let digest = source_digest(&script);

        if is_up_to_date(&output, &sidecar, &digest).await {
            let size = file_size(&output).await?;
            debug!(output = %output.display(), "diagram unchanged, skipping render");
            return Ok(RenderedDiagram {
                source: source.to_path_buf(),
                output,
                size,
                cached: true,
            });
        }

        let png = self.fetch_png(source, script).await?;

        tokio::fs::write(&output, &png)
            .await
            .map_err(|e| DocBuildError::io(&output, e))?;
        tokio::fs::write(&sidecar, &digest)
            .await
            .map_err(|e| DocBuildError::io(&sidecar, e))?;

        info!(output = %output.display(), bytes = png.len(), "diagram rendered");

        Ok(RenderedDiagram {
            source: source.to_path_buf(),
            output,
            size: png.len() as u64,
            cached: false,
        })
    }

    async fn fetch_png(&self, source: &Path, script: String) -> Result<Vec<u8>> {
        let name = source.display();
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(script)
            .send()
            .await
            .map_err(|e| DocBuildError::Diagram(format!("{name}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DocBuildError::Diagram(format!(
                "{name}: renderer returned HTTP {status}: {}",
                detail.trim()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DocBuildError::Diagram(format!("{name}: failed to read body: {e}")))?;

        if bytes.is_empty() {
            return Err(DocBuildError::Diagram(format!(
                "{name}: renderer returned an empty image"
            )));
        }

        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn output_path(source: &Path, out_dir: &Path) -> PathBuf {
    let mut name = source
        .file_stem()
        .unwrap_or(source.as_os_str())
        .to_os_string();
    name.push(".png");
    out_dir.join(name)
}

fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".sha256");
    PathBuf::from(name)
}

fn source_digest(script: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(script.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn is_up_to_date(output: &Path, sidecar: &Path, digest: &str) -> bool {
    if !output.is_file() {
        return false;
    }
    match tokio::fs::read_to_string(sidecar).await {
        Ok(recorded) => recorded.trim() == digest,
        Err(_) => false,
    }
}

async fn file_size(path: &Path) -> Result<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(|e| DocBuildError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn temp_dirs() -> (PathBuf, PathBuf) {
        let root = std::env::temp_dir().join(format!("docbuild-diagrams-{}", uuid::Uuid::now_v7()));
        let src = root.join("src");
        std::fs::create_dir_all(&src).expect("create src");
        (src, root.join("out"))
    }

    fn renderer_for(uri: &str) -> DiagramRenderer {
        let config = DiagramsConfig {
            renderer_url: format!("{uri}/"),
            timeout_secs: 5,
        };
        DiagramRenderer::new(&config).expect("renderer")
    }

    #[test]
    fn endpoint_joins_base_url() {
        let config = DiagramsConfig {
            renderer_url: "https://kroki.example.com/base/".into(),
            timeout_secs: 5,
        };
        let renderer = DiagramRenderer::new(&config).expect("renderer");
        assert_eq!(
            renderer.endpoint().as_str(),
            "https://kroki.example.com/base/mermaid/png"
        );
    }

    #[test]
    fn sidecar_sits_next_to_image() {
        let output = output_path(Path::new("/p/src/diagrams/flow.mmd"), Path::new("/p/build/diagrams"));
        assert_eq!(output, PathBuf::from("/p/build/diagrams/flow.png"));
        assert_eq!(
            sidecar_path(&output),
            PathBuf::from("/p/build/diagrams/flow.png.sha256")
        );
    }

    #[tokio::test]
    async fn renders_and_then_uses_cache() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/mermaid/png"))
            .and(wiremock::matchers::body_string("graph TD; A-->B"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
            .expect(1)
            .mount(&server)
            .await;

        let (src, out) = temp_dirs();
        let source = src.join("flow.mmd");
        std::fs::write(&source, "graph TD; A-->B").expect("write source");

        let renderer = renderer_for(&server.uri());
        let first = renderer.render(&source, &out).await.expect("first render");
        assert!(!first.cached);
        assert_eq!(first.size, PNG_BYTES.len() as u64);
        assert_eq!(std::fs::read(&first.output).expect("read png"), PNG_BYTES);

        let second = renderer.render(&source, &out).await.expect("second render");
        assert!(second.cached);
        assert_eq!(second.output, first.output);

        let _ = std::fs::remove_dir_all(src.parent().unwrap());
    }

    #[tokio::test]
    async fn changed_source_is_rendered_again() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/mermaid/png"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
            .expect(2)
            .mount(&server)
            .await;

        let (src, out) = temp_dirs();
        let source = src.join("seq.mmd");
        std::fs::write(&source, "sequenceDiagram\nA->>B: hi").expect("write source");

        let renderer = renderer_for(&server.uri());
        renderer.render(&source, &out).await.expect("first render");

        std::fs::write(&source, "sequenceDiagram\nA->>B: bye").expect("rewrite source");
        let again = renderer.render(&source, &out).await.expect("second render");
        assert!(!again.cached);

        let _ = std::fs::remove_dir_all(src.parent().unwrap());
    }

    #[tokio::test]
    async fn renderer_error_is_reported() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(
                wiremock::ResponseTemplate::new(400).set_body_string("Syntax error in graph"),
            )
            .mount(&server)
            .await;

        let (src, out) = temp_dirs();
        let source = src.join("broken.mmd");
        std::fs::write(&source, "graph ???").expect("write source");

        let err = renderer_for(&server.uri())
            .render(&source, &out)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("Syntax error"));
        assert!(!out.join("broken.png").exists());

        let _ = std::fs::remove_dir_all(src.parent().unwrap());
    }
}
