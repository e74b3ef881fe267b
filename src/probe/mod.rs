//! Content-type probing of candidate files.
//!
//! The probe answers one question without downloading anything: does a
//! URL serve binary content of interest? Classification is a substring
//! match of the response Content-Type against a curated dictionary of
//! executable, installer, archive and script types.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use once_cell::sync::Lazy;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};

use crate::config::{PROBE_BODY_READ_LIMIT, TCP_CONNECT_TIMEOUT_SECS, USER_AGENT};

/// Content-type substrings identifying binary content of interest.
///
/// Matching is case-sensitive containment; servers emit these types in
/// canonical lowercase. Grouped by family, order is irrelevant.
static BINARY_CONTENT_TYPES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        // Generic binary
        "application/octet-stream",
        "application/binary",
        "application/x-binary",
        "binary/octet-stream",
        "application/x-download",
        // Windows executables
        "application/x-msdownload",
        "application/x-msdos-program",
        "application/x-msdos-windows",
        "application/exe",
        "application/x-exe",
        "application/x-winexe",
        "application/x-executable",
        "application/x-dosexec",
        "application/x-ms-dos-executable",
        "application/vnd.microsoft.portable-executable",
        // Unix executables and objects
        "application/x-elf",
        "application/x-sharedlib",
        "application/x-pie-executable",
        "application/x-object",
        "application/x-mach-binary",
        "application/x-coredump",
        // Installers and packages
        "application/x-msi",
        "application/x-ms-installer",
        "application/x-windows-installer",
        "application/x-apple-diskimage",
        "application/vnd.android.package-archive",
        "application/x-rpm",
        "application/x-redhat-package-manager",
        "application/vnd.debian.binary-package",
        "application/x-debian-package",
        "application/x-snap",
        "application/x-flatpak",
        // Archives
        "application/zip",
        "application/x-zip-compressed",
        "application/x-7z-compressed",
        "application/x-rar-compressed",
        "application/vnd.rar",
        "application/x-tar",
        "application/x-gtar",
        "application/gzip",
        "application/x-gzip",
        "application/x-bzip2",
        "application/x-xz",
        "application/zstd",
        "application/x-lzh-compressed",
        "application/x-cab-compressed",
        "application/vnd.ms-cab-compressed",
        "application/x-iso9660-image",
        "application/x-cpio",
        "application/x-archive",
        "application/java-archive",
        "application/x-java-archive",
        // Scripts
        "application/x-sh",
        "application/x-shellscript",
        "application/x-csh",
        "application/x-perl",
        "application/x-python",
        "application/x-powershell",
        "application/x-msdos-batch",
        "text/x-shellscript",
        "text/x-python",
        "text/x-perl",
        "text/x-msdos-batch",
    ]
});

/// Result of one probe.
#[derive(Debug, Clone)]
pub struct ProbeFinding {
    /// Whether the content-type matched the binary dictionary.
    pub is_binary: bool,
    /// The content-type the server advertised.
    pub content_type: String,
}

/// Probing capability consumed by the host pipeline.
///
/// [`ContentProbe`] is the production implementation; scenario tests
/// substitute a frozen surface.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Whether a walked file URL qualifies for probing.
    fn should_check(&self, file_url: &str) -> bool;

    /// Probes a file URL discovered by the walker.
    async fn check_url(&self, file_url: &str) -> Result<ProbeFinding>;

    /// Probes `base_url/name` for a specific target file.
    async fn check_specific(&self, base_url: &str, name: &str) -> Result<ProbeFinding>;
}

/// HEAD/partial-GET prober for binary content.
#[derive(Debug, Clone)]
pub struct ContentProbe {
    client: reqwest::Client,
    target_filename: String,
}

impl ContentProbe {
    /// Builds a probe with its own relaxed-TLS client.
    ///
    /// `target_filename` drives [`ContentProbe::should_check`]: when
    /// non-empty, only files with that exact name are probed during
    /// directory walks.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout_seconds: u64, target_filename: String) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .connect_timeout(std::time::Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .context("failed to build probe HTTP client")?;
        Ok(ContentProbe {
            client,
            target_filename,
        })
    }
}

#[async_trait]
impl Prober for ContentProbe {
    /// With a target filename configured, only URLs whose final segment
    /// equals it qualify; otherwise every file does.
    fn should_check(&self, file_url: &str) -> bool {
        if self.target_filename.is_empty() {
            return true;
        }
        let without_query = file_url.split(['?', '#']).next().unwrap_or(file_url);
        let base_name = without_query.rsplit('/').next().unwrap_or(without_query);
        base_name == self.target_filename
    }

    /// Probes a file URL with a HEAD request.
    ///
    /// # Errors
    ///
    /// A non-200 status, a missing or zero advertised content length, and
    /// transport failures are all errors; `Ok` with `is_binary == false`
    /// means the server answered but the type is not of interest.
    async fn check_url(&self, file_url: &str) -> Result<ProbeFinding> {
        log::debug!("Probing file: {file_url}");

        let response = self
            .client
            .head(file_url)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .with_context(|| format!("failed to probe {file_url}"))?;

        if response.status() != reqwest::StatusCode::OK {
            bail!("server returned non-OK status: {}", response.status());
        }
        if advertised_length(&response) == 0 {
            bail!("server advertised no content for {file_url}");
        }

        let content_type = header_str(&response, CONTENT_TYPE);
        Ok(ProbeFinding {
            is_binary: is_binary_content_type(&content_type),
            content_type,
        })
    }

    /// Probes `base_url/name` with a GET, reading at most a few hundred
    /// body bytes to confirm the response is real.
    ///
    /// # Errors
    ///
    /// Rejects `name` containing path traversal (`..`, `/`, `\`); a
    /// non-200 status, zero advertised length and transport failures are
    /// errors as in [`Prober::check_url`].
    async fn check_specific(&self, base_url: &str, name: &str) -> Result<ProbeFinding> {
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            bail!("invalid target filename: {name}");
        }

        let file_url = format!("{}/{}", base_url.trim_end_matches('/'), name);
        log::debug!("Probing for specific file: {file_url}");

        let response = self
            .client
            .get(&file_url)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .with_context(|| format!("failed to probe {file_url}"))?;

        if response.status() != reqwest::StatusCode::OK {
            bail!("server returned non-OK status: {}", response.status());
        }
        if advertised_length(&response) == 0 {
            bail!("server advertised no content for {file_url}");
        }

        let content_type = header_str(&response, CONTENT_TYPE);
        let is_binary = is_binary_content_type(&content_type);

        // Pull a sliver of the body so a header-only lie does not count
        // as a finding. Read failures here are not fatal.
        let mut stream = response.bytes_stream();
        let mut read = 0usize;
        while read < PROBE_BODY_READ_LIMIT {
            match stream.next().await {
                Some(Ok(chunk)) => read += chunk.len(),
                _ => break,
            }
        }
        log::debug!("Read {read} probe bytes from {file_url}");

        Ok(ProbeFinding {
            is_binary,
            content_type,
        })
    }
}

/// Whether a content-type matches the binary dictionary.
pub fn is_binary_content_type(content_type: &str) -> bool {
    BINARY_CONTENT_TYPES
        .iter()
        .any(|entry| content_type.contains(entry))
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Content length the server advertised, 0 when absent or unparseable.
fn advertised_length(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    fn probe(target: &str) -> ContentProbe {
        ContentProbe::new(5, target.to_string()).expect("probe client")
    }

    #[test]
    fn test_dictionary_matches_expected_families() {
        assert!(is_binary_content_type("application/x-msdownload"));
        assert!(is_binary_content_type("application/octet-stream"));
        assert!(is_binary_content_type("application/zip"));
        assert!(is_binary_content_type("application/x-shellscript"));
        assert!(is_binary_content_type(
            "application/octet-stream; charset=binary"
        ));
        assert!(!is_binary_content_type("text/html"));
        assert!(!is_binary_content_type("image/png"));
        // Match is case-sensitive; servers emit canonical lowercase.
        assert!(!is_binary_content_type("APPLICATION/ZIP"));
    }

    #[test]
    fn test_should_check_with_target() {
        let probe = probe("payload.exe");
        assert!(probe.should_check("http://a.test/dir/payload.exe"));
        assert!(probe.should_check("http://a.test/payload.exe?x=1"));
        assert!(!probe.should_check("http://a.test/other.exe"));
    }

    #[test]
    fn test_should_check_without_target_checks_everything() {
        let probe = probe("");
        assert!(probe.should_check("http://a.test/anything.bin"));
    }

    #[tokio::test]
    async fn test_check_url_binary_hit() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/tool.exe")).respond_with(
                status_code(200)
                    .insert_header("Content-Type", "application/x-msdownload")
                    .body(b"MZ\x90\x00 not really a PE".to_vec()),
            ),
        );

        let finding = probe("")
            .check_url(&server.url_str("/tool.exe"))
            .await
            .expect("probe should succeed");
        assert!(finding.is_binary);
        assert_eq!(finding.content_type, "application/x-msdownload");
    }

    #[tokio::test]
    async fn test_check_url_non_binary_is_ok_not_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/page.html")).respond_with(
                status_code(200)
                    .insert_header("Content-Type", "text/html")
                    .body("<html></html>"),
            ),
        );

        let finding = probe("")
            .check_url(&server.url_str("/page.html"))
            .await
            .expect("non-binary is not an error");
        assert!(!finding.is_binary);
        assert_eq!(finding.content_type, "text/html");
    }

    #[tokio::test]
    async fn test_check_url_non_ok_status_is_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/gone.exe"))
                .respond_with(status_code(404)),
        );

        let err = probe("")
            .check_url(&server.url_str("/gone.exe"))
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("non-OK status"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_check_specific_finds_binary_file() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/payload.exe")).respond_with(
                status_code(200)
                    .insert_header("Content-Type", "application/x-msdownload")
                    .body("MZ binary body"),
            ),
        );

        let finding = probe("payload.exe")
            .check_specific(&server.url_str("/"), "payload.exe")
            .await
            .expect("probe should succeed");
        assert!(finding.is_binary);
    }

    #[tokio::test]
    async fn test_check_specific_rejects_path_traversal() {
        // No server: the request must be refused before any I/O happens.
        let probe = probe("");
        for name in ["../etc/passwd", "a/b.exe", "a\\b.exe"] {
            let err = probe
                .check_specific("http://unreachable.invalid", name)
                .await
                .unwrap_err();
            assert!(
                err.to_string().contains("invalid target filename"),
                "{name} should be rejected, got: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_check_specific_empty_body_is_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/empty.exe")).respond_with(
                status_code(200).insert_header("Content-Type", "application/x-msdownload"),
            ),
        );

        let err = probe("")
            .check_specific(&server.url_str("/"), "empty.exe")
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("advertised no content"),
            "unexpected error: {err}"
        );
    }
}
