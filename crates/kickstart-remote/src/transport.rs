use std::fs::File;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Per-request settings shared by every transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProfile {
    pub user_agent: String,
    pub timeout: Duration,
    pub insecure_tls: bool,
}

pub type ProgressFn<'a> = dyn FnMut(u64, Option<u64>) + 'a;

/// One way of performing an HTTP GET. The fetcher tries transports in order.
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    fn get(&self, url: &str, profile: &RequestProfile) -> Result<Vec<u8>>;

    /// Streams the response body into `out`, returning the bytes written.
    fn download(
        &self,
        url: &str,
        out: &mut File,
        profile: &RequestProfile,
        progress: &mut ProgressFn<'_>,
    ) -> Result<u64>;
}

const MAX_REDIRECTS: usize = 10;
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    fn client(&self, profile: &RequestProfile) -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .user_agent(profile.user_agent.clone())
            .timeout(profile.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(profile.insecure_tls)
            .build()
            .context("failed to build http client")
    }

    fn send(
        &self,
        url: &str,
        profile: &RequestProfile,
    ) -> Result<reqwest::blocking::Response> {
        let response = self
            .client(profile)?
            .get(url)
            .send()
            .with_context(|| format!("request failed: {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("request returned HTTP {status}: {url}"));
        }
        Ok(response)
    }
}

impl Transport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    fn get(&self, url: &str, profile: &RequestProfile) -> Result<Vec<u8>> {
        let response = self.send(url, profile)?;
        let body = response
            .bytes()
            .with_context(|| format!("failed reading response body: {url}"))?;
        Ok(body.to_vec())
    }

    fn download(
        &self,
        url: &str,
        out: &mut File,
        profile: &RequestProfile,
        progress: &mut ProgressFn<'_>,
    ) -> Result<u64> {
        let mut response = self.send(url, profile)?;
        let total = response.content_length();
        let mut buffer = vec![0_u8; CHUNK_SIZE];
        let mut written = 0_u64;
        progress(0, total);
        loop {
            let read = response
                .read(&mut buffer)
                .with_context(|| format!("failed reading response body: {url}"))?;
            if read == 0 {
                break;
            }
            out.write_all(&buffer[..read])
                .context("failed writing download to disk")?;
            written += read as u64;
            progress(written, total);
        }
        out.flush().context("failed flushing download to disk")?;
        Ok(written)
    }
}

/// Shells out to `curl` for hosts where the in-process client cannot get
/// through (proxies configured only for the system tools, odd TLS stacks).
#[derive(Debug, Clone)]
pub struct CurlTransport {
    program: String,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            program: "curl".to_string(),
        }
    }
}

impl CurlTransport {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn base_command(&self, url: &str, profile: &RequestProfile) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-fsSL")
            .arg("--max-redirs")
            .arg(MAX_REDIRECTS.to_string())
            .arg("--max-time")
            .arg(profile.timeout.as_secs().max(1).to_string())
            .arg("-A")
            .arg(&profile.user_agent);
        if profile.insecure_tls {
            command.arg("-k");
        }
        command.arg("--").arg(url);
        command
    }
}

impl Transport for CurlTransport {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn get(&self, url: &str, profile: &RequestProfile) -> Result<Vec<u8>> {
        let output = self
            .base_command(url, profile)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed launching {}", self.program))?;
        if !output.status.success() {
            return Err(anyhow!(
                "curl failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(output.stdout)
    }

    fn download(
        &self,
        url: &str,
        out: &mut File,
        profile: &RequestProfile,
        progress: &mut ProgressFn<'_>,
    ) -> Result<u64> {
        let sink = out
            .try_clone()
            .context("failed duplicating download file handle")?;
        progress(0, None);
        let output = self
            .base_command(url, profile)
            .stdin(Stdio::null())
            .stdout(Stdio::from(sink))
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed launching {}", self.program))?;
        if !output.status.success() {
            return Err(anyhow!(
                "curl failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let written = out
            .metadata()
            .context("failed reading downloaded file size")?
            .len();
        progress(written, Some(written));
        Ok(written)
    }
}
