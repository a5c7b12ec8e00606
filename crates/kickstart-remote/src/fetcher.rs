use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use kickstart_core::NetworkConfig;

use crate::transport::{
    CurlTransport, ProgressFn, RequestProfile, ReqwestTransport, Transport,
};

/// HTTP GET with a transport fallback chain.
pub struct Fetcher {
    transports: Vec<Box<dyn Transport>>,
    metadata: RequestProfile,
    download: RequestProfile,
}

impl Fetcher {
    pub fn from_config(network: &NetworkConfig) -> Self {
        let mut transports: Vec<Box<dyn Transport>> = vec![Box::new(ReqwestTransport)];
        if network.curl_fallback {
            transports.push(Box::new(CurlTransport::default()));
        }
        Self::with_transports(transports, network)
    }

    pub fn with_transports(transports: Vec<Box<dyn Transport>>, network: &NetworkConfig) -> Self {
        if network.insecure_tls {
            tracing::warn!("TLS certificate verification is disabled for all remote requests");
        }
        Self {
            transports,
            metadata: RequestProfile {
                user_agent: network.user_agent.clone(),
                timeout: Duration::from_secs(network.metadata_timeout_secs),
                insecure_tls: network.insecure_tls,
            },
            download: RequestProfile {
                user_agent: network.download_user_agent.clone(),
                timeout: Duration::from_secs(network.download_timeout_secs),
                insecure_tls: network.insecure_tls,
            },
        }
    }

    pub fn transport_names(&self) -> Vec<&'static str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    /// Fetches a small document. Never fails: an empty body means every
    /// transport came back without data.
    pub fn fetch(&self, url: &str) -> Vec<u8> {
        for transport in &self.transports {
            match transport.get(url, &self.metadata) {
                Ok(body) if !body.is_empty() => {
                    tracing::debug!(url, transport = transport.name(), bytes = body.len(), "fetched");
                    return body;
                }
                Ok(_) => {
                    tracing::debug!(url, transport = transport.name(), "empty response");
                }
                Err(err) => {
                    tracing::debug!(url, transport = transport.name(), error = %format!("{err:#}"), "fetch failed");
                }
            }
        }
        Vec::new()
    }

    /// Streams `url` into `out`, truncating it before each transport attempt.
    /// Returns `Ok(0)` when a transport answered with an empty body and no
    /// other one produced data; otherwise the error of the last attempt.
    pub fn download_to(
        &self,
        url: &str,
        out: &mut File,
        progress: &mut ProgressFn<'_>,
    ) -> Result<u64> {
        let mut last_error = None;
        let mut answered_empty = false;
        for transport in &self.transports {
            rewind(out)?;
            match transport.download(url, out, &self.download, progress) {
                Ok(written) if written > 0 => {
                    tracing::info!(url, transport = transport.name(), bytes = written, "download finished");
                    return Ok(written);
                }
                Ok(_) => {
                    tracing::warn!(url, transport = transport.name(), "download returned no data");
                    answered_empty = true;
                }
                Err(err) => {
                    tracing::warn!(url, transport = transport.name(), error = %format!("{err:#}"), "download failed");
                    last_error = Some(err);
                }
            }
        }
        if answered_empty {
            return Ok(0);
        }
        Err(last_error.unwrap_or_else(|| anyhow!("no transport configured")))
    }
}

fn rewind(out: &mut File) -> Result<()> {
    out.set_len(0).context("failed truncating download file")?;
    out.seek(SeekFrom::Start(0))
        .context("failed rewinding download file")?;
    Ok(())
}
