#![forbid(unsafe_code)]

//! Per-session license exchange: generate a request, forward the session
//! message to the license source, apply the returned license.

use bytes::Bytes;
use syrinx_media::InitData;
use tracing::{debug, trace};

use crate::{EmeError, EmeResult, config::EmeConfig, registry::SessionContext};

/// Runs the request/response protocol for one session at a time.
pub struct LicenseExchange {
    config: EmeConfig,
}

impl LicenseExchange {
    pub fn new(config: EmeConfig) -> Self {
        Self { config }
    }

    /// Resolve initialization data for one context.
    ///
    /// Data captured from the host's encrypted signal is reused for every
    /// context; the injected resolver is only consulted without it.
    async fn resolve_init_data(
        &self,
        pair: &SessionContext,
        captured: Option<&InitData>,
    ) -> EmeResult<InitData> {
        if let Some(init_data) = captured {
            trace!(kind = %init_data.kind, "syrinx-eme reusing captured init data");
            return Ok(init_data.clone());
        }

        let resolve = self.config.get_init_data_fn()?;
        resolve(pair.context.clone(), None)
            .await
            .map_err(|e| EmeError::NoInitData(e.to_string()))
    }

    /// Run the full exchange for one session.
    ///
    /// The message subscription is taken out *before* the request is
    /// generated, so the session message cannot fire before a listener
    /// exists. On a generation failure the subscription is dropped with this
    /// future and nothing keeps waiting.
    pub async fn run(&self, pair: &SessionContext, captured: Option<&InitData>) -> EmeResult<()> {
        let init_data = self.resolve_init_data(pair, captured).await?;

        let mut messages = pair.session.messages();

        pair.session
            .generate_request(&init_data)
            .await
            .map_err(|e| EmeError::GenerateRequestFailed(e.to_string()))?;

        trace!(codec = %pair.context.codec, "syrinx-eme license request generated");

        let message: Bytes = messages
            .recv()
            .await
            .map_err(|e| EmeError::LicenseRequestFailed(format!("session message channel: {e}")))?;

        let fetch_license = self.config.get_license_fn()?;
        let license = fetch_license(pair.context.clone(), message)
            .await
            .map_err(|e| EmeError::LicenseRequestFailed(e.to_string()))?;

        pair.session
            .update(&license)
            .await
            .map_err(|e| EmeError::LicenseUpdateFailed(e.to_string()))?;

        debug!(
            kind = pair.context.kind.as_str(),
            codec = %pair.context.codec,
            "syrinx-eme license applied"
        );
        Ok(())
    }
}
