#![forbid(unsafe_code)]

use std::{fmt, sync::Arc};

use bytes::Bytes;
use futures::future::BoxFuture;
use syrinx_media::{InitData, KeySystemAccess, KeySystemConfig, MediaError};
use tokio::sync::broadcast;

use crate::{EmeError, EmeResult, context::EncryptionContext, events::EmeEvent};

/// Host capability query: given candidate configurations, grant access to a
/// supported key system.
pub type RequestKeySystemAccessFn = Arc<
    dyn Fn(Vec<KeySystemConfig>) -> BoxFuture<'static, Result<Arc<dyn KeySystemAccess>, MediaError>>
        + Send
        + Sync,
>;

/// Per-context initialization-data resolver. Receives init data already
/// captured from the host's encrypted signal, when any.
pub type GetInitDataFn = Arc<
    dyn Fn(EncryptionContext, Option<InitData>) -> BoxFuture<'static, Result<InitData, MediaError>>
        + Send
        + Sync,
>;

/// License source: given a context and an outgoing session message, return
/// license bytes.
pub type GetLicenseFn = Arc<
    dyn Fn(EncryptionContext, Bytes) -> BoxFuture<'static, Result<Bytes, MediaError>> + Send + Sync,
>;

/// Configuration for decryption negotiation.
///
/// The injected functions are validated lazily: an unset function surfaces
/// [`EmeError::NotConfigured`] when it is first needed, not at construction.
#[derive(Clone)]
pub struct EmeConfig {
    /// Master switch; when off the negotiation never starts.
    pub enabled: bool,
    /// Wait for the host's encrypted signal instead of starting right after
    /// manifest parsing.
    pub init_data_in_fragments: bool,
    /// Collapse all encryption contexts onto one shared session/license.
    pub reuse_license: bool,
    /// Host capability query.
    pub request_key_system_access: Option<RequestKeySystemAccessFn>,
    /// Initialization-data resolver, consulted per context when the host
    /// never flagged the content as encrypted.
    pub get_init_data: Option<GetInitDataFn>,
    /// External license source.
    pub get_license: Option<GetLicenseFn>,
    /// Events broadcast sender (optional - if not provided, one is created internally).
    pub events_tx: Option<broadcast::Sender<EmeEvent>>,
    /// Capacity of the events broadcast channel (used when `events_tx` is not provided).
    pub events_channel_capacity: usize,
    /// Capacity of the inbound signal channel.
    pub signal_channel_capacity: usize,
}

impl Default for EmeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            init_data_in_fragments: false,
            reuse_license: false,
            request_key_system_access: None,
            get_init_data: None,
            get_license: None,
            events_tx: None,
            events_channel_capacity: 32,
            signal_channel_capacity: 16,
        }
    }
}

impl fmt::Debug for EmeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmeConfig")
            .field("enabled", &self.enabled)
            .field("init_data_in_fragments", &self.init_data_in_fragments)
            .field("reuse_license", &self.reuse_license)
            .field(
                "request_key_system_access",
                &self
                    .request_key_system_access
                    .as_ref()
                    .map(|_| "RequestKeySystemAccessFn"),
            )
            .field(
                "get_init_data",
                &self.get_init_data.as_ref().map(|_| "GetInitDataFn"),
            )
            .field(
                "get_license",
                &self.get_license.as_ref().map(|_| "GetLicenseFn"),
            )
            .field("events_channel_capacity", &self.events_channel_capacity)
            .field("signal_channel_capacity", &self.signal_channel_capacity)
            .finish()
    }
}

impl EmeConfig {
    /// Create default config with negotiation enabled.
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Set the master switch.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Defer negotiation until the host's encrypted signal fires.
    pub fn with_init_data_in_fragments(mut self, wait: bool) -> Self {
        self.init_data_in_fragments = wait;
        self
    }

    /// Share one session/license across all encryption contexts.
    pub fn with_reuse_license(mut self, reuse: bool) -> Self {
        self.reuse_license = reuse;
        self
    }

    /// Set the host capability query.
    pub fn with_request_key_system_access(mut self, request: RequestKeySystemAccessFn) -> Self {
        self.request_key_system_access = Some(request);
        self
    }

    /// Set the initialization-data resolver.
    pub fn with_get_init_data(mut self, resolve: GetInitDataFn) -> Self {
        self.get_init_data = Some(resolve);
        self
    }

    /// Set the license source.
    pub fn with_get_license(mut self, fetch: GetLicenseFn) -> Self {
        self.get_license = Some(fetch);
        self
    }

    /// Set the events broadcast sender.
    pub fn with_events(mut self, events_tx: broadcast::Sender<EmeEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Set the events broadcast channel capacity.
    pub fn with_events_channel_capacity(mut self, capacity: usize) -> Self {
        self.events_channel_capacity = capacity;
        self
    }

    /// Set the inbound signal channel capacity.
    pub fn with_signal_channel_capacity(mut self, capacity: usize) -> Self {
        self.signal_channel_capacity = capacity;
        self
    }

    pub(crate) fn request_key_system_access_fn(&self) -> EmeResult<RequestKeySystemAccessFn> {
        self.request_key_system_access
            .clone()
            .ok_or(EmeError::NotConfigured("request_key_system_access"))
    }

    pub(crate) fn get_init_data_fn(&self) -> EmeResult<GetInitDataFn> {
        self.get_init_data
            .clone()
            .ok_or(EmeError::NotConfigured("get_init_data"))
    }

    pub(crate) fn get_license_fn(&self) -> EmeResult<GetLicenseFn> {
        self.get_license
            .clone()
            .ok_or(EmeError::NotConfigured("get_license"))
    }
}
