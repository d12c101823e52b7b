#![forbid(unsafe_code)]

//! Host capability boundary for encrypted media playback.
//!
//! A host that can play protected content exposes a capability triad:
//! key-system access, media keys, and key sessions. This crate models that
//! triad (plus the media sink the keys attach to) as opaque, externally-owned
//! resources behind object-safe traits, so the negotiation logic in
//! `syrinx-eme` stays portable across host environments.
//!
//! The [`fake`] module provides an in-memory host implementation with
//! scripted failures, used by tests across the workspace.

pub mod error;
pub mod fake;
pub mod init_data;
pub mod keys;
pub mod sink;

pub use error::MediaError;
pub use init_data::{InitData, InitDataKind};
pub use keys::{CodecCapability, KeySession, KeySystemAccess, KeySystemConfig, MediaKeys};
pub use sink::{EncryptedSignal, MediaSink};
