#![forbid(unsafe_code)]

//! Key provisioning: turn key-system access into media keys on the sink.

use std::sync::Arc;

use syrinx_media::{KeySystemAccess, MediaKeys, MediaSink};
use tracing::debug;

use crate::{EmeError, EmeResult};

/// Obtain media keys and ensure they are attached to the sink.
///
/// Idempotent: a sink that already carries media keys keeps them and no
/// second provisioning object is created. Either host rejection maps to
/// [`EmeError::NoKeys`].
pub async fn ensure_media_keys(
    access: &Arc<dyn KeySystemAccess>,
    sink: &Arc<dyn MediaSink>,
) -> EmeResult<Arc<dyn MediaKeys>> {
    if let Some(existing) = sink.media_keys() {
        debug!("syrinx-eme media keys already attached, reusing");
        return Ok(existing);
    }

    let keys = access
        .create_media_keys()
        .await
        .map_err(|e| EmeError::NoKeys(e.to_string()))?;

    sink.set_media_keys(Arc::clone(&keys))
        .await
        .map_err(|e| EmeError::NoKeys(e.to_string()))?;

    debug!(
        key_system = access.key_system(),
        "syrinx-eme media keys attached"
    );
    Ok(keys)
}
