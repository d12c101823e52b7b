#![forbid(unsafe_code)]

//! End-to-end negotiation against the in-memory fake host.
//!
//! Run with: `cargo run -p syrinx-eme --example negotiate`

use std::sync::Arc;

use bytes::Bytes;
use syrinx_eme::{EmeConfig, EmeController, EmeEvent, EncryptionContext, PlaybackSignal};
use syrinx_media::{
    InitData, InitDataKind, KeySystemAccess, MediaSink,
    fake::{FakeHostOptions, FakeKeySystemAccess, FakeMediaSink},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syrinx_eme=debug".into()),
        )
        .init();

    let access = Arc::new(FakeKeySystemAccess::new(FakeHostOptions::default()));
    let sink: Arc<dyn MediaSink> = Arc::new(FakeMediaSink::new(FakeHostOptions::default()));

    let config = EmeConfig::new()
        .with_request_key_system_access({
            let access = Arc::clone(&access);
            Arc::new(move |_candidates| {
                let access = Arc::clone(&access);
                Box::pin(async move { Ok(access as Arc<dyn KeySystemAccess>) })
            })
        })
        .with_get_init_data(Arc::new(|context, _known| {
            Box::pin(async move {
                Ok(InitData::new(
                    InitDataKind::Cenc,
                    Bytes::from(format!("pssh:{}", context.codec)),
                ))
            })
        }))
        .with_get_license(Arc::new(|context, message| {
            Box::pin(async move {
                println!(
                    "license request for {} ({} bytes)",
                    context.codec,
                    message.len()
                );
                Ok(Bytes::from(format!("license:{}", context.codec)))
            })
        }));

    let controller = EmeController::new(config);
    let signals = controller.signal_sender();
    let mut events = controller.events();
    let cancel = controller.cancellation_token();
    let run = tokio::spawn(controller.run());

    signals
        .send(PlaybackSignal::MediaAttached { sink })
        .await
        .unwrap();
    signals
        .send(PlaybackSignal::ManifestParsed {
            contexts: vec![
                EncryptionContext::video("avc1.42E01E"),
                EncryptionContext::audio("mp4a.40.2"),
            ],
        })
        .await
        .unwrap();

    loop {
        match events.recv().await {
            Ok(EmeEvent::NegotiationCompleted { sessions }) => {
                println!("negotiation completed with {sessions} session(s)");
                break;
            }
            Ok(event) => println!("event: {event:?}"),
            Err(_) => break,
        }
    }

    cancel.cancel();
    let _ = run.await;
}
