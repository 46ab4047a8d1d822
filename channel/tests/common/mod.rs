use std::{str::FromStr, time::Duration};

use rendezvous::prelude::{Endpoint, EndpointState, Kernel, PendingKind};
use tracing_subscriber::{
    filter::{Directive, EnvFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer,
};

/// Installs a subscriber once per test binary; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer().with_test_writer().with_filter(
                EnvFilter::from_default_env()
                    .add_directive(Directive::from_str("info").expect("valid directive"))
                    .add_directive(Directive::from_str("rendezvous=trace").expect("valid directive")),
            ),
        )
        .try_init();
}

/// Yields until `endpoint` is blocked in a call of `kind`.
#[allow(dead_code)]
pub async fn wait_blocked(kernel: &Kernel, endpoint: Endpoint, kind: PendingKind) {
    let wait = async {
        loop {
            if let Some(EndpointState::Blocked { kind: current, .. }) = kernel.endpoint_state(endpoint) {
                if current == kind {
                    return;
                }
            }
            tokio::task::yield_now().await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("endpoint never blocked");
}

/// Yields until `endpoint` has `count` senders queued on it.
#[allow(dead_code)]
pub async fn wait_queued(kernel: &Kernel, endpoint: Endpoint, count: usize) {
    let wait = async {
        while kernel.queued_senders(endpoint) != Some(count) {
            tokio::task::yield_now().await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("senders never queued");
}
