//! The long-running watch/placement loop shared by both placers.
//!
//! The loop is an explicit state machine so cancellation is observable at
//! every suspension point and no control flow rides on error unwinding:
//!
//! - `Watching`: the stream is open; each ADDED/MODIFIED event for a
//!   claimable pod triggers a synchronous placement attempt before the next
//!   event is read (FIFO within the stream).
//! - `Reconnecting`: the stream expired or closed; re-subscribe immediately
//!   with fresh list+watch semantics so unbound pods are re-emitted.
//! - `Backoff`: transport or API failure; fixed delay, then watch again.
//! - `Shutdown`: cancellation observed; the loop returns.

use crate::error::{Result, SchedulerError};
use crate::placer::{is_claimable, place, Placer};
use flexlb_client::{ApiClient, ClientError};
use flexlb_core::WatchEventType;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Configuration for the placement loop
#[derive(Debug, Clone)]
pub struct PlacementLoopConfig {
    /// Delay before re-watching after a transport error
    pub error_backoff: Duration,
}

impl Default for PlacementLoopConfig {
    fn default() -> Self {
        Self {
            error_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Watching,
    Reconnecting,
    Backoff,
    Shutdown,
}

/// Map a stream error to the next loop state
fn state_after_stream_error(error: &ClientError) -> LoopState {
    if error.is_stream_expired() {
        LoopState::Reconnecting
    } else {
        LoopState::Backoff
    }
}

/// Watches for pending pods claimed by one placer and binds them
pub struct PlacementLoop<P: Placer> {
    client: ApiClient,
    placer: P,
    config: PlacementLoopConfig,
}

impl<P: Placer> PlacementLoop<P> {
    pub fn new(client: ApiClient, placer: P, config: PlacementLoopConfig) -> Self {
        Self {
            client,
            placer,
            config,
        }
    }

    /// Run until cancelled.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting to watch for pods with schedulerName={}",
            self.placer.name()
        );

        let selector = format!("spec.schedulerName={},spec.nodeName=", self.placer.name());
        let mut resource_version: Option<String> = None;
        let mut state = LoopState::Watching;

        loop {
            match state {
                LoopState::Shutdown => {
                    info!("Placement loop for {} shutting down", self.placer.name());
                    return Ok(());
                }
                LoopState::Reconnecting => {
                    // Fresh list+watch re-emits every unbound pod
                    resource_version = None;
                    state = LoopState::Watching;
                }
                LoopState::Backoff => {
                    tokio::select! {
                        _ = token.cancelled() => state = LoopState::Shutdown,
                        _ = sleep(self.config.error_backoff) => state = LoopState::Watching,
                    }
                }
                LoopState::Watching => {
                    state = self
                        .watch_once(&selector, &mut resource_version, &token)
                        .await;
                }
            }
        }
    }

    /// Open one watch subscription and consume it to completion.
    async fn watch_once(
        &self,
        selector: &str,
        resource_version: &mut Option<String>,
        token: &CancellationToken,
    ) -> LoopState {
        let subscribe = tokio::select! {
            _ = token.cancelled() => return LoopState::Shutdown,
            result = self.client.watch_pods(selector, resource_version.as_deref()) => result,
        };

        let mut stream = match subscribe {
            Ok(stream) => stream,
            Err(e) => {
                if e.is_stream_expired() {
                    warn!("Watch expired, restarting...");
                } else {
                    error!("Failed to subscribe to pod watch: {}", e);
                }
                return state_after_stream_error(&e);
            }
        };

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => return LoopState::Shutdown,
                event = stream.next_event() => event,
            };

            match event {
                Ok(Some(event)) => {
                    if let Some(version) = stream.resource_version() {
                        *resource_version = Some(version.to_string());
                    }

                    if !matches!(
                        event.event_type,
                        WatchEventType::Added | WatchEventType::Modified
                    ) {
                        continue;
                    }

                    let pod = event.object;
                    if !is_claimable(&pod, self.placer.name()) {
                        continue;
                    }

                    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
                    let pod_name = pod.metadata.name.as_deref().unwrap_or("unknown");
                    info!("Detected unscheduled pod: {}/{}", namespace, pod_name);

                    // Synchronous: the stream is not advanced until this
                    // pod's bind attempt has returned.
                    if let Err(e) = place(&self.placer, &self.client, &pod).await {
                        match e {
                            SchedulerError::NoSchedulableNode { .. } => {
                                warn!("{}; pod stays pending", e);
                            }
                            other => {
                                error!("Failed to schedule pod {}/{}: {}", namespace, pod_name, other);
                            }
                        }
                    }
                }
                Ok(None) => {
                    warn!("Watch stream closed by server, re-subscribing");
                    return LoopState::Reconnecting;
                }
                Err(e) => {
                    if e.is_stream_expired() {
                        warn!("Watch expired, restarting...");
                    } else {
                        error!("API error in watch loop: {}", e);
                    }
                    return state_after_stream_error(&e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_expired_reconnects_without_backoff() {
        assert_eq!(
            state_after_stream_error(&ClientError::StreamExpired),
            LoopState::Reconnecting
        );
    }

    #[test]
    fn test_transport_error_backs_off() {
        assert_eq!(
            state_after_stream_error(&ClientError::transport("connection reset")),
            LoopState::Backoff
        );
        assert_eq!(
            state_after_stream_error(&ClientError::api(500, "boom")),
            LoopState::Backoff
        );
    }

    /// Cancellation wins immediately even while the subscribe attempt is
    /// failing against an unreachable server.
    #[tokio::test]
    async fn test_run_shuts_down_on_cancel() {
        use crate::greedy::GreedyPlacer;

        let client = ApiClient::new("http://127.0.0.1:6443");
        let placement_loop = PlacementLoop::new(
            client,
            GreedyPlacer::default(),
            PlacementLoopConfig {
                error_backoff: Duration::from_millis(10),
            },
        );

        let token = CancellationToken::new();
        token.cancel();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            placement_loop.run(token),
        )
        .await
        .expect("loop must observe cancellation promptly");
        assert!(result.is_ok());
    }
}
