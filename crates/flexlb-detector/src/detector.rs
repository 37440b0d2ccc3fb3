//! The pattern detector: samples cluster growth, classifies it, and
//! re-routes user workloads to the matching placer.

use crate::error::Result;
use crate::growth::{classify, growth_rate, scheduler_for, Trend, WorkloadPattern};
use crate::window::{GrowthSample, SampleWindow};
use flexlb_client::ApiClient;
use flexlb_core::{is_system_namespace, Deployment, Pod};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Configuration for the pattern detector
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Seconds between monitoring iterations
    pub monitor_interval: Duration,
    /// Number of samples kept in the window
    pub history_window: usize,
    /// Below this |growth rate| the pattern is stable (percent)
    pub stable_threshold: f64,
    /// Below this |growth rate| the pattern is linear (percent)
    pub linear_threshold: f64,
    /// Declared-scheduler name of the greedy placer
    pub greedy_scheduler: String,
    /// Declared-scheduler name of the refined placer
    pub refine_scheduler: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(10),
            history_window: 6,
            stable_threshold: 10.0,
            linear_threshold: 30.0,
            greedy_scheduler: "greedylb-scheduler".to_string(),
            refine_scheduler: "refinelb-scheduler".to_string(),
        }
    }
}

/// The detector's routing view: what it last classified and where new pods
/// are currently routed
#[derive(Debug, Clone, Default)]
pub struct RoutingState {
    pub current_pattern: Option<WorkloadPattern>,
    pub current_scheduler: Option<String>,
}

/// Count pods that are active from the detector's point of view: phase
/// Pending or Running, outside the system namespaces.
pub fn count_active_pods(pods: &[Pod]) -> u64 {
    pods.iter()
        .filter(|pod| {
            let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
            if is_system_namespace(namespace) {
                return false;
            }
            matches!(
                pod.status.as_ref().and_then(|s| s.phase.as_deref()),
                Some("Pending") | Some("Running")
            )
        })
        .count() as u64
}

/// The declared scheduler on a deployment's pod template, if any
pub fn template_scheduler_name(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|s| s.scheduler_name.as_deref())
}

/// Whether a deployment's pod template must be re-routed to `target`
pub fn needs_reroute(deployment: &Deployment, target: &str) -> bool {
    template_scheduler_name(deployment) != Some(target)
}

/// Strategic-merge patch body setting the pod template's scheduler
pub fn scheduler_patch(target: &str) -> serde_json::Value {
    serde_json::json!({
        "spec": {
            "template": {
                "spec": {
                    "schedulerName": target
                }
            }
        }
    })
}

/// Periodically classifies cluster growth and patches user deployments so
/// future pods are routed to the placer matching the current regime
pub struct PatternDetector {
    client: ApiClient,
    config: DetectorConfig,
    window: SampleWindow,
    routing: RoutingState,
}

impl PatternDetector {
    pub fn new(client: ApiClient, config: DetectorConfig) -> Self {
        let window = SampleWindow::new(config.history_window);
        Self {
            client,
            config,
            window,
            routing: RoutingState::default(),
        }
    }

    /// The detector's current routing view
    pub fn routing(&self) -> &RoutingState {
        &self.routing
    }

    /// Run the monitoring loop until cancelled.
    ///
    /// Iteration failures are logged and the loop resumes after the next
    /// interval; the sample window survives across failures.
    pub async fn run(&mut self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting pattern detector (interval: {:?}, window: {}, thresholds: <{}% stable, <{}% linear)",
            self.config.monitor_interval,
            self.config.history_window,
            self.config.stable_threshold,
            self.config.linear_threshold
        );

        let mut iteration = 0u64;

        loop {
            iteration += 1;
            debug!("Monitoring iteration #{}", iteration);

            if let Err(e) = self.iterate().await {
                error!("Error in monitoring loop: {}", e);
            }

            tokio::select! {
                _ = token.cancelled() => {
                    info!("Pattern detector shutting down");
                    return Ok(());
                }
                _ = sleep(self.config.monitor_interval) => {}
            }
        }
    }

    /// One monitoring iteration: sample, classify, switch if needed.
    async fn iterate(&mut self) -> Result<()> {
        // A failed list is logged by the caller and skips the sample:
        // the window only ever holds real observations.
        let pod_count = self.active_pod_count().await?;
        self.window.push(GrowthSample::now(pod_count));

        if self.window.len() < 2 {
            info!(
                "Collecting initial data... ({}/{})",
                self.window.len(),
                self.window.capacity()
            );
            return Ok(());
        }

        let (rate, trend) = growth_rate(&self.window);
        let pattern = classify(rate, self.config.stable_threshold, self.config.linear_threshold);
        let target = scheduler_for(
            pattern,
            &self.config.greedy_scheduler,
            &self.config.refine_scheduler,
        )
        .to_string();

        if self.routing.current_scheduler.as_deref() != Some(&target) {
            info!(
                "Pattern change detected: {} -> {}",
                self.routing
                    .current_pattern
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                pattern
            );
            info!(
                "Switching scheduler: {} -> {}",
                self.routing.current_scheduler.as_deref().unwrap_or("none"),
                target
            );

            let switched = self.switch_scheduler(&target).await;
            info!("Scheduler switch complete ({} deployments patched)", switched);

            // The routing state moves even when nothing was patched; the
            // next enumeration re-converges any deployment left behind.
            self.routing.current_scheduler = Some(target.clone());
            self.routing.current_pattern = Some(pattern);
        } else {
            info!("Pattern stable: {} - keeping scheduler: {}", pattern, target);
        }

        self.report(pod_count, rate, trend, pattern, &target);
        Ok(())
    }

    /// Count active pods outside the system namespaces
    async fn active_pod_count(&self) -> Result<u64> {
        let pods = self.client.list_pods(None).await?;
        let count = count_active_pods(&pods);
        debug!("Active pod count: {}", count);
        Ok(count)
    }

    /// Patch every user deployment whose pod template declares a different
    /// scheduler. Per-deployment failures are logged and enumeration
    /// continues. Returns how many deployments were patched.
    async fn switch_scheduler(&self, target: &str) -> usize {
        let deployments = match self.client.list_deployments_all_namespaces().await {
            Ok(deployments) => deployments,
            Err(e) => {
                error!("Error switching schedulers: {}", e);
                return 0;
            }
        };

        let mut switched = 0;

        for deployment in &deployments {
            let namespace = deployment.metadata.namespace.as_deref().unwrap_or("default");
            let name = match deployment.metadata.name.as_deref() {
                Some(name) => name,
                None => continue,
            };

            if is_system_namespace(namespace) {
                continue;
            }

            if !needs_reroute(deployment, target) {
                continue;
            }

            let current = template_scheduler_name(deployment).unwrap_or("default-scheduler");
            match self
                .client
                .patch_deployment(namespace, name, &scheduler_patch(target))
                .await
            {
                Ok(()) => {
                    info!(
                        "Switched deployment {}/{}: {} -> {}",
                        namespace, name, current, target
                    );
                    switched += 1;
                }
                Err(e) => {
                    error!("Failed to update deployment {}/{}: {}", namespace, name, e);
                }
            }
        }

        if switched > 0 {
            info!("Successfully switched {} deployments to {}", switched, target);
        } else {
            debug!("No deployments needed switching (all already using {})", target);
        }

        switched
    }

    fn report(
        &self,
        pod_count: u64,
        rate: f64,
        trend: Trend,
        pattern: WorkloadPattern,
        scheduler: &str,
    ) {
        info!(
            "Monitoring report: pods={}, history={:?}, growth={:+.2}% ({}), pattern={}, scheduler={}",
            pod_count,
            self.window.counts(),
            rate,
            trend,
            pattern,
            scheduler
        );
    }
}
