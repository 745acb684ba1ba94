// ── SmartPower engine ──
//
// Ties the cache, lock, subscription table, and gateway together. Every
// controller conversation runs under `ControllerLock`; reads are served
// lock-free only from a fresh cache entry. Each watched topic gets one
// spawned poll loop that stops itself once the topic has no subscribers.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use unipower_api::legacy::models::OverridePatch;

use crate::cache::{CacheKey, StatusCache};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::gateway::ControllerGateway;
use crate::lock::{ControllerLock, LockScope};
use crate::model::{
    Device, DeviceStatus, EntityKind, EntityStatus, Outlet, OutletAction, PoeAction, PoeMode,
    RelayState, Site, SwitchPort,
};
use crate::normalize::normalize_device;
use crate::subscription::{SubscriptionId, SubscriptionTable, Topic};

/// The device-status synchronization engine for one controller.
///
/// Cheap to clone; clones share all state.
pub struct SmartPower<G: ControllerGateway> {
    inner: Arc<Inner<G>>,
}

impl<G: ControllerGateway> Clone for SmartPower<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<G> {
    gateway: G,
    config: EngineConfig,
    cache: StatusCache,
    lock: ControllerLock,
    subscriptions: SubscriptionTable,
    cancel: CancellationToken,
}

impl<G: ControllerGateway> SmartPower<G> {
    pub fn new(gateway: G, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                cache: StatusCache::new(config.status_cache_ttl),
                config,
                lock: ControllerLock::new(),
                subscriptions: SubscriptionTable::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Drop every subscription. Running poll loops notice on their next
    /// tick and exit.
    pub fn reset(&self) {
        debug!(
            topics = self.inner.subscriptions.topic_count(),
            "clearing all status subscriptions"
        );
        self.inner.subscriptions.clear();
    }

    /// Stop every poll loop now and end the controller session.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.reset();
        self.inner.cancel.cancel();
        let _guard = self.inner.lock.acquire().await;
        self.inner.gateway.logout().await
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn get_sites(&self) -> Result<Vec<Site>, CoreError> {
        let _guard = self.inner.lock.acquire().await;
        self.inner.gateway.login().await?;
        let sites = self.inner.gateway.list_sites().await?;
        Ok(sites.into_iter().map(Site::from).collect())
    }

    /// Every power device in `site`.
    pub async fn get_device_statuses(&self, site: &str) -> Result<Vec<DeviceStatus>, CoreError> {
        let statuses = self
            .inner
            .fetch_statuses(site, None, LockScope::Acquire)
            .await?;
        Ok(statuses.as_ref().clone())
    }

    /// Current status of one device. Fails with `NotFound` unless the
    /// controller returns exactly one match.
    pub async fn get_device_status(&self, device: &Device) -> Result<DeviceStatus, CoreError> {
        self.inner.device_status(device, LockScope::Acquire).await
    }

    pub async fn get_outlet_status(
        &self,
        device: &Device,
        index: u32,
    ) -> Result<Outlet, CoreError> {
        let status = self.get_device_status(device).await?;
        status
            .outlet(index)
            .cloned()
            .ok_or_else(|| entity_not_found(EntityKind::Outlet, device, index))
    }

    pub async fn get_port_status(
        &self,
        device: &Device,
        index: u32,
    ) -> Result<SwitchPort, CoreError> {
        let status = self.get_device_status(device).await?;
        status
            .port(index)
            .cloned()
            .ok_or_else(|| entity_not_found(EntityKind::Port, device, index))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Switch one outlet's relay. Every sibling outlet's override is
    /// rewritten with its last observed relay state; override records with
    /// no live outlet are written back unchanged.
    pub async fn command_outlet(
        &self,
        device: &Device,
        index: u32,
        action: OutletAction,
    ) -> Result<(), CoreError> {
        let inner = &self.inner;
        let guard = inner.lock.acquire().await;
        inner.gateway.login().await?;

        let status = inner.device_status(device, LockScope::Held(&guard)).await?;
        if status.outlet(index).is_none() {
            return Err(entity_not_found(EntityKind::Outlet, device, index));
        }

        let mut overrides: Vec<_> = status
            .outlets
            .iter()
            .map(|outlet| {
                let mut record = outlet.override_.clone();
                record.relay_state = if outlet.index == index {
                    action.relay_on()
                } else {
                    outlet.relay_state == RelayState::On
                };
                record
            })
            .collect();
        // The controller replaces the whole list; keep records with no live outlet.
        overrides.extend(
            status
                .outlet_overrides
                .iter()
                .filter(|raw| status.outlet(raw.index).is_none())
                .cloned(),
        );

        let patch = OverridePatch {
            outlet_overrides: Some(overrides),
            port_overrides: None,
        };
        inner.push(device, &patch).await?;
        info!(device = %device.name, index, %action, "outlet commanded");
        Ok(())
    }

    /// Set one port's PoE mode. Sibling ports echo their last observed
    /// mode; a sibling whose mode is unrecognised keeps its override value.
    /// Records for ports that are not PoE-controllable pass through as-is.
    pub async fn command_port(
        &self,
        device: &Device,
        index: u32,
        action: PoeAction,
    ) -> Result<(), CoreError> {
        let inner = &self.inner;
        let guard = inner.lock.acquire().await;
        inner.gateway.login().await?;

        let status = inner.device_status(device, LockScope::Held(&guard)).await?;
        if status.port(index).is_none() {
            return Err(entity_not_found(EntityKind::Port, device, index));
        }

        let mut overrides: Vec<_> = status
            .ports
            .iter()
            .map(|port| {
                let mut record = port.override_.clone();
                let mode = if port.index == index {
                    PoeMode::from(action)
                } else {
                    port.poe_mode
                };
                if let Some(wire) = mode.as_wire() {
                    record.poe_mode = Some(wire.to_owned());
                }
                record
            })
            .collect();
        // Non-PoE and unpowerable ports keep their records (profiles, names).
        overrides.extend(
            status
                .port_overrides
                .iter()
                .filter(|raw| status.port(raw.port_idx).is_none())
                .cloned(),
        );

        let patch = OverridePatch {
            outlet_overrides: None,
            port_overrides: Some(overrides),
        };
        inner.push(device, &patch).await?;
        info!(device = %device.name, index, %action, "port commanded");
        Ok(())
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Watch one outlet or port. The first subscriber of a topic starts
    /// its poll loop (first poll immediately); every poll result is
    /// delivered to every current subscriber, changed or not.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(
        &self,
        device: &Device,
        kind: EntityKind,
        index: u32,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(&EntityStatus) + Send + Sync + 'static,
    {
        let topic = Topic {
            device_id: device.id.clone(),
            kind,
            index,
        };
        let (id, started) = self
            .inner
            .subscriptions
            .subscribe(topic.clone(), Arc::new(handler));
        debug!(%topic, mac = %device.mac, subscription = %id, "status subscription added");

        if let Some(epoch) = started {
            tokio::spawn(poll_topic(
                Arc::clone(&self.inner),
                device.clone(),
                topic,
                epoch,
            ));
        }
        id
    }

    /// Remove one subscription. Its poll loop, if now idle, exits at the
    /// top of its next tick.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.subscriptions.unsubscribe(id);
        debug!(subscription = %id, removed, "status subscription removed");
        removed
    }

    pub fn subscriber_count(&self, device: &Device, kind: EntityKind, index: u32) -> usize {
        self.inner.subscriptions.subscriber_count(&Topic {
            device_id: device.id.clone(),
            kind,
            index,
        })
    }
}

impl<G: ControllerGateway> Inner<G> {
    /// Cached snapshot for a site or one device, fetching on a miss.
    async fn fetch_statuses(
        &self,
        site: &str,
        device: Option<&Device>,
        scope: LockScope<'_>,
    ) -> Result<Arc<Vec<DeviceStatus>>, CoreError> {
        let key = device.map_or_else(
            || CacheKey::Site(site.to_owned()),
            |d| CacheKey::Device(d.id.clone()),
        );
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let _guard = self.lock.enter(scope).await;
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        debug!(site, ?key, "fetching status from controller");
        self.gateway.login().await?;
        let mac = device.map(|d| d.mac.as_str());
        let raw = self.gateway.list_devices(site, mac).await?;

        let fetched_at = Utc::now();
        let statuses = raw
            .into_iter()
            .filter(|d| mac.is_none_or(|m| d.mac.eq_ignore_ascii_case(m)))
            .filter_map(|d| normalize_device(d, Some(site), fetched_at))
            .collect();
        Ok(self.cache.set(key, statuses))
    }

    async fn device_status(
        &self,
        device: &Device,
        scope: LockScope<'_>,
    ) -> Result<DeviceStatus, CoreError> {
        let statuses = self
            .fetch_statuses(device.site_or_default(), Some(device), scope)
            .await?;
        match statuses.as_slice() {
            [only] => Ok(only.clone()),
            _ => Err(CoreError::not_found("device", device.id.clone())),
        }
    }

    async fn entity_status(
        &self,
        device: &Device,
        kind: EntityKind,
        index: u32,
    ) -> Result<EntityStatus, CoreError> {
        let status = self.device_status(device, LockScope::Acquire).await?;
        let entity = match kind {
            EntityKind::Outlet => status.outlet(index).cloned().map(EntityStatus::Outlet),
            EntityKind::Port => status.port(index).cloned().map(EntityStatus::Port),
        };
        entity.ok_or_else(|| entity_not_found(kind, device, index))
    }

    /// Write overrides, then drop both cache scopes the device lives in.
    /// Caller holds the lock.
    async fn push(&self, device: &Device, patch: &OverridePatch) -> Result<(), CoreError> {
        let site = device.site_or_default();
        self.gateway.push_overrides(site, &device.id, patch).await?;
        self.cache.invalidate(&CacheKey::Device(device.id.clone()));
        self.cache.invalidate(&CacheKey::Site(site.to_owned()));
        Ok(())
    }
}

fn entity_not_found(kind: EntityKind, device: &Device, index: u32) -> CoreError {
    CoreError::not_found(&kind.to_string(), format!("{}.{index}", device.mac))
}

/// Poll loop for one topic. Checks liveness at the top of every tick, so
/// an unsubscribe only prevents the next poll.
async fn poll_topic<G: ControllerGateway>(
    inner: Arc<Inner<G>>,
    device: Device,
    topic: Topic,
    epoch: u64,
) {
    let interval = inner.config.status_poll_interval;
    loop {
        if !inner.subscriptions.is_live(&topic, epoch) {
            debug!(%topic, "no status subscriptions; polling stopped");
            return;
        }

        debug!(%topic, mac = %device.mac, "polling status");
        match inner.entity_status(&device, topic.kind, topic.index).await {
            Ok(status) => {
                inner.subscriptions.publish(&topic, &status);
            }
            Err(e) if e.is_transient() => {
                warn!(%topic, error = %e, "status poll failed; will retry");
            }
            Err(e) => {
                error!(%topic, error = %e, "status poll failed");
            }
        }

        tokio::select! {
            () = inner.cancel.cancelled() => {
                debug!(%topic, "engine shut down; polling stopped");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }
    }
}
