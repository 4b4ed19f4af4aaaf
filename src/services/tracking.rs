//! Live tracking view
//!
//! Mount subscribes to location updates on the shared channel; each update
//! moves the map marker. Unmount (or drop) unsubscribes and tears the map
//! down. With a job location set, the view also reports straight-line
//! distance and a rough ETA.

use crate::domain::geo::{distance_km, eta_minutes};
use crate::domain::types::{LocationEvent, WorkerId};
use crate::io::map::MapSurface;
use crate::services::channel::{Channel, ChannelHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

pub const LIVE_LABEL: &str = "Live Updates Active";
pub const CONNECTING_LABEL: &str = "Connecting...";

struct TrackingState {
    map: Box<dyn MapSurface>,
    last: Option<LocationEvent>,
    updates: u64,
}

pub struct TrackingView {
    event_name: String,
    state: Arc<Mutex<TrackingState>>,
    job_location: Option<[f64; 2]>,
    /// Only follow this worker when set
    worker: Option<WorkerId>,
    channel: Option<Arc<Channel>>,
    handle: Option<ChannelHandle>,
}

impl TrackingView {
    pub fn new(map: impl MapSurface + 'static, event_name: &str) -> Self {
        let state = TrackingState { map: Box::new(map), last: None, updates: 0 };
        Self {
            event_name: event_name.to_string(),
            state: Arc::new(Mutex::new(state)),
            job_location: None,
            worker: None,
            channel: None,
            handle: None,
        }
    }

    pub fn with_job_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.job_location = Some([latitude, longitude]);
        self
    }

    pub fn with_worker(mut self, worker: impl Into<WorkerId>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    pub fn mount(&mut self, channel: Arc<Channel>) {
        let state = self.state.clone();
        let worker = self.worker.clone();
        let handle = channel.subscribe(&self.event_name, move |event: &LocationEvent| {
            if worker.as_ref().is_some_and(|w| *w != event.worker_id) {
                return;
            }
            let mut state = state.lock();
            state.map.set_marker(event.latitude, event.longitude);
            state.last = Some(event.clone());
            state.updates += 1;
        });
        info!(event = %self.event_name, endpoint = %channel.endpoint(), "tracking_mounted");
        self.handle = Some(handle);
        self.channel = Some(channel);
    }

    pub fn unmount(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        handle.close();
        self.channel = None;
        self.state.lock().map.destroy();
        debug!(event = %self.event_name, "tracking_unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.handle.is_some()
    }

    pub fn last_location(&self) -> Option<LocationEvent> {
        self.state.lock().last.clone()
    }

    pub fn updates(&self) -> u64 {
        self.state.lock().updates
    }

    pub fn distance_km(&self) -> Option<f64> {
        let job = self.job_location?;
        let last = self.state.lock().last.as_ref()?.position();
        Some(distance_km(last, job))
    }

    pub fn eta_minutes(&self) -> Option<u32> {
        self.distance_km().map(eta_minutes)
    }

    pub fn status_label(&self) -> &'static str {
        match &self.channel {
            Some(channel) if channel.is_connected() => LIVE_LABEL,
            _ => CONNECTING_LABEL,
        }
    }
}

impl Drop for TrackingView {
    fn drop(&mut self) {
        self.unmount();
    }
}
