//! Map provider seam
//!
//! Views only need to place one marker and tear the map down. The
//! placeholder surface records what it was asked to draw.

use tracing::debug;

/// New York, matching the location picker's fallback
pub const DEFAULT_CENTER: [f64; 2] = [40.7128, -74.0060];
pub const DEFAULT_ZOOM: u8 = 13;

#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub center: [f64; 2],
    pub zoom: u8,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self { center: DEFAULT_CENTER, zoom: DEFAULT_ZOOM }
    }
}

pub trait MapSurface: Send {
    fn set_marker(&mut self, latitude: f64, longitude: f64);
    fn destroy(&mut self);
}

#[derive(Debug, Clone, Default)]
pub struct PlaceholderMap {
    options: MapOptions,
    marker: Option<[f64; 2]>,
    markers_set: u64,
    destroyed: bool,
}

impl PlaceholderMap {
    pub fn marker(&self) -> Option<[f64; 2]> {
        self.marker
    }

    pub fn markers_set(&self) -> u64 {
        self.markers_set
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }
}

impl MapSurface for PlaceholderMap {
    fn set_marker(&mut self, latitude: f64, longitude: f64) {
        if self.destroyed {
            debug!("map_marker_after_destroy_ignored");
            return;
        }
        self.marker = Some([latitude, longitude]);
        self.markers_set += 1;
        debug!(latitude, longitude, "map_marker_set");
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.marker = None;
            debug!("map_destroyed");
        }
    }
}

pub fn init_map(options: MapOptions) -> PlaceholderMap {
    debug!(lat = options.center[0], lng = options.center[1], zoom = options.zoom, "map_init");
    PlaceholderMap { options, ..Default::default() }
}
