//! The long-lived map widget.
//!
//! [`MapWidget`] owns at most one [`MapHandle`] for the lifetime of the view.
//! The handle is created by the first [`MapWidget::initialize`] call and is
//! never torn down or rebuilt; later initialize calls hand back the existing
//! handle untouched. The handle in turn owns the tiled base layer, the
//! current center and zoom, and at most one [`Marker`], which is moved in
//! place on every coordinate update rather than recreated.
//!
//! Rendering lives in `ui.rs`; this module only holds state and the
//! Web-Mercator math the canvas needs.

use crate::config::MapConfig;
use crate::models::Coordinate;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

pub const DEFAULT_ZOOM: u8 = 12;
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 18;

/// How many tiles wide the visible viewport is.
const TILES_ACROSS: f64 = 4.0;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(u64);

/// Fixed location pin. Offsets are in icon pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerIcon {
    pub size: (u16, u16),
    /// Point of the icon that sits on the coordinate: the bottom tip.
    pub anchor: (i16, i16),
    /// Where a popup opens, relative to the anchor (above and to the left).
    pub popup_anchor: (i16, i16),
}

pub const LOCATION_ICON: MarkerIcon = MarkerIcon {
    size: (38, 38),
    anchor: (19, 38),
    popup_anchor: (-3, -38),
};

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    id: MarkerId,
    position: Coordinate,
    icon: MarkerIcon,
}

impl Marker {
    pub fn id(&self) -> MarkerId {
        self.id
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    pub fn icon(&self) -> MarkerIcon {
        self.icon
    }
}

/// Slippy-map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// Raster base layer from a `{z}/{x}/{y}` tile provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    url_template: String,
    api_key: Option<String>,
}

impl TileLayer {
    pub fn new(url_template: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url_template: url_template.into(),
            api_key,
        }
    }

    pub fn from_config(config: &MapConfig) -> Self {
        Self::new(config.tile_url_template.clone(), config.map_api_key.clone())
    }

    /// Tiles cannot load without a provider key. The layer stays attached.
    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn tile_at(&self, at: Coordinate, zoom: u8) -> TileCoord {
        let n = f64::from(1u32 << zoom);
        let max = (n as u32).saturating_sub(1);
        // Mercator is undefined at the poles.
        let lat = at.lat.clamp(-85.0511, 85.0511).to_radians();

        let x = ((at.lon + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();

        TileCoord {
            z: zoom,
            x: (x.max(0.0) as u32).min(max),
            y: (y.max(0.0) as u32).min(max),
        }
    }

    pub fn tile_url(&self, tile: TileCoord) -> String {
        self.url_template
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
            .replace("{key}", self.api_key.as_deref().unwrap_or(""))
    }
}

/// Visible bounds handed to the canvas, `[min, max]` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

/// The single live map instance.
#[derive(Debug, Clone)]
pub struct MapHandle {
    id: HandleId,
    center: Coordinate,
    zoom: u8,
    base_layer: TileLayer,
    marker: Option<Marker>,
}

impl MapHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn base_layer(&self) -> &TileLayer {
        &self.base_layer
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    /// Tile under the current center.
    pub fn center_tile(&self) -> TileCoord {
        self.base_layer.tile_at(self.center, self.zoom)
    }

    /// Lon/lat box a few tiles wide around the center. Latitude span shrinks
    /// with cos(lat) so the Mercator aspect roughly holds.
    pub fn viewport(&self) -> Viewport {
        let tile_deg = 360.0 / f64::from(1u32 << self.zoom);
        let half_lon = (tile_deg * TILES_ACROSS / 2.0).min(180.0);
        let half_lat = (half_lon * self.center.lat.to_radians().cos()).clamp(1e-6, 90.0);

        Viewport {
            x_bounds: [self.center.lon - half_lon, self.center.lon + half_lon],
            y_bounds: [
                (self.center.lat - half_lat).max(-90.0),
                (self.center.lat + half_lat).min(90.0),
            ],
        }
    }
}

/// Owner of the optional map handle.
#[derive(Debug, Clone)]
pub struct MapWidget {
    base_layer: TileLayer,
    handle: Option<MapHandle>,
}

impl MapWidget {
    pub fn new(base_layer: TileLayer) -> Self {
        Self {
            base_layer,
            handle: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<&MapHandle> {
        self.handle.as_ref()
    }

    /// Creates the map centered on `at` at [`DEFAULT_ZOOM`]. Once a handle
    /// exists this returns it unchanged, whatever `at` is.
    pub fn initialize(&mut self, at: Coordinate) -> &MapHandle {
        let base_layer = &self.base_layer;
        self.handle.get_or_insert_with(|| {
            if !base_layer.has_key() {
                warn!("Map tile provider key missing; base layer will not render tiles.");
            }
            info!("Map initialized at {} (zoom {})", at, DEFAULT_ZOOM);
            MapHandle {
                id: HandleId(next_id()),
                center: at,
                zoom: DEFAULT_ZOOM,
                base_layer: base_layer.clone(),
                marker: None,
            }
        })
    }

    /// Moves the view center, keeping the current zoom. Returns `false` when
    /// the map has not been initialized yet.
    pub fn recenter(&mut self, at: Coordinate) -> bool {
        match self.handle.as_mut() {
            Some(handle) => {
                handle.center = at;
                true
            }
            None => {
                debug!("Recenter to {} dropped: map not initialized", at);
                false
            }
        }
    }

    /// Places the marker at `at`, creating it on first use and moving it
    /// afterwards. Returns `None` when the map has not been initialized yet.
    pub fn set_marker(&mut self, at: Coordinate) -> Option<MarkerId> {
        let Some(handle) = self.handle.as_mut() else {
            debug!("Marker update to {} dropped: map not initialized", at);
            return None;
        };

        let marker = handle.marker.get_or_insert_with(|| Marker {
            id: MarkerId(next_id()),
            position: at,
            icon: LOCATION_ICON,
        });
        marker.position = at;
        Some(marker.id)
    }

    pub fn zoom_in(&mut self) -> Option<u8> {
        self.set_zoom(|z| z.saturating_add(1))
    }

    pub fn zoom_out(&mut self) -> Option<u8> {
        self.set_zoom(|z| z.saturating_sub(1))
    }

    fn set_zoom(&mut self, step: impl Fn(u8) -> u8) -> Option<u8> {
        let handle = self.handle.as_mut()?;
        handle.zoom = step(handle.zoom).clamp(MIN_ZOOM, MAX_ZOOM);
        Some(handle.zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn widget() -> MapWidget {
        MapWidget::new(TileLayer::new(
            "https://tiles.test/{z}/{x}/{y}.png?key={key}",
            Some("k".to_string()),
        ))
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut map = widget();
        let first = map.initialize(Coordinate::new(51.505, -0.09)).id();
        let second = map.initialize(Coordinate::new(40.0, -75.0)).id();

        assert_eq!(first, second);
        let handle = map.handle().unwrap();
        assert_eq!(handle.center(), Coordinate::new(51.505, -0.09));
        assert_eq!(handle.zoom(), DEFAULT_ZOOM);
        assert!(handle.marker().is_none());
    }

    #[test]
    fn test_operations_before_initialize_are_dropped() {
        let mut map = widget();
        assert!(!map.recenter(Coordinate::new(1.0, 1.0)));
        assert_eq!(map.set_marker(Coordinate::new(1.0, 1.0)), None);
        assert_eq!(map.zoom_in(), None);
        assert!(!map.is_initialized());

        // Nothing was queued for later.
        map.initialize(Coordinate::new(10.0, 10.0));
        let handle = map.handle().unwrap();
        assert_eq!(handle.center(), Coordinate::new(10.0, 10.0));
        assert!(handle.marker().is_none());
    }

    #[test]
    fn test_marker_is_moved_not_recreated() {
        let mut map = widget();
        map.initialize(Coordinate::default());

        let points = [
            Coordinate::new(40.0, -75.0),
            Coordinate::new(35.68, 139.69),
            Coordinate::new(-33.86, 151.2),
        ];
        let first = map.set_marker(points[0]).unwrap();
        for p in &points[1..] {
            assert_eq!(map.set_marker(*p), Some(first));
            assert_eq!(map.handle().unwrap().marker().unwrap().position(), *p);
        }
        assert_eq!(map.handle().unwrap().marker().unwrap().icon(), LOCATION_ICON);
    }

    #[test]
    fn test_recenter_preserves_zoom() {
        let mut map = widget();
        map.initialize(Coordinate::default());
        map.zoom_out();
        map.zoom_out();

        assert!(map.recenter(Coordinate::new(40.0, -75.0)));
        let handle = map.handle().unwrap();
        assert_eq!(handle.zoom(), DEFAULT_ZOOM - 2);
        assert_eq!(handle.center(), Coordinate::new(40.0, -75.0));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut map = widget();
        map.initialize(Coordinate::default());
        for _ in 0..30 {
            map.zoom_in();
        }
        assert_eq!(map.handle().unwrap().zoom(), MAX_ZOOM);
        for _ in 0..30 {
            map.zoom_out();
        }
        assert_eq!(map.handle().unwrap().zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_tile_math() {
        let layer = TileLayer::new("{z}/{x}/{y}?key={key}", Some("abc".to_string()));
        assert_eq!(
            layer.tile_at(Coordinate::new(0.0, 0.0), 1),
            TileCoord { z: 1, x: 1, y: 1 }
        );
        // London at zoom 12.
        let tile = layer.tile_at(Coordinate::new(51.505, -0.09), 12);
        assert_eq!(tile, TileCoord { z: 12, x: 2046, y: 1362 });
        assert_eq!(layer.tile_url(tile), "12/2046/1362?key=abc");

        // Edges stay inside the grid.
        let corner = layer.tile_at(Coordinate::new(-90.0, 180.0), 3);
        assert_eq!(corner, TileCoord { z: 3, x: 7, y: 7 });
    }

    #[test]
    fn test_missing_key_still_attaches_layer() {
        let mut map = MapWidget::new(TileLayer::new("{z}/{x}/{y}?key={key}", None));
        let handle = map.initialize(Coordinate::default());
        assert!(!handle.base_layer().has_key());
        assert!(map.recenter(Coordinate::new(1.0, 2.0)));
        assert!(map.set_marker(Coordinate::new(1.0, 2.0)).is_some());
    }

    #[test]
    fn test_viewport_is_centered() {
        let mut map = widget();
        map.initialize(Coordinate::new(0.0, 10.0));
        let vp = map.handle().unwrap().viewport();
        let tile_deg = 360.0 / 4096.0;

        assert_relative_eq!(vp.x_bounds[0], 10.0 - 2.0 * tile_deg);
        assert_relative_eq!(vp.x_bounds[1], 10.0 + 2.0 * tile_deg);
        assert_relative_eq!(vp.y_bounds[0], -2.0 * tile_deg);
        assert_relative_eq!(vp.y_bounds[1], 2.0 * tile_deg);
    }
}
