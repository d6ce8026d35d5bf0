//! The location coordinator.
//!
//! [`LocationCoordinator`] drives the lookup pipeline:
//!
//! 1. [`submit_query`](LocationCoordinator::submit_query) classifies the
//!    input and spawns a geolocation request.
//! 2. The result arrives as [`Event::GeoResolved`]. On success the record is
//!    replaced wholesale and the coordinate changes, which runs
//!    [`on_coordinate_changed`](LocationCoordinator::on_coordinate_changed).
//! 3. That hook moves the map and marker, then spawns a timezone request
//!    whose result arrives as [`Event::TimezoneResolved`].
//!
//! Every request carries a generation number. A response is applied only if
//! nothing newer has been issued since; older ones are dropped on arrival.
//! Requests themselves are never cancelled.

use crate::api::{GeoLookup, TimezoneLookup};
use crate::error::LookupError;
use crate::events::Event;
use crate::map::MapWidget;
use crate::models::{Coordinate, LocationRecord, LookupQuery};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

/// The four text fields shown above the map. Empty strings mean "nothing yet".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationDisplay {
    pub ip: String,
    pub location: String,
    pub timezone: String,
    pub isp: String,
}

pub struct LocationCoordinator {
    geo: Arc<dyn GeoLookup>,
    timezone: Arc<dyn TimezoneLookup>,
    tx: UnboundedSender<Event>,
    map: MapWidget,

    coordinate: Coordinate,
    record: Option<LocationRecord>,
    timezone_label: Option<String>,
    loading: bool,
    last_error: Option<String>,
    last_success: Option<DateTime<Local>>,

    geo_generation: u64,
    coordinate_generation: u64,
}

impl LocationCoordinator {
    pub fn new(
        geo: Arc<dyn GeoLookup>,
        timezone: Arc<dyn TimezoneLookup>,
        map: MapWidget,
        home: Coordinate,
        tx: UnboundedSender<Event>,
    ) -> Self {
        Self {
            geo,
            timezone,
            tx,
            map,
            coordinate: home,
            record: None,
            timezone_label: None,
            loading: false,
            last_error: None,
            last_success: None,
            geo_generation: 0,
            coordinate_generation: 0,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn record(&self) -> Option<&LocationRecord> {
        self.record.as_ref()
    }

    pub fn timezone_label(&self) -> Option<&str> {
        self.timezone_label.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_success(&self) -> Option<DateTime<Local>> {
        self.last_success
    }

    pub fn map(&self) -> &MapWidget {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MapWidget {
        &mut self.map
    }

    /// Creates the map at the current coordinate and runs the coordinate
    /// hook once, so the home location gets a marker and a timezone.
    pub fn mount(&mut self) {
        self.map.initialize(self.coordinate);
        self.on_coordinate_changed();
    }

    /// Starts a lookup for `query`. Returns `false` without doing anything
    /// when the query is blank or a lookup is already loading.
    pub fn submit_query(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }
        if self.loading {
            debug!("Ignoring query {:?} while a lookup is loading", query);
            return false;
        }

        let lookup = LookupQuery::classify(query);
        info!("Looking up {:?}", lookup);

        self.loading = true;
        self.geo_generation += 1;
        let generation = self.geo_generation;
        let geo = Arc::clone(&self.geo);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = geo.lookup(&lookup).await;
            // The receiver only goes away on shutdown.
            let _ = tx.send(Event::GeoResolved { generation, result });
        });
        true
    }

    /// Routes lookup results to their handlers; other events are ignored.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::GeoResolved { generation, result } => self.on_geo_resolved(generation, result),
            Event::TimezoneResolved { generation, result } => {
                self.on_timezone_resolved(generation, result)
            }
            _ => {}
        }
    }

    pub fn on_geo_resolved(&mut self, generation: u64, result: Result<LocationRecord, LookupError>) {
        if generation != self.geo_generation {
            debug!(
                "Dropping stale geolocation result {} (latest {})",
                generation, self.geo_generation
            );
            return;
        }
        self.loading = false;

        match result {
            Ok(record) => {
                info!("Resolved {} to {}", record.ip, record.coordinate());
                self.coordinate = record.coordinate();
                self.record = Some(record);
                self.last_error = None;
                self.last_success = Some(Local::now());
                self.on_coordinate_changed();
            }
            Err(e) => {
                error!("Error fetching IP geolocation data: {}", e);
                self.last_error = Some(format!("Location not found: {}", e));
            }
        }
    }

    /// Runs after every coordinate change: moves the view and marker, then
    /// requests the timezone for the new coordinate. The two are not ordered
    /// against each other.
    pub fn on_coordinate_changed(&mut self) {
        let at = self.coordinate;
        self.map.recenter(at);
        self.map.set_marker(at);

        self.coordinate_generation += 1;
        let generation = self.coordinate_generation;
        let timezone = Arc::clone(&self.timezone);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = timezone.timezone(at).await;
            let _ = tx.send(Event::TimezoneResolved { generation, result });
        });
    }

    pub fn on_timezone_resolved(&mut self, generation: u64, result: Result<String, LookupError>) {
        if generation != self.coordinate_generation {
            debug!(
                "Dropping stale timezone result {} (latest {})",
                generation, self.coordinate_generation
            );
            return;
        }

        match result {
            Ok(label) => {
                info!("Timezone for {} is {}", self.coordinate, label);
                self.timezone_label = Some(label);
            }
            Err(e) => error!("Error fetching timezone data: {}", e),
        }
    }

    pub fn display(&self) -> LocationDisplay {
        let Some(record) = &self.record else {
            return LocationDisplay {
                timezone: self.timezone_label.clone().unwrap_or_default(),
                ..LocationDisplay::default()
            };
        };

        LocationDisplay {
            ip: record.ip.clone(),
            location: record.place(),
            timezone: self
                .timezone_label
                .clone()
                .unwrap_or_else(|| record.location.timezone.clone()),
            isp: record.isp.clone(),
        }
    }
}
