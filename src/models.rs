use serde::{Deserialize, Serialize};
use std::fmt;

/// Fallback center used before any lookup has succeeded.
pub const HOME_COORDINATE: Coordinate = Coordinate {
    lat: 51.505,
    lon: -0.09,
};

/// A latitude/longitude pair in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Default for Coordinate {
    fn default() -> Self {
        HOME_COORDINATE
    }
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite and inside the usual
    /// latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lat_dir = if self.lat >= 0.0 { "N" } else { "S" };
        let lon_dir = if self.lon >= 0.0 { "E" } else { "W" };
        write!(
            f,
            "{:.4}°{}, {:.4}°{}",
            self.lat.abs(),
            lat_dir,
            self.lon.abs(),
            lon_dir
        )
    }
}

/// Body returned by the IP/domain geolocation provider.
///
/// Only the fields the tracker displays are kept; the provider sends more
/// (region, postal code, AS info) which serde ignores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub ip: String,
    #[serde(default)]
    pub isp: String,
    pub location: GeoLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    /// The provider's own UTC offset guess. Superseded by the timezone lookup.
    #[serde(default)]
    pub timezone: String,
}

impl LocationRecord {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.location.lat, self.location.lng)
    }

    /// "City, Country", skipping whichever half is missing.
    pub fn place(&self) -> String {
        match (self.location.city.is_empty(), self.location.country.is_empty()) {
            (false, false) => format!("{}, {}", self.location.city, self.location.country),
            (false, true) => self.location.city.clone(),
            (true, false) => self.location.country.clone(),
            (true, true) => String::new(),
        }
    }
}

/// Body returned by the timezone-by-coordinate provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimezoneResponse {
    pub timezone: String,
}

/// What the user typed, classified into the provider's two query shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupQuery {
    IpAddress(String),
    Domain(String),
}

impl LookupQuery {
    /// Classifies a raw query. Anything that is not an exact dotted quad is
    /// sent as a domain, including things like `8.8.8.8.9`.
    pub fn classify(query: &str) -> Self {
        if is_dotted_quad(query) {
            LookupQuery::IpAddress(query.to_string())
        } else {
            LookupQuery::Domain(query.to_string())
        }
    }

    /// Returns the `(ipAddress, domain)` query parameter pair; exactly one
    /// side is non-empty.
    pub fn as_params(&self) -> (&str, &str) {
        match self {
            LookupQuery::IpAddress(ip) => (ip.as_str(), ""),
            LookupQuery::Domain(domain) => ("", domain.as_str()),
        }
    }
}

/// Four dot-separated groups of one to three ASCII digits. Group values are
/// not range checked, so `999.1.1.1` still counts.
pub fn is_dotted_quad(s: &str) -> bool {
    let groups: Vec<&str> = s.split('.').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_quad_routes_to_ip() {
        assert_eq!(
            LookupQuery::classify("8.8.8.8"),
            LookupQuery::IpAddress("8.8.8.8".to_string())
        );
        assert_eq!(LookupQuery::classify("8.8.8.8").as_params(), ("8.8.8.8", ""));
    }

    #[test]
    fn test_domain_and_five_groups_route_to_domain() {
        assert_eq!(
            LookupQuery::classify("example.com"),
            LookupQuery::Domain("example.com".to_string())
        );
        assert_eq!(
            LookupQuery::classify("8.8.8.8.9"),
            LookupQuery::Domain("8.8.8.8.9".to_string())
        );
        assert_eq!(LookupQuery::classify("example.com").as_params(), ("", "example.com"));
    }

    #[test]
    fn test_dotted_quad_edges() {
        assert!(is_dotted_quad("999.0.0.1"));
        assert!(!is_dotted_quad("1.2.3"));
        assert!(!is_dotted_quad("1.2.3.4444"));
        assert!(!is_dotted_quad("1..3.4"));
        assert!(!is_dotted_quad("a.b.c.d"));
        assert!(!is_dotted_quad("١.٢.٣.٤"));
        assert!(!is_dotted_quad(""));
    }

    #[test]
    fn test_record_parses_provider_body() {
        let body = r#"{
            "ip": "93.184.216.34",
            "isp": "EdgeCast",
            "location": {
                "country": "US",
                "region": "Pennsylvania",
                "city": "Norristown",
                "lat": 40.0,
                "lng": -75.0,
                "postalCode": "",
                "timezone": "-05:00"
            },
            "as": { "asn": 15133 }
        }"#;
        let record: LocationRecord = serde_json::from_str(body).unwrap();
        assert_eq!(record.ip, "93.184.216.34");
        assert_eq!(record.coordinate(), Coordinate::new(40.0, -75.0));
        assert_eq!(record.place(), "Norristown, US");
        assert_eq!(record.location.timezone, "-05:00");
    }

    #[test]
    fn test_record_without_location_is_rejected() {
        let body = r#"{ "ip": "1.1.1.1", "isp": "Cloudflare" }"#;
        assert!(serde_json::from_str::<LocationRecord>(body).is_err());
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(HOME_COORDINATE.is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_coordinate_display() {
        assert_eq!(Coordinate::new(40.0, -75.0).to_string(), "40.0000°N, 75.0000°W");
    }
}
