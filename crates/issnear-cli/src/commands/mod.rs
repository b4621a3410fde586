pub mod config;
pub mod distance;
pub mod now;
pub mod watch;

use issnear_core::Coordinate;

pub type CommandResult = issnear_core::error::Result<()>;

/// Runtime for the commands that talk to the network.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

/// Parse `"lat,lon"` in decimal degrees.
pub fn parse_coordinate(raw: &str) -> Result<Coordinate, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{raw}'"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("latitude '{}' is not a number", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("longitude '{}' is not a number", lon.trim()))?;
    Coordinate::try_new(lat, lon).map_err(|e| e.to_string())
}
