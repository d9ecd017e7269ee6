//! Station directory for stream mode.
//!
//! Stations come from the remote catalog (a JSON object of name -> URL, in
//! catalog order).  When the catalog can't be fetched or parsed we install a
//! fixed two-station list so stream mode always has something to play.

use serde_json::Value;
use tracing::{info, warn};

use whisper_proto::protocol::Station;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorySource {
    Remote,
    Fallback,
}

/// Built-in stations used when the catalog is unavailable.
pub fn fallback_stations() -> Vec<Station> {
    vec![
        Station::new(
            "Smooth Jazz",
            "http://jazz-wr04.ice.infomaniak.ch/jazz-wr04-128.mp3",
        ),
        Station::new("Reggae", "http://reggae.stream.laut.fm/reggae"),
    ]
}

/// Turn a catalog body into stations.  Anything but a JSON object is a
/// parse failure; entries with a blank name or a non-string URL are skipped.
pub fn parse_catalog(value: Value) -> std::result::Result<Vec<Station>, String> {
    let Value::Object(map) = value else {
        return Err(format!("expected a JSON object, got {}", kind_of(&value)));
    };
    let stations = map
        .into_iter()
        .filter_map(|(name, url)| {
            let name = name.trim().to_string();
            match url {
                Value::String(url) if !name.is_empty() => Some(Station { name, url }),
                _ => {
                    warn!("stations: skipping catalog entry {:?}", name);
                    None
                }
            }
        })
        .collect();
    Ok(stations)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Where the cursor stands, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationInfo {
    pub station: Option<String>,
    pub index: Option<usize>,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct StationDirectory {
    stations: Vec<Station>,
    current: Option<usize>,
    source: DirectorySource,
}

impl Default for StationDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl StationDirectory {
    /// Empty until the first `load`.
    pub fn new() -> Self {
        Self {
            stations: Vec::new(),
            current: None,
            source: DirectorySource::Fallback,
        }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn source(&self) -> DirectorySource {
        self.source
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Swap in a whole new sequence; the cursor restarts at the top.
    pub fn replace(&mut self, stations: Vec<Station>, source: DirectorySource) {
        self.current = if stations.is_empty() { None } else { Some(0) };
        self.stations = stations;
        self.source = source;
    }

    /// Apply the outcome of a catalog fetch.  On failure the fallback list is
    /// installed and the error is handed back so the caller can report it.
    pub fn apply_catalog(&mut self, fetched: Result<Value>) -> Result<()> {
        let parsed = fetched.and_then(|value| {
            parse_catalog(value).map_err(|message| ClientError::Rejected {
                endpoint: "station catalog".to_string(),
                message,
            })
        });
        match parsed {
            Ok(stations) => {
                info!("stations: loaded {} from catalog", stations.len());
                self.replace(stations, DirectorySource::Remote);
                Ok(())
            }
            Err(e) => {
                warn!("stations: catalog unavailable ({}), using fallback", e);
                self.replace(fallback_stations(), DirectorySource::Fallback);
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Option<&Station> {
        self.current.and_then(|i| self.stations.get(i))
    }

    /// Step the cursor forward, wrapping at the end.
    pub fn advance(&mut self) -> Result<Station> {
        if self.stations.is_empty() {
            return Err(ClientError::EmptyDirectory);
        }
        let next = match self.current {
            Some(i) => (i + 1) % self.stations.len(),
            None => 0,
        };
        self.current = Some(next);
        Ok(self.stations[next].clone())
    }

    pub fn info(&self) -> StationInfo {
        StationInfo {
            station: self.current().map(|s| s.name.clone()),
            index: self.current,
            total: self.stations.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkCause;
    use serde_json::json;

    fn directory_of(n: usize) -> StationDirectory {
        let mut dir = StationDirectory::new();
        let stations = (0..n)
            .map(|i| Station::new(format!("s{}", i), format!("http://x/{}.mp3", i)))
            .collect();
        dir.replace(stations, DirectorySource::Remote);
        dir
    }

    #[test]
    fn test_advance_cycles_modulo_len() {
        for n in 1..=5 {
            let mut dir = directory_of(n);
            assert_eq!(dir.current_index(), Some(0));
            let mut seen = Vec::new();
            for _ in 0..(2 * n + 1) {
                dir.advance().unwrap();
                seen.push(dir.current_index().unwrap());
            }
            let expected: Vec<usize> = (1..=(2 * n + 1)).map(|k| k % n).collect();
            assert_eq!(seen, expected, "n = {}", n);
        }
    }

    #[test]
    fn test_advance_on_empty_is_noop() {
        let mut dir = StationDirectory::new();
        assert!(matches!(dir.advance(), Err(ClientError::EmptyDirectory)));
        assert_eq!(dir.current_index(), None);
        assert!(dir.current().is_none());
    }

    #[test]
    fn test_remote_catalog_single_entry() {
        let mut dir = StationDirectory::new();
        dir.apply_catalog(Ok(json!({"dayang": "https://x/d.mp3"})))
            .unwrap();
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.current().unwrap().name, "dayang");
        assert_eq!(dir.current_index(), Some(0));
        assert_eq!(dir.source(), DirectorySource::Remote);
    }

    #[test]
    fn test_catalog_keeps_order() {
        let body = r#"{"zulu":"http://z","alpha":"http://a","mike":"http://m"}"#;
        let names: Vec<String> = parse_catalog(serde_json::from_str(body).unwrap())
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn test_fetch_failure_installs_fallback() {
        let mut dir = directory_of(4);
        dir.advance().unwrap();
        let err = ClientError::network(
            "GET https://catalog",
            NetworkCause::Status {
                code: 500,
                body: String::new(),
            },
        );
        assert!(dir.apply_catalog(Err(err)).is_err());
        assert_eq!(dir.source(), DirectorySource::Fallback);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.current_index(), Some(0));
        assert_eq!(dir.current().unwrap().name, "Smooth Jazz");
    }

    #[test]
    fn test_malformed_catalog_installs_fallback() {
        let mut dir = StationDirectory::new();
        assert!(dir.apply_catalog(Ok(json!(["not", "a", "map"]))).is_err());
        assert_eq!(dir.source(), DirectorySource::Fallback);
        assert_eq!(dir.stations(), fallback_stations().as_slice());
    }

    #[test]
    fn test_bad_entries_skipped() {
        let stations = parse_catalog(json!({"ok": "http://ok", "  ": "http://blank", "num": 5}))
            .unwrap();
        assert_eq!(stations, vec![Station::new("ok", "http://ok")]);
    }

    #[test]
    fn test_empty_remote_catalog_clears_cursor() {
        let mut dir = directory_of(3);
        dir.apply_catalog(Ok(json!({}))).unwrap();
        assert!(dir.is_empty());
        assert_eq!(dir.current_index(), None);
        assert_eq!(dir.source(), DirectorySource::Remote);
        assert_eq!(
            dir.info(),
            StationInfo {
                station: None,
                index: None,
                total: 0
            }
        );
    }
}
