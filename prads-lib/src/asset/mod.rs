//! In-memory asset store (spec.md §4.G): deduplicated by `(service, ip,
//! fingerprint)`, printing a line exactly once per key over its lifetime.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Arp,
    Syn,
    SynAck,
    Icmp,
    Udp,
    ServiceTcp,
    ServiceUdp,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceKind::Arp => "ARP",
            ServiceKind::Syn => "SYN",
            ServiceKind::SynAck => "SYNACK",
            ServiceKind::Icmp => "ICMP",
            ServiceKind::Udp => "UDP",
            ServiceKind::ServiceTcp => "SERVICE_TCP",
            ServiceKind::ServiceUdp => "SERVICE_UDP",
        };
        write!(f, "{s}")
    }
}

/// Key an asset is deduplicated on (spec.md §3: distinct fingerprints on
/// one IP coexist).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub service: ServiceKind,
    pub ip: Ipv4Addr,
    pub fp: String,
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.service, self.ip, self.fp)
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub key: AssetKey,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub mac: Option<String>,
    pub os: String,
    pub details: String,
    pub link: String,
    pub distance: u8,
    pub reporter_hostname: String,
}

/// One sighting passed to [`AssetStore::update`]; separates "what we saw"
/// from the bookkeeping `update` performs.
pub struct Observation {
    pub key: AssetKey,
    pub mac: Option<String>,
    pub os: Option<String>,
    pub details: Option<String>,
    pub link: String,
    pub distance: u8,
    pub reporter_hostname: String,
}

#[derive(Default)]
pub struct AssetStore {
    assets: HashMap<AssetKey, Asset>,
}

impl AssetStore {
    /// Insert or refresh an asset (spec.md §4.G). Emits the fixed-width
    /// asset-log line exactly once per key (invariant I2); every
    /// subsequent sighting only bumps `last_seen` and the mutable fields.
    pub fn update(&mut self, obs: Observation, now: DateTime<Utc>) {
        let os = normalize_field(obs.os);
        let details = normalize_field(obs.details);

        match self.assets.get_mut(&obs.key) {
            Some(existing) => {
                existing.last_seen = now;
                existing.mac = obs.mac.or_else(|| existing.mac.clone());
                existing.os = os;
                existing.details = details;
                existing.link = obs.link;
                existing.distance = obs.distance;
            }
            None => {
                let line = format_asset_log_line(
                    now,
                    obs.key.service,
                    obs.key.ip,
                    &os,
                    &details,
                    &obs.key.fp,
                    obs.distance,
                    &obs.link,
                );
                info!(target: "prads::asset_log", "{line}");
                self.assets.insert(
                    obs.key.clone(),
                    Asset {
                        key: obs.key,
                        first_seen: now,
                        last_seen: now,
                        mac: obs.mac,
                        os,
                        details,
                        link: obs.link,
                        distance: obs.distance,
                        reporter_hostname: obs.reporter_hostname,
                    },
                );
            }
        }
    }

    pub fn get(&self, key: &AssetKey) -> Option<&Asset> {
        self.assets.get(key)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }
}

fn normalize_field(value: Option<String>) -> String {
    match value {
        Some(v) if v.eq_ignore_ascii_case("unknown") || v.is_empty() => "?".to_string(),
        Some(v) => v,
        None => "?".to_string(),
    }
}

/// `%11d [%-8s] ip:%-15s %s - %s [%s] distance:%d link:%s\n` (spec.md §6).
#[allow(clippy::too_many_arguments)]
pub fn format_asset_log_line(
    time: DateTime<Utc>,
    service: ServiceKind,
    ip: Ipv4Addr,
    os: &str,
    details: &str,
    fp: &str,
    distance: u8,
    link: &str,
) -> String {
    format!(
        "{:>11} [{:<8}] ip:{:<15} {} - {} [{}] distance:{} link:{}",
        time.timestamp(),
        service.to_string(),
        ip.to_string(),
        os,
        details,
        fp,
        distance,
        link
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fp: &str) -> AssetKey {
        AssetKey {
            service: ServiceKind::Syn,
            ip: Ipv4Addr::new(10, 0, 0, 1),
            fp: fp.to_string(),
        }
    }

    fn obs(fp: &str) -> Observation {
        Observation {
            key: key(fp),
            mac: None,
            os: Some("Linux".to_string()),
            details: Some("2.6".to_string()),
            link: "ethernet".to_string(),
            distance: 0,
            reporter_hostname: "sensor1".to_string(),
        }
    }

    #[test]
    fn new_asset_logged_once() {
        let mut store = AssetStore::default();
        let now = Utc::now();
        store.update(obs("a:b:c"), now);
        let first_seen = store.get(&key("a:b:c")).unwrap().first_seen;
        store.update(obs("a:b:c"), now + chrono::Duration::seconds(5));
        let a = store.get(&key("a:b:c")).unwrap();
        assert_eq!(a.first_seen, first_seen);
        assert_eq!(a.last_seen, now + chrono::Duration::seconds(5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_fingerprints_coexist() {
        let mut store = AssetStore::default();
        let now = Utc::now();
        store.update(obs("fp1"), now);
        store.update(obs("fp2"), now);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unknown_os_normalizes_to_question_mark() {
        let mut store = AssetStore::default();
        let mut o = obs("fp1");
        o.os = Some("UNKNOWN".to_string());
        o.details = None;
        store.update(o, Utc::now());
        let a = store.get(&key("fp1")).unwrap();
        assert_eq!(a.os, "?");
        assert_eq!(a.details, "?");
    }
}
