//! Capture driver + lifecycle (spec.md §4.I): feeds frames to the
//! dissectors and matchers, and owns the signal-driven shutdown/stats/
//! flush policy. The capture device itself is out of scope (spec.md §1);
//! [`CaptureSource`] is the contract a real pcap-backed source fulfills.

pub mod events;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::asset::{AssetStore, Observation, ServiceKind};
use crate::config::Config;
use crate::dissect::{self, Dissected};
use crate::error::Result;
use crate::persist::Persistence;
use crate::sig::database::Database;
use events::EventFlags;

/// One link-layer frame as delivered by the capture device (spec.md §1:
/// "assumed to deliver raw link-layer frames with timestamps"; the
/// timestamp itself is not needed by the core, only by persistence's
/// `last_seen`, which the loop stamps on receipt).
pub struct RawFrame {
    pub data: Vec<u8>,
}

/// The external collaborator spec.md §1 calls the capture device: pulls
/// one frame at a time, or `None` on an orderly end of input (used by
/// test sources; a real pcap source instead blocks up to its read
/// timeout and is driven by the signal flags between calls).
pub trait CaptureSource {
    fn next(&mut self) -> Result<Option<RawFrame>>;
}

/// Replays a fixed list of frames, then reports end of input — the way
/// the teacher's tests feed canned fixtures instead of a real socket.
pub struct VecSource {
    frames: std::vec::IntoIter<Vec<u8>>,
}

impl VecSource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        VecSource {
            frames: frames.into_iter(),
        }
    }
}

impl CaptureSource for VecSource {
    fn next(&mut self) -> Result<Option<RawFrame>> {
        Ok(self.frames.next().map(|data| RawFrame { data }))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub frames_total: u64,
    pub frames_dropped: u64,
    pub arp: u64,
    pub syn: u64,
    pub synack: u64,
    pub icmp: u64,
    pub udp: u64,
    pub service_tcp: u64,
    pub service_udp: u64,
}

fn log_stats(stats: &Stats) {
    info!(
        frames_total = stats.frames_total,
        frames_dropped = stats.frames_dropped,
        arp = stats.arp,
        syn = stats.syn,
        synack = stats.synack,
        icmp = stats.icmp,
        udp = stats.udp,
        service_tcp = stats.service_tcp,
        service_udp = stats.service_udp,
        "capture statistics"
    );
}

fn mac_to_string(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Run the capture loop until a shutdown signal is observed or the
/// source is exhausted, then flush once more and return final stats
/// (spec.md §4.I). INT/TERM/QUIT are checked at the top of every
/// iteration (graceful shutdown); HUP triggers a stats dump at the next
/// safe point between frames, never mid-dissection; ALRM (or, absent a
/// real timer, the elapsed-time fallback below) triggers a flush when
/// persistence is enabled.
pub fn run<C: CaptureSource, P: Persistence>(
    db: &Database,
    cfg: &Config,
    mut source: C,
    mut persistence: P,
    hostname: &str,
) -> Result<Stats> {
    let flags = EventFlags::register()?;
    let mut store = AssetStore::default();
    let mut stats = Stats::default();
    let mut db_last_update = DateTime::<Utc>::UNIX_EPOCH;
    let flush_interval = chrono::Duration::seconds(10);
    let mut last_flush = Utc::now();
    let persistence_enabled = cfg.db.is_some();

    loop {
        if flags.shutdown_requested() {
            info!("shutdown requested, flushing and exiting");
            break;
        }
        if flags.take_hup() {
            log_stats(&stats);
        }
        if flags.take_alrm() && persistence_enabled {
            db_last_update = persistence.flush(&store, db_last_update)?;
        }
        if persistence_enabled && Utc::now() - last_flush >= flush_interval {
            db_last_update = persistence.flush(&store, db_last_update)?;
            last_flush = Utc::now();
        }

        match source.next()? {
            None => break,
            Some(frame) => {
                stats.frames_total += 1;
                process_frame(db, cfg, &frame.data, hostname, &mut store, &mut stats);
            }
        }
    }

    if persistence_enabled {
        persistence.flush(&store, db_last_update)?;
    }
    log_stats(&stats);
    Ok(stats)
}

fn process_frame(
    db: &Database,
    cfg: &Config,
    data: &[u8],
    hostname: &str,
    store: &mut AssetStore,
    stats: &mut Stats,
) {
    let now = Utc::now();
    let Some(dissected) = dissect::dissect(data) else {
        stats.frames_dropped += 1;
        return;
    };

    match dissected {
        Dissected::Arp(arp) => {
            if !cfg.arp {
                return;
            }
            stats.arp += 1;
            let mac = mac_to_string(&arp.sender_mac);
            let (fp, os, details) = match db.mac.lookup_prefix(&arp.sender_mac) {
                Some((leaf, prefix)) => (prefix, Some(leaf.vendor), Some(leaf.details)),
                None => (mac.clone(), None, None),
            };
            store.update(
                Observation {
                    key: crate::asset::AssetKey {
                        service: ServiceKind::Arp,
                        ip: arp.sender_ip,
                        fp,
                    },
                    mac: Some(mac),
                    os,
                    details,
                    link: "ethernet".to_string(),
                    distance: 0,
                    reporter_hostname: hostname.to_string(),
                },
                now,
            );
        }
        Dissected::Tcp { ip, tcp } => {
            use crate::dissect::tcp::TcpFlags;

            if tcp.flags.contains(TcpFlags::SYN) {
                let is_ack = tcp.flags.contains(TcpFlags::ACK);
                let (enabled, tree, kind) = if is_ack {
                    (cfg.os_synack_fingerprint, &db.synack_sigs, ServiceKind::SynAck)
                } else {
                    (cfg.os_syn_fingerprint, &db.syn_sigs, ServiceKind::Syn)
                };
                if enabled {
                    if kind == ServiceKind::Syn {
                        stats.syn += 1;
                    } else {
                        stats.synack += 1;
                    }
                    let obs = crate::sig::tcp::extract(&ip, &tcp);
                    let (leaves, is_guess) = tree.matches(&obs);
                    let (os, details) = match leaves.first() {
                        Some(leaf) => (leaf.os.clone(), leaf.details.clone()),
                        None => ("UNKNOWN".to_string(), "UNKNOWN".to_string()),
                    };
                    if is_guess {
                        debug!(fp = obs.fp_string(), "fuzzy TCP signature match");
                    }
                    let link = db.mtu.link_for_mss(obs.mss);
                    store.update(
                        Observation {
                            key: crate::asset::AssetKey {
                                service: kind,
                                ip: ip.src,
                                fp: obs.fp_string(),
                            },
                            mac: None,
                            os: Some(os),
                            details: Some(details),
                            link,
                            distance: obs.distance,
                            reporter_hostname: hostname.to_string(),
                        },
                        now,
                    );
                }
            }

            if cfg.service_tcp && !tcp.payload.is_empty() {
                if let Some((service, vendor, version, info)) = db.service_sigs.matches(tcp.payload) {
                    stats.service_tcp += 1;
                    let details = format!("{service} {vendor} {version} {info}");
                    store.update(
                        Observation {
                            key: crate::asset::AssetKey {
                                service: ServiceKind::ServiceTcp,
                                ip: ip.src,
                                fp: format!("{}:{}", ip.src, tcp.src_port),
                            },
                            mac: None,
                            os: Some(vendor),
                            details: Some(details),
                            link: "ethernet".to_string(),
                            distance: ip.distance,
                            reporter_hostname: hostname.to_string(),
                        },
                        now,
                    );
                }
            }
        }
        Dissected::Udp { ip, udp } => {
            if cfg.os_udp {
                let obs = crate::sig::udp::extract(&ip, &udp);
                if let Some((os, details)) = db.udp_sigs.matches(&obs) {
                    stats.udp += 1;
                    store.update(
                        Observation {
                            key: crate::asset::AssetKey {
                                service: ServiceKind::Udp,
                                ip: ip.src,
                                fp: obs.fp_string(),
                            },
                            mac: None,
                            os: Some(os),
                            details: Some(details),
                            link: "ethernet".to_string(),
                            distance: ip.distance,
                            reporter_hostname: hostname.to_string(),
                        },
                        now,
                    );
                }
            }

            let service_match = if cfg.service_udp {
                db.service_sigs.matches(udp.payload)
            } else {
                hardcoded_udp_service(udp.src_port)
            };
            if let Some((service, vendor, version, info)) = service_match {
                stats.service_udp += 1;
                let details = format!("{service} {vendor} {version} {info}");
                store.update(
                    Observation {
                        key: crate::asset::AssetKey {
                            service: ServiceKind::ServiceUdp,
                            ip: ip.src,
                            fp: format!("{}:{}", ip.src, udp.src_port),
                        },
                        mac: None,
                        os: Some(vendor),
                        details: Some(details),
                        link: "ethernet".to_string(),
                        distance: ip.distance,
                        reporter_hostname: hostname.to_string(),
                    },
                    now,
                );
            }
        }
        Dissected::Icmp { ip, icmp } => {
            if !cfg.icmp {
                return;
            }
            if cfg.os_icmp {
                stats.icmp += 1;
                let obs = crate::sig::icmp::extract(&ip, &icmp);
                let (os, details) = db.icmp_sigs.matches(&obs);
                store.update(
                    Observation {
                        key: crate::asset::AssetKey {
                            service: ServiceKind::Icmp,
                            ip: ip.src,
                            fp: obs.fp_string(),
                        },
                        mac: None,
                        os: Some(os),
                        details: Some(details),
                        link: "ethernet".to_string(),
                        distance: ip.distance,
                        reporter_hostname: hostname.to_string(),
                    },
                    now,
                );
            }
        }
    }
}

/// The two hard-coded UDP service rules spec.md §4.E names, applied only
/// when regex-based UDP service matching is disabled.
fn hardcoded_udp_service(src_port: u16) -> Option<(String, String, String, String)> {
    match src_port {
        53 => Some((
            "dns".to_string(),
            "-".to_string(),
            "-".to_string(),
            "DNS".to_string(),
        )),
        1194 => Some((
            "openvpn".to_string(),
            "-".to_string(),
            "-".to_string(),
            "OpenVPN".to_string(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::NullPersistence;

    fn empty_database() -> Database {
        Database {
            syn_sigs: Default::default(),
            synack_sigs: Default::default(),
            icmp_sigs: Default::default(),
            udp_sigs: Default::default(),
            service_sigs: Default::default(),
            mac: Default::default(),
            mtu: Default::default(),
        }
    }

    fn ethernet_ipv4_tcp_syn() -> Vec<u8> {
        let mut frame = vec![0u8; 14];
        frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        ip[2..4].copy_from_slice(&40u16.to_be_bytes());
        ip[8] = 64; // ttl
        ip[9] = 6; // tcp
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);

        let mut tcp = vec![0u8; 20];
        tcp[12] = 5 << 4; // data offset, no options
        tcp[13] = 0x02; // SYN

        frame.extend_from_slice(&ip);
        frame.extend_from_slice(&tcp);
        frame
    }

    fn ethernet_arp_reply(sender_mac: [u8; 6]) -> Vec<u8> {
        let mut frame = vec![0u8; 14];
        frame[12..14].copy_from_slice(&0x0806u16.to_be_bytes());

        let mut arp = vec![0u8; 28];
        arp[0..2].copy_from_slice(&1u16.to_be_bytes());
        arp[2..4].copy_from_slice(&0x0800u16.to_be_bytes());
        arp[4] = 6;
        arp[5] = 4;
        arp[6..8].copy_from_slice(&2u16.to_be_bytes());
        arp[8..14].copy_from_slice(&sender_mac);
        arp[14..18].copy_from_slice(&[10, 0, 0, 5]);
        arp[24..28].copy_from_slice(&[10, 0, 0, 1]);

        frame.extend_from_slice(&arp);
        frame
    }

    #[test]
    fn arp_reply_resolves_vendor_and_keys_on_oui_prefix() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"00:1b:21 Intel NIC\n").unwrap();
        let mac = crate::sig::mac::load_file(file.path()).unwrap();
        let mut db = empty_database();
        db.mac = mac;
        let cfg = Config::default();
        let mut store = AssetStore::default();
        let mut stats = Stats::default();

        let frame = ethernet_arp_reply([0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc]);
        process_frame(&db, &cfg, &frame, "sensor1", &mut store, &mut stats);

        assert_eq!(stats.arp, 1);
        let asset = store
            .get(&crate::asset::AssetKey {
                service: ServiceKind::Arp,
                ip: "10.0.0.5".parse().unwrap(),
                fp: "001b21".to_string(),
            })
            .expect("asset keyed on the resolved OUI prefix");
        assert_eq!(asset.os, "Intel");
        assert_eq!(asset.mac.as_deref(), Some("00:1b:21:aa:bb:cc"));
    }

    #[test]
    fn unmatched_syn_still_produces_unknown_asset() {
        let db = empty_database();
        let cfg = Config::default();
        let mut store = AssetStore::default();
        let mut stats = Stats::default();

        process_frame(&db, &cfg, &ethernet_ipv4_tcp_syn(), "sensor1", &mut store, &mut stats);

        assert_eq!(stats.syn, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn run_drains_vec_source_and_flushes_on_exit() {
        let db = empty_database();
        let mut cfg = Config::default();
        cfg.db = Some("memory".to_string());
        let source = VecSource::new(vec![ethernet_ipv4_tcp_syn()]);
        let stats = run(&db, &cfg, source, NullPersistence::disabled(), "sensor1").unwrap();
        assert_eq!(stats.frames_total, 1);
        assert_eq!(stats.syn, 1);
    }
}
