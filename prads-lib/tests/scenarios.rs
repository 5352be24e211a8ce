//! End-to-end scenarios drawn from the worked examples: one SYN fingerprint
//! match, one ARP/MAC vendor resolution, one hard-coded UDP service match,
//! and the generic-signature filter.

mod helpers;

use std::net::Ipv4Addr;

use prads_lib::capture::{self, VecSource};
use prads_lib::config::Config;
use prads_lib::dissect::{self, Dissected};
use prads_lib::persist::NullPersistence;
use prads_lib::sig::database::Database;
use prads_lib::sig::mac::MacLeaf;
use prads_lib::sig::tcp::TcpSigTree;

fn insert_tcp_line(tree: &mut TcpSigTree, line: &str) {
    tree.insert_line("test", 1, line).unwrap();
}

#[test]
fn linux_syn_fingerprint_matches() {
    let src = Ipv4Addr::new(10, 0, 0, 1);
    let dst = Ipv4Addr::new(10, 0, 0, 2);
    let options = helpers::linux_syn_tcp_options();
    let frame = helpers::tcp_syn_frame(src, dst, 5840, &options);

    let Some(Dissected::Tcp { ip, tcp }) = dissect::dissect(&frame) else {
        panic!("expected a TCP packet");
    };
    let obs = prads_lib::sig::tcp::extract(&ip, &tcp);
    assert_eq!(obs.fp_string(), "S4:64:1:60:M1460,S,T0,N,W7:.");
    assert_eq!(obs.distance, 0);

    let mut tree = TcpSigTree::default();
    insert_tcp_line(&mut tree, "S4:64:1:60:M1460,S,T0,N,W7:.:Linux:2.6");

    let (leaves, is_guess) = tree.matches(&obs);
    assert!(!is_guess);
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].os, "Linux");
    assert_eq!(leaves[0].details, "2.6");
}

#[test]
fn arp_reply_resolves_mac_vendor() {
    let sender_mac = [0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc];
    let sender_ip = Ipv4Addr::new(10, 0, 0, 5);
    let target_ip = Ipv4Addr::new(10, 0, 0, 1);
    let frame = helpers::arp_reply_frame(sender_mac, sender_ip, target_ip);

    let Some(Dissected::Arp(arp)) = dissect::dissect(&frame) else {
        panic!("expected an ARP packet");
    };
    assert_eq!(arp.sender_ip, sender_ip);

    // Mirrors the `prads-ether-codes` 3-byte OUI convention.
    let mut file = tempfile::NamedTempFile::new().unwrap();
    use std::io::Write;
    writeln!(file, "00:1b:21 Intel NIC").unwrap();
    let mac = prads_lib::sig::mac::load_file(file.path()).unwrap();

    let vendor: Option<MacLeaf> = mac.lookup(&arp.sender_mac);
    let vendor = vendor.expect("vendor prefix should resolve");
    assert_eq!(vendor.vendor, "Intel");
}

#[test]
fn dns_udp_service_is_recognized_via_hardcoded_rule() {
    let src = Ipv4Addr::new(10, 0, 0, 9);
    let dst = Ipv4Addr::new(10, 0, 0, 1);
    let frame = helpers::udp_frame(src, dst, 53, 40000, b"\x00\x01\x01\x00\x00\x01");

    let db = Database {
        syn_sigs: Default::default(),
        synack_sigs: Default::default(),
        icmp_sigs: Default::default(),
        udp_sigs: Default::default(),
        service_sigs: Default::default(),
        mac: Default::default(),
        mtu: Default::default(),
    };
    let cfg = Config::default(); // service_udp = false -> hard-coded rule applies

    let stats = capture::run(
        &db,
        &cfg,
        VecSource::new(vec![frame]),
        NullPersistence::disabled(),
        "sensor1",
    )
    .unwrap();

    assert_eq!(stats.service_udp, 1);
}

#[test]
fn generic_signature_is_filtered_when_specific_match_coexists() {
    // Distinct MSS branches ("1460" vs the wildcard "M*") that both
    // resolve as primary candidates for the same observation, so both
    // leaves are collected before `filter_generic` runs.
    let mut tree = TcpSigTree::default();
    insert_tcp_line(&mut tree, "S4:64:1:60:M1460,S,T0,N,W7:.:@unix:Any");
    insert_tcp_line(&mut tree, "S4:64:1:60:M*,S,T0,N,W7:.:Linux:3.x");

    let src = Ipv4Addr::new(10, 0, 0, 1);
    let dst = Ipv4Addr::new(10, 0, 0, 2);
    let frame = helpers::tcp_syn_frame(src, dst, 5840, &helpers::linux_syn_tcp_options());
    let Some(Dissected::Tcp { ip, tcp }) = dissect::dissect(&frame) else {
        panic!("expected a TCP packet");
    };
    let obs = prads_lib::sig::tcp::extract(&ip, &tcp);

    let (leaves, _) = tree.matches(&obs);
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].os, "Linux");
}
