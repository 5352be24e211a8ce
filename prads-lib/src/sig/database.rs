use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::sig::icmp::IcmpSigTree;
use crate::sig::mac::MacTrie;
use crate::sig::mtu::MtuTable;
use crate::sig::service::ServiceSigList;
use crate::sig::tcp::TcpSigTree;
use crate::sig::udp::UdpSigTree;

/// All six signature stores, loaded once at startup and read-only for the
/// lifetime of the process (spec.md §5).
pub struct Database {
    pub syn_sigs: TcpSigTree,
    pub synack_sigs: TcpSigTree,
    pub icmp_sigs: IcmpSigTree,
    pub udp_sigs: UdpSigTree,
    /// Shared by TCP and UDP service matching (spec.md §9 open question 1).
    pub service_sigs: ServiceSigList,
    pub mac: MacTrie,
    pub mtu: MtuTable,
}

impl Database {
    pub fn load_all(cfg: &Config) -> Result<Database> {
        info!(
            sig_file_syn = cfg.sig_file_syn,
            sig_file_synack = cfg.sig_file_synack,
            "loading signature databases"
        );
        Ok(Database {
            syn_sigs: crate::sig::tcp::load_file(Path::new(&cfg.sig_file_syn))?,
            synack_sigs: crate::sig::tcp::load_file(Path::new(&cfg.sig_file_synack))?,
            icmp_sigs: crate::sig::icmp::load_file(Path::new(&cfg.sig_file_icmp))?,
            udp_sigs: crate::sig::udp::load_file(Path::new(&cfg.sig_file_cli_udp))?,
            service_sigs: ServiceSigList::load(Path::new(&cfg.sig_file_serv_tcp))?,
            mac: crate::sig::mac::load_file(Path::new(&cfg.mac_file))?,
            mtu: crate::sig::mtu::load_file(Path::new(&cfg.mtu_file))?,
        })
    }

    /// Render every loaded signature table back to its on-disk line
    /// format, grouped by table (spec.md §6 `--dump`).
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut section = |title: &str, lines: Vec<String>| {
            out.push_str(&format!("# {title} ({} entries)\n", lines.len()));
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
            out.push('\n');
        };
        section("tcp-syn", self.syn_sigs.dump_lines());
        section("tcp-synack", self.synack_sigs.dump_lines());
        section("icmp", self.icmp_sigs.dump_lines());
        section("udp", self.udp_sigs.dump_lines());
        section("service", self.service_sigs.dump_lines());
        section("mac", self.mac.dump_lines());
        section("mtu", self.mtu.dump_lines());
        out
    }
}
