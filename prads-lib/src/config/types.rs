/// Runtime configuration (spec.md §6). Every recognized key has a
/// hard-coded default; a config file only needs to override what differs.
#[derive(Debug, Clone)]
pub struct Config {
    pub daemon: bool,
    pub arp: bool,
    pub service_tcp: bool,
    /// Accepted but unused by the core matchers (spec.md §9 open question) —
    /// kept as a reserved field rather than rejected by the loader.
    pub client_tcp: bool,
    pub service_udp: bool,
    pub os_syn_fingerprint: bool,
    pub os_synack_fingerprint: bool,
    pub os_ack_fingerprint: bool,
    pub os_rst_fingerprint: bool,
    pub os_fin_fingerprint: bool,
    pub os_udp: bool,
    pub icmp: bool,
    pub os_icmp: bool,
    pub log_file: Option<String>,
    pub pid_file: Option<String>,
    pub sig_file_syn: String,
    pub sig_file_synack: String,
    pub sig_file_serv_tcp: String,
    pub sig_file_cli_tcp: String,
    pub sig_file_serv_udp: String,
    pub sig_file_cli_udp: String,
    /// Not in spec.md's recognized-key list (the original tool hard-codes
    /// this path); added so the ICMP loader has somewhere to point.
    pub sig_file_icmp: String,
    pub mac_file: String,
    pub mtu_file: String,
    pub user: Option<String>,
    pub group: Option<String>,
    pub interface: String,
    pub bpfilter: Option<String>,
    pub db: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub asset_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            daemon: false,
            arp: true,
            service_tcp: true,
            client_tcp: false,
            service_udp: false,
            os_syn_fingerprint: true,
            os_synack_fingerprint: false,
            os_ack_fingerprint: false,
            os_rst_fingerprint: false,
            os_fin_fingerprint: false,
            os_udp: true,
            icmp: true,
            os_icmp: true,
            log_file: None,
            pid_file: Some("/var/run/prads.pid".to_string()),
            sig_file_syn: "/etc/prads/tcp-syn.sig".to_string(),
            sig_file_synack: "/etc/prads/tcp-synack.sig".to_string(),
            sig_file_serv_tcp: "/etc/prads/tcp-service.sig".to_string(),
            sig_file_cli_tcp: "/etc/prads/tcp-client.sig".to_string(),
            sig_file_serv_udp: "/etc/prads/udp-service.sig".to_string(),
            sig_file_cli_udp: "/etc/prads/udp-client.sig".to_string(),
            sig_file_icmp: "/etc/prads/icmp.sig".to_string(),
            mac_file: "/etc/prads/prads-ether-codes".to_string(),
            mtu_file: "/etc/prads/prads-mtu".to_string(),
            user: None,
            group: None,
            interface: "eth0".to_string(),
            bpfilter: None,
            db: None,
            db_username: None,
            db_password: None,
            asset_log: "/var/log/prads-asset.log".to_string(),
        }
    }
}
