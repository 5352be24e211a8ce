use std::path::Path;

use tracing::warn;

use super::types::Config;
use crate::error::Result;

/// Load a `key = value` config file (spec.md §6): `#` starts a comment,
/// blank lines are skipped, unrecognized keys are warned about and
/// ignored, and every recognized key falls back to its hard-coded
/// default when absent or malformed.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = Config::default();

    for (lineno, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!(lineno = lineno + 1, line, "ignoring malformed config line");
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        apply_key(&mut cfg, key, value, lineno + 1);
    }

    Ok(cfg)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_bool(value: &str, key: &str, lineno: usize) -> Option<bool> {
    match value {
        "0" => Some(false),
        "1" => Some(true),
        _ => {
            warn!(lineno, key, value, "expected 0 or 1, keeping default");
            None
        }
    }
}

fn apply_key(cfg: &mut Config, key: &str, value: &str, lineno: usize) {
    macro_rules! set_bool {
        ($field:ident) => {
            if let Some(v) = parse_bool(value, key, lineno) {
                cfg.$field = v;
            }
        };
    }
    macro_rules! set_string {
        ($field:ident) => {
            cfg.$field = value.to_string()
        };
    }
    macro_rules! set_opt_string {
        ($field:ident) => {
            cfg.$field = Some(value.to_string())
        };
    }

    match key {
        "daemon" => set_bool!(daemon),
        "arp" => set_bool!(arp),
        "service_tcp" => set_bool!(service_tcp),
        "client_tcp" => set_bool!(client_tcp),
        "service_udp" => set_bool!(service_udp),
        "os_syn_fingerprint" => set_bool!(os_syn_fingerprint),
        "os_synack_fingerprint" => set_bool!(os_synack_fingerprint),
        "os_ack_fingerprint" => set_bool!(os_ack_fingerprint),
        "os_rst_fingerprint" => set_bool!(os_rst_fingerprint),
        "os_fin_fingerprint" => set_bool!(os_fin_fingerprint),
        "os_udp" => set_bool!(os_udp),
        "icmp" => set_bool!(icmp),
        "os_icmp" => set_bool!(os_icmp),
        "log_file" => set_opt_string!(log_file),
        "pid_file" => set_opt_string!(pid_file),
        "sig_file_syn" => set_string!(sig_file_syn),
        "sig_file_synack" => set_string!(sig_file_synack),
        "sig_file_serv_tcp" => set_string!(sig_file_serv_tcp),
        "sig_file_cli_tcp" => set_string!(sig_file_cli_tcp),
        "sig_file_serv_udp" => set_string!(sig_file_serv_udp),
        "sig_file_cli_udp" => set_string!(sig_file_cli_udp),
        "sig_file_icmp" => set_string!(sig_file_icmp),
        "mac_file" => set_string!(mac_file),
        "user" => set_opt_string!(user),
        "group" => set_opt_string!(group),
        "interface" => set_string!(interface),
        "bpfilter" => set_opt_string!(bpfilter),
        "db" => set_opt_string!(db),
        "db_username" => set_opt_string!(db_username),
        "db_password" => set_opt_string!(db_password),
        "asset_log" => set_string!(asset_log),
        _ => warn!(lineno, key, "unrecognized config key, ignoring"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_overrides_and_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "# comment\ninterface = eth1\narp = 0\nsig_file_syn = /tmp/syn.sig\n"
        )
        .unwrap();

        let cfg = load_from_path(file.path()).unwrap();

        assert_eq!(cfg.interface, "eth1");
        assert!(!cfg.arp);
        assert_eq!(cfg.sig_file_syn, "/tmp/syn.sig");
        assert!(cfg.icmp); // untouched default
    }

    #[test]
    fn unrecognized_key_is_ignored_not_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bogus_key = 1\ninterface = eth2\n").unwrap();

        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.interface, "eth2");
    }
}
