//! TCP SYN/SYN-ACK signature tree: loader (spec.md §4.A) and p0f-compatible
//! hierarchical matcher with fuzzy fallback (spec.md §4.C).

use std::collections::HashMap;

use tracing::warn;

use crate::dissect::ip::Ipv4Header;
use crate::dissect::tcp::{TcpFlags, TcpSegment};
use crate::error::{PradsError, Result};
use crate::fp::{normalize_ttl, normalize_wss, Quirks};

/// One TCP SYN/SYN-ACK feature vector, extracted per spec.md §4.C steps 1-2.
#[derive(Debug, Clone)]
pub struct TcpObservation {
    pub winsize: u32,
    pub gttl: u8,
    pub df: bool,
    pub sz: u16,
    pub opts: String,
    pub optcnt: usize,
    pub mss: Option<u32>,
    pub wsc: Option<u32>,
    pub t0: bool,
    pub quirks: Quirks,
    pub distance: u8,
    pub is_ack: bool,
}

impl TcpObservation {
    /// The `wss:ttl:df:sz:opts:quirks` fingerprint string (spec.md §3).
    pub fn fp_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            normalize_wss(self.winsize, self.mss),
            self.gttl,
            self.df as u8,
            self.sz,
            self.opts,
            self.quirks
        )
    }
}

/// Parse TCP options and compute the SYN feature vector (spec.md §4.C
/// steps 1-2). Never fails: a malformed option length stops option
/// parsing early and raises the `!` quirk, per the best-effort policy
/// of spec.md §7.
pub fn extract(ip: &Ipv4Header, tcp: &TcpSegment<'_>) -> TcpObservation {
    let mut tokens = Vec::new();
    let mut quirks = Quirks::empty();
    let mut mss = None;
    let mut wsc = None;

    let mut rest = tcp.options;
    while !rest.is_empty() {
        let kind = rest[0];
        match kind {
            0 => {
                tokens.push("E".to_string());
                if rest.len() > 1 {
                    quirks.insert(Quirks::P);
                }
                break;
            }
            1 => {
                tokens.push("N".to_string());
                rest = &rest[1..];
            }
            _ => {
                if rest.len() < 2 {
                    quirks.insert(Quirks::BROKEN_OPT);
                    break;
                }
                let len = rest[1] as usize;
                if len < 2 || len > rest.len() {
                    quirks.insert(Quirks::BROKEN_OPT);
                    break;
                }
                let data = &rest[2..len];
                match kind {
                    2 if data.len() >= 2 => {
                        let m = u16::from_be_bytes([data[0], data[1]]) as u32;
                        mss = Some(m);
                        tokens.push(format!("M{m}"));
                    }
                    3 if !data.is_empty() => {
                        let w = data[0] as u32;
                        wsc = Some(w);
                        tokens.push(format!("W{w}"));
                    }
                    4 => tokens.push("S".to_string()),
                    8 if data.len() >= 8 => {
                        let ts_val = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                        let ts_ecr = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
                        if ts_val != 0 {
                            tokens.push("T".to_string());
                        } else {
                            tokens.push("T0".to_string());
                        }
                        if ts_ecr != 0 {
                            quirks.insert(Quirks::T);
                        }
                    }
                    _ => tokens.push(format!("?{kind}")),
                }
                rest = &rest[len..];
            }
        }
    }

    let opts = if tokens.is_empty() {
        ".".to_string()
    } else {
        tokens.join(",")
    };
    let optcnt = if opts == "." { 0 } else { tokens.len() };
    let t0 = derive_t0(&opts);

    if ip.id == 0 {
        quirks.insert(Quirks::Z);
    }
    if ip.has_options {
        quirks.insert(Quirks::I);
    }
    if tcp.urgent_ptr != 0 {
        quirks.insert(Quirks::U);
    }
    if tcp.reserved != 0 {
        quirks.insert(Quirks::X);
    }
    if tcp.ack != 0 {
        quirks.insert(Quirks::A);
    }
    if tcp.flags.has_non_syn_ack() {
        quirks.insert(Quirks::F);
    }
    if !tcp.payload.is_empty() {
        quirks.insert(Quirks::D);
    }

    TcpObservation {
        winsize: tcp.window as u32,
        gttl: ip.gttl,
        df: ip.df,
        sz: if ip.total_len < 100 { ip.total_len } else { 0 },
        opts,
        optcnt,
        mss,
        wsc,
        t0,
        quirks,
        distance: ip.distance,
        is_ack: tcp.flags.contains(TcpFlags::ACK),
    }
}

#[derive(Debug, Clone)]
pub struct TcpSigLeaf {
    pub os: String,
    pub details: String,
}

#[derive(Default)]
struct OptsNode {
    children: Vec<(String, HashMap<u8, TcpSigLeaf>)>,
}

#[derive(Default)]
struct WssNode {
    children: Vec<(String, OptsNode)>,
}

#[derive(Default)]
struct WscNode {
    children: HashMap<String, WssNode>,
}

#[derive(Default)]
struct MssNode {
    children: Vec<(String, WscNode)>,
}

type QuirksMap = HashMap<Quirks, MssNode>;
type DfMap = HashMap<bool, QuirksMap>;
type T0Map = HashMap<bool, DfMap>;
type OptcntMap = HashMap<usize, T0Map>;

/// A p0f-style hierarchical signature tree, indexed in the order
/// `sz -> optcnt -> t0 -> df -> quirks -> mss -> wsc -> wss -> opts -> ttl`
/// (spec.md §3).
#[derive(Default)]
pub struct TcpSigTree {
    by_sz: HashMap<u16, OptcntMap>,
}

/// Derive whether the packet/signature has a zero (or absent) timestamp,
/// shared between feature extraction and signature insertion so both
/// sides agree on the `t0` tree level (spec.md §4.A/§4.C).
fn derive_t0(opts: &str) -> bool {
    !opts.split(',').any(|tok| tok == "T")
}

fn scan_token<'a>(opts: &'a str, prefix: char) -> Option<&'a str> {
    opts.split(',').find_map(|t| t.strip_prefix(prefix))
}

impl TcpSigTree {
    /// Parse one `wss:ttl:df:sz:opts:quirks:os:details` signature line
    /// (spec.md §4.A) and insert it into the tree.
    pub fn insert_line(&mut self, file: &str, lineno: usize, line: &str) -> Result<()> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 8 {
            return Err(PradsError::SigParse {
                file: file.to_string(),
                line: lineno,
                reason: format!("expected 8 colon-separated fields, got {}", fields.len()),
            });
        }
        let [wss, ttl, df, sz, opts, quirks, os, details] = [
            fields[0], fields[1], fields[2], fields[3], fields[4], fields[5], fields[6],
            fields[7],
        ];

        let ttl: u8 = ttl.parse().map_err(|_| PradsError::SigParse {
            file: file.to_string(),
            line: lineno,
            reason: format!("bad ttl {ttl:?}"),
        })?;
        let df = df == "1";
        let sz: u16 = sz.parse().map_err(|_| PradsError::SigParse {
            file: file.to_string(),
            line: lineno,
            reason: format!("bad size {sz:?}"),
        })?;
        let optcnt = if opts == "." {
            0
        } else {
            opts.split(',').count()
        };
        let t0 = derive_t0(opts);
        let mss_key = scan_token(opts, 'M').unwrap_or("*").to_string();
        let wsc_key = scan_token(opts, 'W').unwrap_or("*").to_string();
        let quirks = Quirks::parse(quirks);

        let optcnt_map = self.by_sz.entry(sz).or_default();
        let t0_map = optcnt_map.entry(optcnt).or_default();
        let df_map = t0_map.entry(t0).or_default();
        let quirks_map = df_map.entry(df).or_default();
        let mss_node = quirks_map.entry(quirks).or_default();

        let wsc_node = find_or_insert(&mut mss_node.children, &mss_key);
        let wss_node = wsc_node.children.entry(wsc_key).or_default();
        let opts_node = find_or_insert(&mut wss_node.children, wss);
        let ttl_map = find_or_insert(&mut opts_node.children, opts);

        if let Some(prev) = ttl_map.get(&ttl) {
            warn!(
                file, lineno, os, details, prev.os = prev.os, "duplicate TCP signature leaf, overwriting"
            );
        }
        ttl_map.insert(
            ttl,
            TcpSigLeaf {
                os: os.to_string(),
                details: details.to_string(),
            },
        );
        Ok(())
    }

    /// Descend the tree for one observation (spec.md §4.C steps 3-11).
    /// Returns the surviving `(os, details)` leaves (empty ≡ unknown) and
    /// whether the result came from the fuzzy fallback path.
    pub fn matches(&self, obs: &TcpObservation) -> (Vec<TcpSigLeaf>, bool) {
        let Some(optcnt_map) = self.by_sz.get(&obs.sz) else {
            return (Vec::new(), false);
        };
        let Some(t0_map) = optcnt_map.get(&obs.optcnt) else {
            return (Vec::new(), false);
        };
        let Some(df_map) = t0_map.get(&obs.t0) else {
            return (Vec::new(), false);
        };
        let Some(quirks_map) = df_map.get(&obs.df) else {
            return (Vec::new(), false);
        };
        let Some(mss_node) = quirks_map.get(&obs.quirks) else {
            return (Vec::new(), false);
        };

        let mut primary: Vec<&OptsNode> = Vec::new();
        let mut fuzzy: Vec<&OptsNode> = Vec::new();

        for (mss_key, wsc_node) in &mss_node.children {
            if !mss_matches(mss_key, obs.mss) {
                continue;
            }
            let wsc_key = obs.wsc.map(|w| w.to_string()).unwrap_or_else(|| "*".to_string());
            let wss_node = wsc_node
                .children
                .get(&wsc_key)
                .or_else(|| wsc_node.children.get("*"));
            let Some(wss_node) = wss_node else { continue };

            for (wss_key, opts_node) in &wss_node.children {
                match wss_match_kind(wss_key, obs.winsize, obs.mss) {
                    WssMatch::None => {}
                    WssMatch::Primary => primary.push(opts_node),
                    WssMatch::Fuzzy => fuzzy.push(opts_node),
                }
            }
        }

        let (candidates, is_guess) = if !primary.is_empty() {
            (primary, false)
        } else if !fuzzy.is_empty() {
            (fuzzy, true)
        } else {
            return (Vec::new(), false);
        };

        let mut leaves = Vec::new();
        for opts_node in candidates {
            let Some((_, ttl_map)) = opts_node
                .children
                .iter()
                .find(|(spec, _)| match_opts(&obs.opts, spec))
            else {
                continue;
            };
            if let Some(leaf) = ttl_map.get(&obs.gttl) {
                leaves.push(leaf.clone());
            } else if obs.gttl < 255 {
                if let Some(leaf) = ttl_map.get(&normalize_ttl(obs.gttl + 1)) {
                    leaves.push(leaf.clone());
                }
            }
        }

        (filter_generic(leaves), is_guess)
    }

    /// Every loaded signature, reconstructed as `wss:ttl:df:sz:opts:quirks:os:details`
    /// (spec.md §6 `--dump`).
    pub fn dump_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (&sz, optcnt_map) in &self.by_sz {
            for t0_map in optcnt_map.values() {
                for df_map in t0_map.values() {
                    for (&df, quirks_map) in df_map {
                        for (quirks, mss_node) in quirks_map {
                            for (_, wsc_node) in &mss_node.children {
                                for wss_node in wsc_node.children.values() {
                                    for (wss_key, opts_node) in &wss_node.children {
                                        for (opts_key, ttl_map) in &opts_node.children {
                                            for (&ttl, leaf) in ttl_map {
                                                out.push(format!(
                                                    "{wss_key}:{ttl}:{}:{sz}:{opts_key}:{quirks}:{}:{}",
                                                    df as u8, leaf.os, leaf.details
                                                ));
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

fn find_or_insert<'a, T: Default>(v: &'a mut Vec<(String, T)>, key: &str) -> &'a mut T {
    if let Some(idx) = v.iter().position(|(k, _)| k == key) {
        &mut v[idx].1
    } else {
        v.push((key.to_string(), T::default()));
        &mut v.last_mut().unwrap().1
    }
}

fn mss_matches(key: &str, mss: Option<u32>) -> bool {
    if key == "*" {
        return true;
    }
    let Some(mss) = mss else { return false };
    if let Some(n) = key.strip_prefix('%') {
        return n.parse::<u32>().is_ok_and(|n| n != 0 && mss % n == 0);
    }
    key.parse::<u32>().is_ok_and(|k| k == mss)
}

enum WssMatch {
    None,
    Primary,
    Fuzzy,
}

fn wss_match_kind(key: &str, winsize: u32, mss: Option<u32>) -> WssMatch {
    if key == "*" {
        return WssMatch::Fuzzy;
    }
    if let Some(n) = key.strip_prefix('S') {
        if let (Ok(n), Some(mss)) = (n.parse::<u32>(), mss) {
            if n * mss == winsize {
                return WssMatch::Primary;
            }
        }
        return WssMatch::None;
    }
    if let Some(n) = key.strip_prefix('T') {
        if let (Ok(n), Some(mss)) = (n.parse::<u32>(), mss) {
            if n * (mss + 40) == winsize {
                return WssMatch::Primary;
            }
        }
        return WssMatch::None;
    }
    if let Some(n) = key.strip_prefix('%') {
        if n.parse::<u32>().is_ok_and(|n| n != 0 && winsize % n == 0) {
            return WssMatch::Primary;
        }
        return WssMatch::None;
    }
    if key.parse::<u32>() == Ok(winsize) {
        return WssMatch::Primary;
    }
    WssMatch::None
}

/// Compare an observed option string against a signature's option spec
/// (spec.md §4.C step 8): `M*`/`W*` match any MSS/WS token, `Mn`/`Wn` also
/// accept a literal wildcard token, everything else is exact, and extra
/// packet tokens fail the match.
fn match_opts(observed: &str, spec: &str) -> bool {
    if spec == observed {
        return true;
    }
    let obs_tokens: Vec<&str> = if observed == "." {
        Vec::new()
    } else {
        observed.split(',').collect()
    };
    let spec_tokens: Vec<&str> = if spec == "." {
        Vec::new()
    } else {
        spec.split(',').collect()
    };
    if obs_tokens.len() != spec_tokens.len() {
        return false;
    }
    obs_tokens
        .iter()
        .zip(spec_tokens.iter())
        .all(|(o, s)| match *s {
            "M*" => o.starts_with('M'),
            "W*" => o.starts_with('W'),
            _ if s.starts_with('M') => *o == *s || *o == "M*",
            _ if s.starts_with('W') => *o == *s || *o == "W*",
            _ => o == s,
        })
}

/// Drop `@`-prefixed generic leaves when a non-generic leaf also survived
/// (spec.md §4.C step 10 / glossary "generic signature").
fn filter_generic(leaves: Vec<TcpSigLeaf>) -> Vec<TcpSigLeaf> {
    if leaves.iter().any(|l| !l.os.starts_with('@')) {
        leaves.into_iter().filter(|l| !l.os.starts_with('@')).collect()
    } else {
        leaves
    }
}

/// Load a TCP SYN/SYN-ACK signature file (spec.md §4.A).
pub fn load_file(path: &std::path::Path) -> Result<TcpSigTree> {
    let text = std::fs::read_to_string(path)?;
    let mut tree = TcpSigTree::default();
    let name = path.display().to_string();
    for (i, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        tree.insert_line(&name, i + 1, line)?;
    }
    Ok(tree)
}

pub(crate) fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_linux_syn() {
        let mut tree = TcpSigTree::default();
        tree.insert_line("test", 1, "S4:64:1:60:M1460,S,T0,N,W7:.:Linux:2.6")
            .unwrap();
        let obs = TcpObservation {
            winsize: 5840,
            gttl: 64,
            df: true,
            sz: 60,
            opts: "M1460,S,T0,N,W7".to_string(),
            optcnt: 5,
            mss: Some(1460),
            wsc: Some(7),
            t0: true,
            quirks: Quirks::empty(),
            distance: 0,
            is_ack: false,
        };
        let (leaves, guess) = tree.matches(&obs);
        assert!(!guess);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].os, "Linux");
        assert_eq!(leaves[0].details, "2.6");
    }

    #[test]
    fn generic_filtered_when_specific_present() {
        let mut tree = TcpSigTree::default();
        tree.insert_line("t", 1, "*:64:1:0:.:.:@ {unix}:Any").unwrap();
        tree.insert_line("t", 2, "*:64:1:0:.:.:Linux:3.x").unwrap();
        let obs = TcpObservation {
            winsize: 100,
            gttl: 64,
            df: true,
            sz: 0,
            opts: ".".to_string(),
            optcnt: 0,
            mss: None,
            wsc: None,
            t0: true,
            quirks: Quirks::empty(),
            distance: 0,
            is_ack: false,
        };
        let (leaves, _) = tree.matches(&obs);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].os, "Linux");
    }

    #[test]
    fn match_opts_wildcards() {
        assert!(match_opts("M1460,S", "M*,S"));
        assert!(match_opts("M1460,S", "M1460,S"));
        assert!(!match_opts("M1460,S,N", "M1460,S"));
    }

    #[test]
    fn t0_derivation() {
        assert!(derive_t0("."));
        assert!(derive_t0("M1460,T0"));
        assert!(!derive_t0("M1460,T"));
    }

    #[test]
    fn reserved_bits_raise_x_quirk() {
        use crate::dissect::ip::parse_ipv4;
        use crate::dissect::tcp::parse_tcp;

        let mut d = vec![0u8; 20];
        d[0] = 0x45;
        d[2..4].copy_from_slice(&40u16.to_be_bytes());
        d[8] = 64;
        d[9] = 6;
        d[12..16].copy_from_slice(&[10, 0, 0, 1]);
        d[16..20].copy_from_slice(&[10, 0, 0, 2]);
        let mut tcp = vec![0u8; 20];
        tcp[12] = (5 << 4) | 0x02; // data offset 5, reserved bit set
        tcp[13] = TcpFlags::SYN.bits();
        d.extend_from_slice(&tcp);

        let (ip, payload) = parse_ipv4(&d).unwrap();
        let seg = parse_tcp(payload).unwrap();
        let obs = extract(&ip, &seg);
        assert!(obs.quirks.contains(Quirks::X));
    }
}
