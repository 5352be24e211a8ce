//! UDP OS signature tree: loader and matcher (spec.md §4.A, §4.D).

use crate::dissect::ip::Ipv4Header;
use crate::dissect::udp::UdpDatagram;
use crate::error::{PradsError, Result};
use crate::sig::tcp::strip_comment;
use crate::sig::wtree::{Leaf, WildcardTree};

/// One UDP feature vector (spec.md §3: `fplen:ttl:df:io:if:fo`).
#[derive(Debug, Clone)]
pub struct UdpObservation {
    pub fplen: u16,
    pub ttl: u8,
    pub df: bool,
    pub io: u16,
    pub if_flag: bool,
    pub fo: u16,
}

impl UdpObservation {
    pub fn fp_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.fplen, self.ttl, self.df as u8, self.io, self.if_flag as u8, self.fo
        )
    }

    /// Tree descent key path: `fplen -> ttl -> df -> if -> fo -> io`.
    fn path(&self) -> Vec<String> {
        vec![
            self.fplen.to_string(),
            self.ttl.to_string(),
            u8::from(self.df).to_string(),
            u8::from(self.if_flag).to_string(),
            self.fo.to_string(),
            self.io.to_string(),
        ]
    }
}

/// `fplen = max(0, ip_len - udp_len)` (spec.md §3).
pub fn extract(ip: &Ipv4Header, udp: &UdpDatagram<'_>) -> UdpObservation {
    let fplen = ip.total_len.saturating_sub(udp.len);
    UdpObservation {
        fplen,
        ttl: ip.gttl,
        df: ip.df,
        io: if ip.has_options { 1 } else { 0 },
        if_flag: ip.frag_offset != 0,
        fo: ip.frag_offset,
    }
}

#[derive(Default)]
pub struct UdpSigTree {
    tree: WildcardTree,
}

impl UdpSigTree {
    /// Parse one 8-field UDP signature line:
    /// `fplen,ttl,df,if,fo,io,os,details` (spec.md §4.A).
    pub fn insert_line(&mut self, file: &str, lineno: usize, line: &str) -> Result<()> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 8 {
            return Err(PradsError::SigParse {
                file: file.to_string(),
                line: lineno,
                reason: format!("expected 8 fields, got {}", fields.len()),
            });
        }
        let path: Vec<String> = fields[..6]
            .iter()
            .map(|f| if *f == "." { "0".to_string() } else { f.to_string() })
            .collect();
        self.tree.insert(
            &path,
            Leaf {
                os: fields[6].to_string(),
                details: fields[7].to_string(),
            },
        );
        Ok(())
    }

    /// Match against the tree (spec.md §4.D): on a miss, drop (no UDP OS
    /// asset is emitted, unlike ICMP).
    pub fn matches(&self, obs: &UdpObservation) -> Option<(String, String)> {
        self.tree
            .lookup(&obs.path())
            .map(|leaf| (leaf.os.clone(), leaf.details.clone()))
    }

    /// Every loaded signature, reconstructed as `fplen,ttl,df,if,fo,io,os,details`
    /// (spec.md §6 `--dump`).
    pub fn dump_lines(&self) -> Vec<String> {
        self.tree
            .entries()
            .into_iter()
            .map(|(path, leaf)| format!("{},{},{}", path.join(","), leaf.os, leaf.details))
            .collect()
    }
}

pub fn load_file(path: &std::path::Path) -> Result<UdpSigTree> {
    let text = std::fs::read_to_string(path)?;
    let mut tree = UdpSigTree::default();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_drops_rather_than_unknown() {
        let tree = UdpSigTree::default();
        let obs = UdpObservation {
            fplen: 0,
            ttl: 64,
            df: true,
            io: 0,
            if_flag: false,
            fo: 0,
        };
        assert!(tree.matches(&obs).is_none());
    }
}
