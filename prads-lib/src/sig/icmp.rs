//! ICMP OS signature tree: loader and matcher (spec.md §4.A, §4.D).

use crate::dissect::icmp::IcmpPacket;
use crate::dissect::ip::Ipv4Header;
use crate::error::{PradsError, Result};
use crate::sig::tcp::strip_comment;
use crate::sig::wtree::{Leaf, WildcardTree};

/// One ICMP feature vector (spec.md §3: `itype:icode:ttl:df:io:il:if:fo:tos`).
#[derive(Debug, Clone)]
pub struct IcmpObservation {
    pub itype: u8,
    pub icode: u8,
    pub ttl: u8,
    pub df: bool,
    pub io: u16,
    pub il: u16,
    pub if_flag: bool,
    pub fo: u16,
    pub tos: u8,
}

impl IcmpObservation {
    pub fn fp_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.itype,
            self.icode,
            self.ttl,
            self.df as u8,
            self.io,
            self.il,
            self.if_flag as u8,
            self.fo,
            self.tos
        )
    }

    /// Tree descent key path, in the order of spec.md §3:
    /// `itype -> icode -> il -> ttl -> df -> if -> fo -> io -> tos`.
    fn path(&self) -> Vec<String> {
        vec![
            self.itype.to_string(),
            self.icode.to_string(),
            self.il.to_string(),
            self.ttl.to_string(),
            u8::from(self.df).to_string(),
            u8::from(self.if_flag).to_string(),
            self.fo.to_string(),
            self.io.to_string(),
            self.tos.to_string(),
        ]
    }
}

/// Extract an ICMP feature vector from a dissected packet (spec.md §4.B/§4.D).
pub fn extract(ip: &Ipv4Header, icmp: &IcmpPacket<'_>) -> IcmpObservation {
    IcmpObservation {
        itype: icmp.itype,
        icode: icmp.icode,
        ttl: ip.gttl,
        df: ip.df,
        io: if ip.has_options { 1 } else { 0 },
        il: icmp.payload.len() as u16,
        if_flag: ip.frag_offset != 0,
        fo: ip.frag_offset,
        tos: ip.tos,
    }
}

#[derive(Default)]
pub struct IcmpSigTree {
    tree: WildcardTree,
}

impl IcmpSigTree {
    /// Parse one 11-field ICMP signature line:
    /// `itype,icode,il,ttl,df,if,fo,io,tos,os,details` (spec.md §4.A).
    pub fn insert_line(&mut self, file: &str, lineno: usize, line: &str) -> Result<()> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 11 {
            return Err(PradsError::SigParse {
                file: file.to_string(),
                line: lineno,
                reason: format!("expected 11 fields, got {}", fields.len()),
            });
        }
        let path: Vec<String> = fields[..9]
            .iter()
            .map(|f| if *f == "." { "0".to_string() } else { f.to_string() })
            .collect();
        self.tree.insert(
            &path,
            Leaf {
                os: fields[9].to_string(),
                details: fields[10].to_string(),
            },
        );
        Ok(())
    }

    /// Match against the tree (spec.md §4.D): on a miss, still return an
    /// asset record with `os = details = "UNKNOWN"` (an ICMP packet is
    /// always worth recording, unlike UDP).
    pub fn matches(&self, obs: &IcmpObservation) -> (String, String) {
        match self.tree.lookup(&obs.path()) {
            Some(leaf) => (leaf.os.clone(), leaf.details.clone()),
            None => ("UNKNOWN".to_string(), "UNKNOWN".to_string()),
        }
    }

    /// Every loaded signature, reconstructed as `itype,icode,il,ttl,df,if,fo,io,tos,os,details`
    /// (spec.md §6 `--dump`).
    pub fn dump_lines(&self) -> Vec<String> {
        self.tree
            .entries()
            .into_iter()
            .map(|(path, leaf)| format!("{},{},{}", path.join(","), leaf.os, leaf.details))
            .collect()
    }
}

pub fn load_file(path: &std::path::Path) -> Result<IcmpSigTree> {
    let text = std::fs::read_to_string(path)?;
    let mut tree = IcmpSigTree::default();
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
    fn exact_and_unknown_fallback() {
        let mut tree = IcmpSigTree::default();
        tree.insert_line("t", 1, "8,0,0,64,1,0,0,0,0,Linux,ping").unwrap();
        let obs = IcmpObservation {
            itype: 8,
            icode: 0,
            ttl: 64,
            df: true,
            io: 0,
            il: 0,
            if_flag: false,
            fo: 0,
            tos: 0,
        };
        assert_eq!(tree.matches(&obs), ("Linux".to_string(), "ping".to_string()));

        let miss = IcmpObservation { itype: 3, ..obs };
        assert_eq!(
            tree.matches(&miss),
            ("UNKNOWN".to_string(), "UNKNOWN".to_string())
        );
    }
}
