//! MTU-to-link-description table (spec.md §3, §4.A, glossary "Link").

use std::collections::HashMap;

use crate::error::{PradsError, Result};
use crate::sig::tcp::strip_comment;

#[derive(Default)]
pub struct MtuTable {
    table: HashMap<u32, String>,
}

impl MtuTable {
    /// `mss + 40` (IP+TCP base header) is the wire MTU the signature
    /// table is indexed by; missing entries yield `"UNKNOWN"` (spec.md §4.C).
    pub fn link_for_mss(&self, mss: Option<u32>) -> String {
        match mss {
            Some(mss) => self
                .table
                .get(&(mss + 40))
                .cloned()
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            None => "UNKNOWN".to_string(),
        }
    }

    /// Every loaded entry, reconstructed as `mtu,"description"` (spec.md
    /// §6 `--dump`).
    pub fn dump_lines(&self) -> Vec<String> {
        self.table
            .iter()
            .map(|(mtu, desc)| format!("{mtu},\"{desc}\""))
            .collect()
    }
}

pub fn load_file(path: &std::path::Path) -> Result<MtuTable> {
    let text = std::fs::read_to_string(path)?;
    let mut table = MtuTable::default();
    let name = path.display().to_string();

    for (i, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let (mtu, desc) = line.split_once(',').ok_or_else(|| PradsError::SigParse {
            file: name.clone(),
            line: i + 1,
            reason: "expected 'mtu,\"description\"'".to_string(),
        })?;
        let mtu: u32 = mtu.trim().parse().map_err(|_| PradsError::SigParse {
            file: name.clone(),
            line: i + 1,
            reason: format!("bad mtu {mtu:?}"),
        })?;
        let desc = desc.trim().trim_matches('"').to_string();
        table.table.insert(mtu, desc);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_link_for_missing_mss() {
        let table = MtuTable::default();
        assert_eq!(table.link_for_mss(Some(1460)), "UNKNOWN");
        assert_eq!(table.link_for_mss(None), "UNKNOWN");
    }
}
