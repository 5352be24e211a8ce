//! MAC vendor trie: loader and lookup (spec.md §4.A, §4.F), format
//! compatible with `prads-ether-codes`.

use std::collections::HashMap;

use crate::error::{PradsError, Result};
use crate::sig::tcp::strip_comment;

#[derive(Debug, Clone)]
pub struct MacLeaf {
    pub vendor: String,
    pub details: String,
}

#[derive(Default)]
struct MacMaskLeaf {
    bits: u32,
    pattern: u8,
    leaf: MacLeaf,
}

/// A radix trie over hex bytes. `leaf` is the reserved "match exactly
/// here" slot (`_` in spec.md §3) so a longer prefix can nest below it;
/// `mask_leaves` holds bit-masked partial-byte entries at this level.
#[derive(Default)]
struct MacNode {
    children: HashMap<u8, MacNode>,
    leaf: Option<MacLeaf>,
    mask_leaves: Vec<MacMaskLeaf>,
}

#[derive(Default)]
pub struct MacTrie {
    root: MacNode,
}

impl MacTrie {
    /// Insert one vendor entry. `bytes` is the full prefix (already split
    /// on `:`/`.`/`-`) and `bits` the declared mask width (default 48).
    fn insert(&mut self, bytes: &[u8], bits: u32, leaf: MacLeaf) {
        let full_bytes = (bits / 8) as usize;
        let rem = bits % 8;
        let full_bytes = full_bytes.min(bytes.len());

        let mut node = &mut self.root;
        for &b in &bytes[..full_bytes] {
            node = node.children.entry(b).or_default();
        }

        if rem == 0 {
            node.leaf = Some(leaf);
        } else if let Some(&last) = bytes.get(full_bytes) {
            node.mask_leaves.push(MacMaskLeaf {
                bits: rem,
                pattern: last,
                leaf,
            });
        } else {
            node.leaf = Some(leaf);
        }
    }

    /// Look up a MAC address: most-specific subtree wins, then the exact
    /// `_` leaf at this level, then any bit-masked leaf at this level
    /// (spec.md §4.F).
    pub fn lookup(&self, bytes: &[u8]) -> Option<MacLeaf> {
        lookup_node(&self.root, bytes).map(|(leaf, _)| leaf)
    }

    /// Like [`MacTrie::lookup`], but also returns the matched OUI prefix
    /// as a lowercase hex string (spec.md §3's `fp` for ARP/MAC entries),
    /// sized to however many bytes of `bytes` the trie actually matched.
    pub fn lookup_prefix(&self, bytes: &[u8]) -> Option<(MacLeaf, String)> {
        lookup_node(&self.root, bytes).map(|(leaf, depth)| {
            let prefix = bytes[..depth.min(bytes.len())]
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>();
            (leaf, prefix)
        })
    }

    /// Every loaded vendor entry, reconstructed as `prefix/bits` plus its
    /// leaf (spec.md §6 `--dump`).
    pub fn entries(&self) -> Vec<(String, u32, MacLeaf)> {
        let mut out = Vec::new();
        collect_entries(&self.root, &mut Vec::new(), &mut out);
        out
    }

    pub fn dump_lines(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|(prefix, bits, leaf)| format!("{prefix}/{bits} {} {}", leaf.vendor, leaf.details))
            .collect()
    }
}

fn collect_entries(node: &MacNode, prefix: &mut Vec<u8>, out: &mut Vec<(String, u32, MacLeaf)>) {
    if let Some(leaf) = &node.leaf {
        out.push((hex_join(prefix), prefix.len() as u32 * 8, leaf.clone()));
    }
    for mask in &node.mask_leaves {
        out.push((hex_join(prefix), prefix.len() as u32 * 8 + mask.bits, mask.leaf.clone()));
    }
    for (&b, child) in &node.children {
        prefix.push(b);
        collect_entries(child, prefix, out);
        prefix.pop();
    }
}

fn hex_join(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":")
}

/// Returns the matched leaf plus how many leading bytes of `bytes` were
/// consumed to reach it (children traversed, plus one more if the match
/// came from a bit-masked partial byte).
fn lookup_node(node: &MacNode, bytes: &[u8]) -> Option<(MacLeaf, usize)> {
    if let Some((&b, rest)) = bytes.split_first() {
        if let Some(child) = node.children.get(&b) {
            if let Some((leaf, depth)) = lookup_node(child, rest) {
                return Some((leaf, depth + 1));
            }
        }
    }
    if let Some(leaf) = &node.leaf {
        return Some((leaf.clone(), 0));
    }
    if let Some((&b, _)) = bytes.split_first() {
        for mask in &node.mask_leaves {
            let shift = 8 - mask.bits;
            if (b >> shift) == (mask.pattern >> shift) {
                return Some((mask.leaf.clone(), 1));
            }
        }
    }
    None
}

/// Split a printable MAC-ish prefix on `:`, `.` or `-` into hex bytes.
pub fn split_hex_bytes(s: &str) -> Option<Vec<u8>> {
    s.split(|c| c == ':' || c == '.' || c == '-')
        .map(|tok| u8::from_str_radix(tok, 16).ok())
        .collect()
}

pub fn load_file(path: &std::path::Path) -> Result<MacTrie> {
    let text = std::fs::read_to_string(path)?;
    let mut trie = MacTrie::default();
    let name = path.display().to_string();

    for (i, raw) in text.lines().enumerate() {
        let line = strip_comment(raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, char::is_whitespace);
        let prefix = fields.next().unwrap_or("");
        let vendor = fields.next().unwrap_or("").trim();
        let details = fields.next().unwrap_or("").trim();
        if prefix.is_empty() || vendor.is_empty() {
            return Err(PradsError::SigParse {
                file: name,
                line: i + 1,
                reason: "expected 'prefix[/bits] vendor details'".to_string(),
            });
        }

        let (prefix, bits) = match prefix.split_once('/') {
            Some((p, b)) => (
                p,
                b.parse().map_err(|_| PradsError::SigParse {
                    file: name.clone(),
                    line: i + 1,
                    reason: format!("bad bit count {b:?}"),
                })?,
            ),
            None => (prefix, 48),
        };
        let bytes = split_hex_bytes(prefix).ok_or_else(|| PradsError::SigParse {
            file: name.clone(),
            line: i + 1,
            reason: format!("bad mac prefix {prefix:?}"),
        })?;

        trie.insert(
            &bytes,
            bits,
            MacLeaf {
                vendor: vendor.to_string(),
                details: details.to_string(),
            },
        );
    }
    Ok(trie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn more_specific_prefix_wins() {
        let mut trie = MacTrie::default();
        trie.insert(&[0x00, 0x1b], 16, MacLeaf { vendor: "Short".into(), details: "x".into() });
        trie.insert(
            &[0x00, 0x1b, 0x21],
            24,
            MacLeaf { vendor: "Intel".into(), details: "y".into() },
        );

        let full = trie.lookup(&[0x00, 0x1b, 0x21, 0xaa, 0xbb, 0xcc]).unwrap();
        assert_eq!(full.vendor, "Intel");

        let short_only = trie.lookup(&[0x00, 0x1b, 0xff, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(short_only.vendor, "Short");
    }

    #[test]
    fn bit_mask_leaf() {
        let mut trie = MacTrie::default();
        // 00:1b:21:0X/20 -> top 4 bits of the 4th byte must be 0
        trie.insert(
            &[0x00, 0x1b, 0x21, 0x00],
            28,
            MacLeaf { vendor: "Masked".into(), details: "z".into() },
        );
        let hit = trie.lookup(&[0x00, 0x1b, 0x21, 0x0f, 0x00, 0x00]).unwrap();
        assert_eq!(hit.vendor, "Masked");
        assert!(trie.lookup(&[0x00, 0x1b, 0x21, 0x10, 0x00, 0x00]).is_none());
    }
}
