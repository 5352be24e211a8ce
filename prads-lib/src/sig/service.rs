//! Service signature list: loader and ordered regex matcher (spec.md §4.A, §4.E).

use std::collections::HashSet;

use regex::Regex;

use crate::error::{PradsError, Result};
use crate::sig::tcp::strip_comment;

pub struct ServiceSig {
    pub service: String,
    template: String,
    regex: Regex,
}

/// Signatures kept in descending regex-text length order so the most
/// specific pattern is tried first (spec.md §4.A).
#[derive(Default)]
pub struct ServiceSigList {
    sigs: Vec<ServiceSig>,
}

impl ServiceSigList {
    /// Parse `service,template,regex` lines, collapsing duplicate regex
    /// text into one signature (spec.md §4.A).
    pub fn load(path: &std::path::Path) -> Result<ServiceSigList> {
        let text = std::fs::read_to_string(path)?;
        let name = path.display().to_string();
        let mut seen = HashSet::new();
        let mut sigs = Vec::new();

        for (i, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, ',');
            let (service, template, regex_text) = match (parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(b), Some(c)) => (a, b, c),
                _ => {
                    return Err(PradsError::SigParse {
                        file: name,
                        line: i + 1,
                        reason: "expected service,template,regex".to_string(),
                    })
                }
            };
            if !seen.insert(regex_text.to_string()) {
                continue;
            }
            let template = template.strip_prefix("v/").unwrap_or(template).to_string();
            let regex = Regex::new(regex_text).map_err(|e| PradsError::SigParse {
                file: name.clone(),
                line: i + 1,
                reason: format!("bad regex: {e}"),
            })?;
            sigs.push(ServiceSig {
                service: service.to_string(),
                template,
                regex,
            });
        }

        sigs.sort_by(|a, b| b.regex.as_str().len().cmp(&a.regex.as_str().len()));
        Ok(ServiceSigList { sigs })
    }

    /// Scan the ordered list once; the first match wins (spec.md §4.E).
    pub fn matches(&self, payload: &[u8]) -> Option<(String, String, String, String)> {
        let text = String::from_utf8_lossy(payload);
        for sig in &self.sigs {
            if let Some(caps) = sig.regex.captures(&text) {
                let rendered = interpolate(&sig.template, &caps);
                let mut parts = rendered.splitn(3, '/');
                let vendor = parts.next().unwrap_or("-").to_string();
                let version = parts.next().unwrap_or("-").to_string();
                let info = parts.next().unwrap_or("-").to_string();
                return Some((sig.service.clone(), vendor, version, info));
            }
        }
        None
    }

    /// Every loaded signature, reconstructed as `service,template,regex`
    /// (spec.md §6 `--dump`), in match-attempt order.
    pub fn dump_lines(&self) -> Vec<String> {
        self.sigs
            .iter()
            .map(|sig| format!("{},{},{}", sig.service, sig.template, sig.regex.as_str()))
            .collect()
    }
}

fn interpolate(template: &str, caps: &regex::Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '$' {
            if let Some((_, d)) = chars.peek().copied() {
                if d.is_ascii_digit() {
                    chars.next();
                    let idx = d.to_digit(10).unwrap() as usize;
                    out.push_str(caps.get(idx).map(|m| m.as_str()).unwrap_or(""));
                    continue;
                }
            }
            out.push(c);
        } else {
            out.push(c);
            let _ = i;
        }
    }
    out
}
