/// Normalize an observed TCP window size against the segment's MSS, per
/// spec.md §4.C: prefer an `S<n>` (n*mss) form, then a `T<n>` (n*(mss+40))
/// form, else fall back to the literal decimal value.
///
/// `mss` is `None` when the SYN carried no MSS option (fingerprint `*`).
pub fn normalize_wss(winsize: u32, mss: Option<u32>) -> String {
    if let Some(mss) = mss {
        if mss > 0 && winsize % mss == 0 {
            return format!("S{}", winsize / mss);
        }
        let padded = mss + 40;
        if padded > 0 && winsize % padded == 0 {
            return format!("T{}", winsize / padded);
        }
    }
    winsize.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_mss_multiple() {
        assert_eq!(normalize_wss(5840, Some(1460)), "S4");
    }

    #[test]
    fn falls_back_to_padded_mss() {
        // 1500 * 1 = 1500, not a multiple of mss(1460) but is of mss+40
        assert_eq!(normalize_wss(1500, Some(1460)), "T1");
    }

    #[test]
    fn falls_back_to_literal() {
        assert_eq!(normalize_wss(12345, Some(1460)), "12345");
        assert_eq!(normalize_wss(12345, None), "12345");
    }

    #[test]
    fn invariant_holds_over_sample_space() {
        for winsize in [0u32, 1, 1460, 2920, 5840, 65535] {
            for mss in [None, Some(1u32), Some(536), Some(1460)] {
                let s = normalize_wss(winsize, mss);
                let ok = s.parse::<u32>().is_ok()
                    || (s.starts_with('S')
                        && mss.is_some_and(|m| m > 0 && s[1..].parse::<u32>().unwrap() * m == winsize))
                    || (s.starts_with('T')
                        && mss.is_some_and(|m| {
                            s[1..].parse::<u32>().unwrap() * (m + 40) == winsize
                        }));
                assert!(ok, "wss={winsize} mss={mss:?} -> {s}");
            }
        }
    }
}
