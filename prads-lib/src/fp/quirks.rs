use std::fmt;

/// TCP quirk bits, in the canonical ordering used by the `quirks` field of
/// a fingerprint string: `P Z I U X A F D T !`.
///
/// Kept as a bitmask rather than a string while matching (spec.md §9): the
/// tree-descent quirk-child test is "the packet's quirk set equals the
/// child key's quirk set", which is a single integer comparison this way.
/// The canonical string form is only produced/consumed at the boundary
/// (fingerprint strings, signature-file keys).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Quirks(u16);

const ORDER: [(char, u16); 10] = [
    ('P', 1 << 0),
    ('Z', 1 << 1),
    ('I', 1 << 2),
    ('U', 1 << 3),
    ('X', 1 << 4),
    ('A', 1 << 5),
    ('F', 1 << 6),
    ('D', 1 << 7),
    ('T', 1 << 8),
    ('!', 1 << 9),
];

impl Quirks {
    pub const P: Quirks = Quirks(1 << 0);
    pub const Z: Quirks = Quirks(1 << 1);
    pub const I: Quirks = Quirks(1 << 2);
    pub const U: Quirks = Quirks(1 << 3);
    pub const X: Quirks = Quirks(1 << 4);
    pub const A: Quirks = Quirks(1 << 5);
    pub const F: Quirks = Quirks(1 << 6);
    pub const D: Quirks = Quirks(1 << 7);
    pub const T: Quirks = Quirks(1 << 8);
    pub const BROKEN_OPT: Quirks = Quirks(1 << 9);

    pub fn empty() -> Self {
        Quirks(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Quirks) {
        self.0 |= other.0;
    }

    pub fn contains(self, other: Quirks) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parse a signature-file quirk key: a concatenation of quirk chars,
    /// or `.` for none. Unknown chars are ignored (loader compatibility
    /// with source, which warns rather than rejects).
    pub fn parse(s: &str) -> Quirks {
        if s == "." {
            return Quirks::empty();
        }
        let mut q = Quirks::empty();
        for c in s.chars() {
            if let Some((_, bit)) = ORDER.iter().find(|(ch, _)| *ch == c) {
                q.0 |= bit;
            }
        }
        q
    }
}

impl fmt::Display for Quirks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, ".");
        }
        for (ch, bit) in ORDER {
            if self.0 & bit != 0 {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}
