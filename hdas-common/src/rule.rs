use num_enum::TryFromPrimitive;

use crate::{MAX_RULES, PATTERN_CAP};

/// Where a rule's literal has to sit inside a path.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, derive_more::Display)]
pub enum Anchor {
    /// At offset 0 only.
    #[display(fmt = "prefix")]
    Prefix = 1,
    /// A whole path component: `/` or start before it, `/` or end after it.
    #[display(fmt = "boundary")]
    Boundary = 2,
    /// Anywhere.
    #[display(fmt = "substring")]
    Substring = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum RuleError {
    #[display(fmt = "pattern is empty")]
    Empty,
    #[display(fmt = "pattern is longer than {} bytes", PATTERN_CAP)]
    TooLong,
    #[display(fmt = "pattern contains a NUL byte")]
    Nul,
    #[display(fmt = "directory name must not begin or end with '/'")]
    Separator,
    #[display(fmt = "rule table already holds {} rules", MAX_RULES)]
    TableFull,
}

impl core::error::Error for RuleError {}

/// A fixed-capacity literal plus its anchoring mode.
///
/// `anchor` is kept as a raw byte so the struct stays plain data inside a BPF
/// map; an unknown value never matches anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct Rule {
    pub(crate) pattern: [u8; PATTERN_CAP],
    pub(crate) len: u8,
    pub(crate) anchor: u8,
}

impl Rule {
    const UNSET: Self = Self {
        pattern: [0; PATTERN_CAP],
        len: 0,
        anchor: 0,
    };

    pub const fn new(pattern: &[u8], anchor: Anchor) -> Result<Self, RuleError> {
        let len = pattern.len();
        if len == 0 {
            return Err(RuleError::Empty);
        }
        if len > PATTERN_CAP {
            return Err(RuleError::TooLong);
        }
        if matches!(anchor, Anchor::Boundary) && (pattern[0] == b'/' || pattern[len - 1] == b'/') {
            return Err(RuleError::Separator);
        }
        let mut buf = [0u8; PATTERN_CAP];
        let mut i = 0;
        while i < len {
            if pattern[i] == 0 {
                return Err(RuleError::Nul);
            }
            buf[i] = pattern[i];
            i += 1;
        }
        Ok(Self {
            pattern: buf,
            len: len as u8,
            anchor: anchor as u8,
        })
    }

    /// Compile-time rule; an invalid literal fails the build.
    const fn builtin(pattern: &[u8], anchor: Anchor) -> Self {
        match Self::new(pattern, anchor) {
            Ok(rule) => rule,
            Err(_) => panic!("invalid built-in rule"),
        }
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern[..(self.len as usize).min(PATTERN_CAP)]
    }

    pub fn anchor(&self) -> Option<Anchor> {
        Anchor::try_from_primitive(self.anchor).ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct RuleTable {
    pub(crate) rules: [Rule; MAX_RULES],
    pub(crate) len: u8,
}

impl RuleTable {
    pub const EMPTY: Self = Self {
        rules: [Rule::UNSET; MAX_RULES],
        len: 0,
    };

    const fn with(mut self, rule: Rule) -> Self {
        if self.len as usize >= MAX_RULES {
            panic!("built-in rule table overflow");
        }
        self.rules[self.len as usize] = rule;
        self.len += 1;
        self
    }

    pub fn push(&mut self, rule: Rule) -> Result<(), RuleError> {
        let slot = self
            .rules
            .get_mut(self.len as usize)
            .ok_or(RuleError::TableFull)?;
        *slot = rule;
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        (self.len as usize).min(MAX_RULES)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules[..self.len()].iter()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Everything the eBPF program needs to decide whether an open is reported.
/// Written once into the `RULES` map by the collector, read-only afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct Rules {
    pub interesting: RuleTable,
    pub excluded: RuleTable,
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for Rules {}

impl Rules {
    pub const DEFAULT: Self = Self {
        interesting: RuleTable::EMPTY
            .with(Rule::builtin(b"/etc/", Anchor::Prefix))
            .with(Rule::builtin(b".cache", Anchor::Boundary))
            .with(Rule::builtin(b".local", Anchor::Boundary))
            .with(Rule::builtin(b".config", Anchor::Boundary)),
        excluded: RuleTable::EMPTY.with(Rule::builtin(b"hdas", Anchor::Boundary)),
    };

    pub const fn new(interesting: RuleTable, excluded: RuleTable) -> Self {
        Self {
            interesting,
            excluded,
        }
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::DEFAULT
    }
}
