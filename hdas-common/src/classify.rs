//! Bounded path matchers.
//!
//! Everything here has to pass the BPF verifier: loops run over compile-time
//! maxima with an early exit, and every byte access goes through `get` or an
//! index already proven to be below `PATH_CAP`.

use crate::{Anchor, Path, Rule, RuleTable, Rules, MAX_RULES, PATH_CAP, PATTERN_CAP, SCAN_LIMIT};

const _: () = assert!(SCAN_LIMIT <= PATH_CAP);
// the last byte a rule can look at, `SCAN_LIMIT - 1 + PATTERN_CAP`, is inside the buffer
const _: () = assert!(SCAN_LIMIT + PATTERN_CAP <= PATH_CAP);

const PREFIX: u8 = Anchor::Prefix as u8;

#[inline(always)]
fn opens_component(path: &Path, pos: usize) -> bool {
    pos == 0 || matches!(path.get(pos - 1), Some(&b'/'))
}

/// NUL ends the string, including the one the kernel leaves after a
/// truncated copy. `end` never reaches `PATH_CAP`; `get` keeps it total anyway.
#[inline(always)]
fn closes_component(path: &Path, end: usize) -> bool {
    matches!(path.get(end), None | Some(&b'/') | Some(&0))
}

impl Rule {
    #[inline(always)]
    fn literal_at(&self, path: &Path, pos: usize) -> bool {
        for k in 0..PATTERN_CAP {
            if k >= self.len as usize {
                break;
            }
            match path.get(pos + k) {
                Some(&c) if c == self.pattern[k] => {}
                _ => return false,
            }
        }
        true
    }

    /// Whether this rule matches with its literal starting at `pos`.
    #[inline(always)]
    pub fn matches_at(&self, path: &Path, pos: usize) -> bool {
        if self.len == 0 {
            return false;
        }
        match self.anchor() {
            Some(Anchor::Prefix) => pos == 0 && self.literal_at(path, 0),
            Some(Anchor::Substring) => self.literal_at(path, pos),
            Some(Anchor::Boundary) => {
                opens_component(path, pos)
                    && self.literal_at(path, pos)
                    && closes_component(path, pos + self.len as usize)
            }
            None => false,
        }
    }
}

impl RuleTable {
    #[inline(always)]
    fn matches_prefix(&self, path: &Path) -> bool {
        for i in 0..MAX_RULES {
            if i >= self.len as usize {
                break;
            }
            let rule = &self.rules[i];
            if rule.anchor == PREFIX && rule.matches_at(path, 0) {
                return true;
            }
        }
        false
    }

    #[inline(always)]
    fn matches_sweep(&self, path: &Path) -> bool {
        for pos in 0..SCAN_LIMIT {
            if path[pos] == 0 {
                break;
            }
            for i in 0..MAX_RULES {
                if i >= self.len as usize {
                    break;
                }
                let rule = &self.rules[i];
                if rule.anchor != PREFIX && rule.matches_at(path, pos) {
                    return true;
                }
            }
        }
        false
    }

    /// Prefix rules are tried first; the positional sweep only runs when none
    /// of them hit.
    #[inline(always)]
    pub fn matches(&self, path: &Path) -> bool {
        self.matches_prefix(path) || self.matches_sweep(path)
    }
}

impl Rules {
    #[inline(always)]
    pub fn is_interesting(&self, path: &Path) -> bool {
        self.interesting.matches(path)
    }

    #[inline(always)]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.matches(path)
    }

    #[inline(always)]
    pub fn should_emit(&self, path: &Path) -> bool {
        self.is_interesting(path) && !self.is_excluded(path)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::OpenEvent;

    fn path(s: &[u8]) -> Path {
        OpenEvent::capture(0, b"", s).path
    }

    fn substring_exclusions() -> Rules {
        let mut excluded = RuleTable::EMPTY;
        excluded
            .push(Rule::new(b"hdas", Anchor::Substring).unwrap())
            .unwrap();
        Rules::new(Rules::DEFAULT.interesting, excluded)
    }

    #[test]
    fn config_file_under_dot_dir_is_emitted() {
        let rules = Rules::DEFAULT;
        let p = path(b"/home/alice/.config/app.toml");
        assert!(rules.is_interesting(&p));
        assert!(!rules.is_excluded(&p));
        assert!(rules.should_emit(&p));
    }

    #[test]
    fn dot_dir_glued_to_longer_name_is_ignored() {
        let rules = Rules::DEFAULT;
        assert!(!rules.is_interesting(&path(b"/home/alice/.configbackup")));
        assert!(!rules.is_interesting(&path(b"/home/alice/.cacheX/y")));
        assert!(!rules.is_interesting(&path(b"/home/alice/x.cache/y")));
        assert!(!rules.is_interesting(&path(b"/srv/my.local")));
    }

    #[test]
    fn absolute_prefix_matches() {
        let rules = Rules::DEFAULT;
        let p = path(b"/etc/passwd");
        assert!(rules.is_interesting(&p));
        assert!(rules.should_emit(&p));
        assert!(!rules.is_interesting(&path(b"/usr/etc/passwd")));
        assert!(!rules.is_interesting(&path(b"/etcetera")));
    }

    #[test]
    fn excluded_name_suppresses_emission() {
        let rules = Rules::DEFAULT;
        let p = path(b"/var/lib/hdas/.cache/x");
        assert!(rules.is_interesting(&p));
        assert!(rules.is_excluded(&p));
        assert!(!rules.should_emit(&p));
    }

    #[test]
    fn empty_path_is_never_interesting() {
        let rules = Rules::DEFAULT;
        let p = path(b"");
        assert!(!rules.is_interesting(&p));
        assert!(!rules.should_emit(&p));
    }

    #[test]
    fn dot_dir_at_start_or_end() {
        let rules = Rules::DEFAULT;
        assert!(rules.is_interesting(&path(b".cache/fontconfig")));
        assert!(rules.is_interesting(&path(b".local")));
        assert!(rules.is_interesting(&path(b"/root/.config")));
        assert!(rules.is_interesting(&path(b"/root/.config/")));
    }

    #[test]
    fn boundary_exclusion_wants_a_whole_component() {
        let rules = Rules::DEFAULT;
        let p = path(b"/opt/myhdasapp/.cache/x");
        assert!(!rules.is_excluded(&p));
        assert!(rules.should_emit(&p));
        assert!(rules.is_excluded(&path(b"/home/bob/.local/share/hdas")));
    }

    #[test]
    fn substring_exclusion_is_looser() {
        let rules = substring_exclusions();
        let p = path(b"/opt/myhdasapp/.cache/x");
        assert!(rules.is_excluded(&p));
        assert!(!rules.should_emit(&p));
    }

    #[test]
    fn empty_tables_match_nothing() {
        let rules = Rules::new(RuleTable::EMPTY, RuleTable::EMPTY);
        let p = path(b"/etc/passwd");
        assert!(!rules.is_interesting(&p));
        assert!(!rules.is_excluded(&p));
    }

    #[test]
    fn unknown_anchor_never_matches() {
        let mut rule = Rule::new(b"etc", Anchor::Substring).unwrap();
        rule.anchor = 0xff;
        assert!(!rule.matches_at(&path(b"/etc/passwd"), 1));
    }

    #[test]
    fn names_past_scan_limit_are_not_seen() {
        let rules = Rules::DEFAULT;
        let mut raw = vec![b'a'; SCAN_LIMIT];
        raw[0] = b'/';
        raw.extend_from_slice(b"/.cache");
        assert!(!rules.is_interesting(&path(&raw)));

        let mut raw = vec![b'a'; 200];
        raw[0] = b'/';
        raw.extend_from_slice(b"/.cache/x");
        assert!(rules.is_interesting(&path(&raw)));
    }

    #[test]
    fn unterminated_full_buffer_does_not_panic() {
        let rules = Rules::DEFAULT;
        let p = [b'/'; PATH_CAP];
        assert!(!rules.is_interesting(&p));
        assert!(!rules.is_excluded(&p));
    }

    #[test]
    fn dot_dir_cut_by_capacity_is_not_seen() {
        let rules = Rules::DEFAULT;
        assert!(rules.is_interesting(&path(b"/home/alice/.config")));

        let mut raw = vec![b'a'; PATH_CAP - 7];
        raw[0] = b'/';
        raw.extend_from_slice(b"/.config");
        assert!(raw.len() > PATH_CAP);
        let p = path(&raw);
        assert_eq!(p[PATH_CAP - 1], 0);
        assert!(!rules.is_interesting(&p));
    }

    #[test]
    fn truncated_copy_ending_in_nul_classifies_its_prefix() {
        let rules = Rules::DEFAULT;
        let mut raw = vec![b'a'; 233];
        raw[0] = b'/';
        raw.extend_from_slice(b"/.cache/");
        raw.extend_from_slice(&[b'b'; 100]);
        let p = path(&raw);
        assert_eq!(p[234], b'.');
        assert_eq!(p[PATH_CAP - 2], b'b');
        assert_eq!(p[PATH_CAP - 1], 0);
        assert!(rules.is_interesting(&p));
        assert!(!rules.is_excluded(&p));
    }

    #[test]
    fn literal_at_last_scanned_position() {
        let mut interesting = RuleTable::EMPTY;
        interesting
            .push(Rule::new(b"0123456789abcdef", Anchor::Substring).unwrap())
            .unwrap();
        let rules = Rules::new(interesting, RuleTable::EMPTY);

        let mut raw = vec![b'x'; SCAN_LIMIT - 1];
        raw.extend_from_slice(b"0123456789abcdef");
        let p = path(&raw);
        assert_eq!(p[PATH_CAP - 1], 0);
        assert!(rules.is_interesting(&p));

        let mut raw = vec![b'x'; SCAN_LIMIT];
        raw.extend_from_slice(b"0123456789abcdef");
        assert!(!rules.is_interesting(&path(&raw)));
    }

    proptest! {
        #[test]
        fn classification_is_idempotent(raw in proptest::collection::vec(any::<u8>(), 0..400)) {
            let rules = Rules::DEFAULT;
            let p = path(&raw);
            prop_assert_eq!(rules.is_interesting(&p), rules.is_interesting(&p));
            prop_assert_eq!(rules.is_excluded(&p), rules.is_excluded(&p));
        }

        #[test]
        fn anything_under_etc_is_interesting(rest in "[a-zA-Z0-9._/-]{0,200}") {
            let raw = format!("/etc/{rest}");
            prop_assert!(Rules::DEFAULT.is_interesting(&path(raw.as_bytes())));
        }

        #[test]
        fn bounded_dot_dirs_are_interesting(
            home in "(/[a-z]{1,12}){0,4}",
            name in prop_oneof![Just(".cache"), Just(".local"), Just(".config")],
            tail in prop_oneof![Just(String::new()), "/[a-z.]{0,30}"],
        ) {
            let raw = format!("{home}/{name}{tail}");
            prop_assert!(Rules::DEFAULT.is_interesting(&path(raw.as_bytes())));
        }

        #[test]
        fn glued_dot_dirs_are_not(suffix in "[a-zA-Z0-9_]{1,8}") {
            let raw = format!("/home/alice/.cache{suffix}");
            prop_assert!(!Rules::DEFAULT.is_interesting(&path(raw.as_bytes())));
        }
    }
}
