use hdas_common::{OpenEvent, Rules};
use prettytable::{color, row, Attr, Cell, Row, Table};
use serde::Serialize;

use crate::event::lossy;
use crate::track::{Tracked, Tracker};

/// What the in-kernel filter would decide for one path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub interesting: bool,
    /// `None` when the filter never ran.
    pub excluded: Option<bool>,
}

impl Verdict {
    pub fn of(rules: &Rules, path: &str) -> Self {
        let event = OpenEvent::capture(0, b"", path.as_bytes());
        let interesting = rules.is_interesting(&event.path);
        let excluded = interesting.then(|| rules.is_excluded(&event.path));
        Self {
            interesting,
            excluded,
        }
    }

    pub fn emitted(&self) -> bool {
        self.interesting && self.excluded == Some(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub input: String,
    pub expanded: String,
    /// The bytes the kernel side would keep.
    pub retained: String,
    pub interesting: bool,
    pub excluded: Option<bool>,
    pub reported: bool,
    pub tracked: Option<Tracked>,
}

impl Explanation {
    pub fn new(rules: &Rules, tracker: &Tracker, input: &str) -> Self {
        let expanded = tracker.expand(input);
        let verdict = Verdict::of(rules, &expanded);
        let retained = OpenEvent::capture(0, b"", expanded.as_bytes());
        Self {
            input: input.to_string(),
            retained: lossy(retained.path_bytes()),
            interesting: verdict.interesting,
            excluded: verdict.excluded,
            reported: verdict.emitted(),
            tracked: tracker.track(&expanded),
            expanded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRow {
    pub table: &'static str,
    pub anchor: String,
    pub pattern: String,
}

pub fn rule_rows(rules: &Rules) -> Vec<RuleRow> {
    let tables = [("interesting", &rules.interesting), ("excluded", &rules.excluded)];
    tables
        .into_iter()
        .flat_map(|(table, rule_table)| {
            rule_table.iter().map(move |rule| RuleRow {
                table,
                anchor: rule
                    .anchor()
                    .map_or_else(|| "?".to_string(), |anchor| anchor.to_string()),
                pattern: lossy(rule.pattern()),
            })
        })
        .collect()
}

fn yes_no(value: bool) -> Cell {
    match value {
        true => Cell::new("yes").with_style(Attr::ForegroundColor(color::GREEN)),
        false => Cell::new("no").with_style(Attr::ForegroundColor(color::RED)),
    }
}

pub fn explain(rules: &Rules, tracker: &Tracker, input: &str, json: bool) -> anyhow::Result<()> {
    let explanation = Explanation::new(rules, tracker, input);
    if json {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_titles(row!["path", "interesting", "excluded", "reported", "tracked", "matched", "depth"]);
    let (tracked, matched, depth) = match &explanation.tracked {
        Some(hit) => (
            Cell::new(&hit.path).with_style(Attr::ForegroundColor(color::GREEN)),
            Cell::new(&hit.dir),
            Cell::new(&hit.depth.to_string()),
        ),
        None => (
            Cell::new("no").with_style(Attr::ForegroundColor(color::RED)),
            Cell::new("-"),
            Cell::new("-"),
        ),
    };
    table.add_row(Row::new(vec![
        Cell::new(&explanation.retained),
        yes_no(explanation.interesting),
        match explanation.excluded {
            Some(excluded) => yes_no(excluded),
            None => Cell::new("-"),
        },
        yes_no(explanation.reported),
        tracked,
        matched,
        depth,
    ]));
    table.printstd();
    Ok(())
}

pub fn print_rules(rules: &Rules, json: bool) -> anyhow::Result<()> {
    let rows = rule_rows(rules);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_titles(row!["table", "anchor", "pattern"]);
    for rule in &rows {
        table.add_row(row![rule.table, rule.anchor, rule.pattern]);
    }
    table.printstd();
    Ok(())
}
