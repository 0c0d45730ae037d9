// Unit listing parser: systemctl output lines -> structured records

use crate::fleet::models::{ActiveState, UnitRecord};
use regex::Regex;
use std::sync::OnceLock;

/// Column layout of one relevant `systemctl list-units` line: unit name,
/// load state, active state, sub state, description, then a bracketed
/// tag list introduced by the literal `Tags [` marker.
fn unit_line_regex() -> &'static Regex {
    static UNIT_LINE_RE: OnceLock<Regex> = OnceLock::new();
    UNIT_LINE_RE.get_or_init(|| {
        Regex::new(r"^\W*([\w.@-]+)\.service\s+(\w+)\s+(\w+)\s+(\w+)\s+(.+?)\s+Tags \[(.+?)\]")
            .expect("unit line regex is valid")
    })
}

/// Parse raw `systemctl list-units` output into unit records.
///
/// Pure function, order preserving. Lines that do not match the expected
/// layout are skipped entirely; a bad line never contributes fields to
/// any record. A matching line with an unrecognized active state is
/// skipped as well.
pub fn parse_unit_records(raw: &str, hostname: &str) -> Vec<UnitRecord> {
    let mut records = Vec::new();

    for line in raw.lines() {
        let Some(captures) = unit_line_regex().captures(line) else {
            if !line.trim().is_empty() {
                tracing::debug!("Skipping non-record line: {}", line.trim());
            }
            continue;
        };

        let active_state = &captures[3];
        let Some(active_state) = ActiveState::parse(active_state) else {
            tracing::debug!(
                "Skipping unit '{}' with unrecognized active state '{}'",
                &captures[1],
                active_state
            );
            continue;
        };

        records.push(UnitRecord {
            unit: captures[1].to_string(),
            load_state: captures[2].to_string(),
            active_state,
            sub_state: captures[4].to_string(),
            description: captures[5].to_string(),
            tags: captures[6].split(", ").map(str::to_string).collect(),
            hostname: hostname.to_string(),
        });
    }

    records
}
