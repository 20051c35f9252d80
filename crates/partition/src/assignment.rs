//! Partition assignments as the engines leave them on disk.
//!
//! Two layouts exist. The partitioner writes one bare group index per line,
//! line `i` belonging to node id `base + i`. The mapper writes
//! `<nodeId> <groupId>` pairs, usually after a count line.

use crate::{NodeIndexMapping, PartitionError};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentFormat {
    ByPosition,
    Pairs,
}

impl AssignmentFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "position" | "by-position" | "metis" => Some(Self::ByPosition),
            "pairs" | "scotch" => Some(Self::Pairs),
            _ => None,
        }
    }
}

/// One group index per line. Trailing blank lines are tolerated, anything
/// else that is not an integer is an error.
pub fn parse_by_position(text: &str) -> Result<Vec<u32>, PartitionError> {
    text.trim_end()
        .lines()
        .enumerate()
        .map(|(i, l)| {
            l.trim().parse::<u32>().map_err(|_| PartitionError::MalformedLine {
                line: i + 1,
                text: l.trim().to_string(),
            })
        })
        .collect()
}

/// `(node id, group)` pairs; lines that are not exactly two integers are
/// skipped.
pub fn parse_pairs(text: &str) -> Vec<(usize, u32)> {
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines() {
        let mut it = line.split_whitespace();
        let pair = match (it.next(), it.next(), it.next()) {
            (Some(a), Some(b), None) => a.parse::<usize>().ok().zip(b.parse::<u32>().ok()),
            _ => None,
        };
        match pair {
            Some(p) => out.push(p),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "non-pair lines ignored in assignment");
    }
    out
}

/// Group per mapped node id. Nodes the engine did not report stay `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAssignment {
    base: usize,
    groups: Vec<Option<u32>>,
}

impl PartitionAssignment {
    /// By-position assignment; one entry per mapped node, no more, no less.
    pub fn from_by_position(text: &str, mapping: &NodeIndexMapping) -> Result<Self, PartitionError> {
        let groups = parse_by_position(text)?;
        if groups.len() != mapping.len() {
            return Err(PartitionError::FormatMismatch {
                what: "assignment entries",
                expected: mapping.len(),
                found: groups.len(),
            });
        }
        Ok(Self { base: mapping.base(), groups: groups.into_iter().map(Some).collect() })
    }

    /// Pair assignment; a repeated id keeps its last group.
    pub fn from_pairs(text: &str, mapping: &NodeIndexMapping) -> Result<Self, PartitionError> {
        let mut groups = vec![None; mapping.len()];
        for (id, group) in parse_pairs(text) {
            let slot = id
                .checked_sub(mapping.base())
                .and_then(|i| groups.get_mut(i))
                .ok_or(PartitionError::FormatMismatch {
                    what: "node id within the mapping",
                    expected: mapping.base() + mapping.len().saturating_sub(1),
                    found: id,
                })?;
            *slot = Some(group);
        }
        Ok(Self { base: mapping.base(), groups })
    }

    pub fn parse(text: &str, format: AssignmentFormat, mapping: &NodeIndexMapping) -> Result<Self, PartitionError> {
        match format {
            AssignmentFormat::ByPosition => Self::from_by_position(text, mapping),
            AssignmentFormat::Pairs => Self::from_pairs(text, mapping),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P, format: AssignmentFormat, mapping: &NodeIndexMapping) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        let a = Self::parse(&text, format, mapping).with_context(|| format!("invalid assignment {}", path.display()))?;
        Ok(a)
    }

    pub fn group(&self, id: usize) -> Option<u32> {
        id.checked_sub(self.base).and_then(|i| self.groups.get(i).copied().flatten())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn assigned(&self) -> usize {
        self.groups.iter().filter(|g| g.is_some()).count()
    }

    pub fn groups_in_use(&self) -> BTreeSet<u32> {
        self.groups.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(base: usize, names: &[&str]) -> NodeIndexMapping {
        let mut m = NodeIndexMapping::new(base);
        for n in names {
            m.insert(n);
        }
        m
    }

    #[test]
    fn by_position_lines() {
        assert_eq!(parse_by_position("0\n1\n 1 \n0\n\n").unwrap(), [0, 1, 1, 0]);
        assert_eq!(parse_by_position("").unwrap(), Vec::<u32>::new());
        assert_eq!(
            parse_by_position("0\n\n1\n").unwrap_err(),
            PartitionError::MalformedLine { line: 2, text: String::new() }
        );
        assert!(matches!(parse_by_position("0\nx\n"), Err(PartitionError::MalformedLine { line: 2, .. })));
    }

    #[test]
    fn by_position_count_must_match() {
        let m = mapping(1, &["a", "b", "c"]);
        let err = PartitionAssignment::from_by_position("0\n1\n", &m).unwrap_err();
        assert_eq!(err, PartitionError::FormatMismatch { what: "assignment entries", expected: 3, found: 2 });
        assert!(PartitionAssignment::from_by_position("0\n1\n1\n0\n", &m).is_err());

        let a = PartitionAssignment::from_by_position("0\n1\n1\n", &m).unwrap();
        assert_eq!(a.group(1), Some(0));
        assert_eq!(a.group(3), Some(1));
        assert_eq!(a.group(0), None);
        assert_eq!(a.group(4), None);
    }

    #[test]
    fn pairs_skip_noise() {
        let text = "3\n0 1\nbogus line\n1 0 extra\n2 -1\n2 2\n";
        assert_eq!(parse_pairs(text), [(0, 1), (2, 2)]);
    }

    #[test]
    fn pairs_may_leave_gaps() {
        let m = mapping(0, &["a", "b", "c"]);
        let a = PartitionAssignment::from_pairs("2\n0 4\n2 1\n0 5\n", &m).unwrap();
        assert_eq!(a.group(0), Some(5));
        assert_eq!(a.group(1), None);
        assert_eq!(a.assigned(), 2);
        assert_eq!(a.groups_in_use().into_iter().collect::<Vec<_>>(), [1, 5]);
    }

    #[test]
    fn pair_ids_outside_mapping() {
        let m = mapping(0, &["a", "b"]);
        let err = PartitionAssignment::from_pairs("0 0\n7 1\n", &m).unwrap_err();
        assert!(matches!(err, PartitionError::FormatMismatch { expected: 1, found: 7, .. }), "{err}");
        let m1 = mapping(1, &["a"]);
        assert!(PartitionAssignment::from_pairs("0 0\n", &m1).is_err());
    }

    #[test]
    fn format_names() {
        assert_eq!(AssignmentFormat::from_name("metis"), Some(AssignmentFormat::ByPosition));
        assert_eq!(AssignmentFormat::from_name("pairs"), Some(AssignmentFormat::Pairs));
        assert_eq!(AssignmentFormat::from_name("csv"), None);
    }
}
