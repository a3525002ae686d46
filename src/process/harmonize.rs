// src/process/harmonize.rs
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

use super::raw_table::RawTable;
use super::utils::{normalize_key, parse_numeric};
use crate::error::SchemaError;
use crate::reference::CanonicalColumns;

/// Variables every downstream indicator reads.
pub const REQUIRED_COLUMNS: [&str; 6] = ["ent", "eda", "p1", "p3o", "p3p2", "p6b2"];

/// Outcome of reconciling two extracts against the canonical column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledSchema {
    /// Canonical columns kept from the first extract, in file order.
    pub left_columns: Vec<String>,
    /// Canonical columns kept from the second extract, in file order.
    pub right_columns: Vec<String>,
    /// Columns present in both; the left-join key, sorted.
    pub join_keys: Vec<String>,
    /// Columns the second extract contributes beyond the keys.
    pub right_only: Vec<String>,
}

impl ReconciledSchema {
    /// Column order of the joined table.
    pub fn output_columns(&self) -> Vec<String> {
        self.left_columns
            .iter()
            .chain(self.right_only.iter())
            .cloned()
            .collect()
    }
}

fn retain_canonical(headers: &[String], canonical: &CanonicalColumns) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .map(|h| h.to_lowercase())
        .filter(|h| canonical.contains(h) && seen.insert(h.clone()))
        .collect()
}

/// Intersect each extract with the canonical list and derive the join keys.
///
/// Fails with [`SchemaError::EmptyJoinKeys`] when the extracts share nothing,
/// and with [`SchemaError::MissingColumn`] when a required variable survives
/// in neither.
pub fn reconcile_schema(
    left_headers: &[String],
    right_headers: &[String],
    canonical: &CanonicalColumns,
) -> Result<ReconciledSchema, SchemaError> {
    let left_columns = retain_canonical(left_headers, canonical);
    let right_columns = retain_canonical(right_headers, canonical);

    let left_set: BTreeSet<&String> = left_columns.iter().collect();
    let join_keys: Vec<String> = right_columns
        .iter()
        .filter(|c| left_set.contains(c))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if join_keys.is_empty() {
        return Err(SchemaError::EmptyJoinKeys);
    }
    let right_only: Vec<String> = right_columns
        .iter()
        .filter(|c| !left_set.contains(c))
        .cloned()
        .collect();

    let schema = ReconciledSchema {
        left_columns,
        right_columns,
        join_keys,
        right_only,
    };
    let output = schema.output_columns();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|req| !output.iter().any(|c| c == *req))
    {
        return Err(SchemaError::MissingColumn {
            column: missing.to_string(),
        });
    }
    Ok(schema)
}

/// Positions of `names` inside `headers`, matched case-insensitively
/// (first occurrence wins).
fn positions(headers: &[String], names: &[String]) -> Vec<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    names
        .iter()
        .filter_map(|n| lowered.iter().position(|h| h == n))
        .collect()
}

fn project(row: &[String], idx: &[usize]) -> Vec<String> {
    idx.iter()
        .map(|&i| row.get(i).cloned().unwrap_or_default())
        .collect()
}

fn key_of(row: &[String], idx: &[usize]) -> Vec<String> {
    idx.iter()
        .map(|&i| normalize_key(row.get(i).map(String::as_str).unwrap_or("")))
        .collect()
}

/// Merge the two questionnaire extracts of a wave into one respondent table.
///
/// Headers are lower-cased, non-canonical columns dropped, and the second
/// extract is left-joined onto the first on their shared columns. Only
/// respondents with `eda > min_age` are kept.
pub fn harmonize(
    left: &RawTable,
    right: &RawTable,
    canonical: &CanonicalColumns,
    min_age: f64,
) -> Result<RawTable, SchemaError> {
    let schema = reconcile_schema(&left.headers, &right.headers, canonical)?;
    info!(join_keys = ?schema.join_keys, extra = ?schema.right_only, "reconciled schema");

    let left_idx = positions(&left.headers, &schema.left_columns);
    let left_key_idx = positions(&left.headers, &schema.join_keys);
    let right_key_idx = positions(&right.headers, &schema.join_keys);
    let right_only_idx = positions(&right.headers, &schema.right_only);

    let mut lookup: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        lookup.entry(key_of(row, &right_key_idx)).or_default().push(i);
    }

    let headers = schema.output_columns();
    let age_idx = headers
        .iter()
        .position(|h| h == "eda")
        .ok_or_else(|| SchemaError::MissingColumn {
            column: "eda".to_string(),
        })?;

    let blank_right = vec![String::new(); right_only_idx.len()];

    let mut rows = Vec::with_capacity(left.rows.len());
    let mut unmatched = 0usize;
    for row in &left.rows {
        let base = project(row, &left_idx);
        match lookup.get(&key_of(row, &left_key_idx)) {
            Some(matches) => {
                for &m in matches {
                    let mut joined = base.clone();
                    joined.extend(project(&right.rows[m], &right_only_idx));
                    rows.push(joined);
                }
            }
            None => {
                unmatched += 1;
                let mut joined = base;
                joined.extend(blank_right.iter().cloned());
                rows.push(joined);
            }
        }
    }

    let joined = rows.len();
    rows.retain(|r| {
        r.get(age_idx)
            .and_then(|v| parse_numeric(v))
            .map(|age| age > min_age)
            .unwrap_or(false)
    });
    debug!(
        left = left.rows.len(),
        right = right.rows.len(),
        joined,
        unmatched,
        eligible = rows.len(),
        "harmonized extracts"
    );
    Ok(RawTable::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TEST_COLUMNS;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn canonical() -> CanonicalColumns {
        CanonicalColumns::new(TEST_COLUMNS)
    }

    #[test]
    fn join_keys_are_the_shared_canonical_columns() -> Result<(), SchemaError> {
        let schema = reconcile_schema(
            &names(&["ENT", "CON", "EDA", "P1", "P3O", "P3P2", "JUNK"]),
            &names(&["ent", "con", "p6b2", "other"]),
            &canonical(),
        )?;
        assert_eq!(schema.join_keys, vec!["con", "ent"]);
        assert_eq!(schema.right_only, vec!["p6b2"]);
        assert_eq!(
            schema.output_columns(),
            vec!["ent", "con", "eda", "p1", "p3o", "p3p2", "p6b2"]
        );
        Ok(())
    }

    #[test]
    fn disjoint_extracts_fail_loudly() {
        let err = reconcile_schema(
            &names(&["ent", "eda", "p1", "p3o", "p3p2"]),
            &names(&["p6b2"]),
            &canonical(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::EmptyJoinKeys));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let err = reconcile_schema(
            &names(&["ent", "eda", "p1", "p3o"]),
            &names(&["ent", "p6b2"]),
            &canonical(),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::MissingColumn { column } if column == "p3p2"));
    }

    #[test]
    fn left_join_keeps_unmatched_and_repeats_duplicates() -> Result<(), SchemaError> {
        let left = table(
            &["ENT", "CON", "EDA", "P1", "P3O", "P3P2", "EXTRA"],
            &[
                &["1", "10", "30", "1", "2", "", "x"],
                &["2", "20", "40", "2", "1", "09", "x"],
                &["3", "30", "50", "1", "2", "", "x"],
            ],
        );
        let right = table(
            &["ent", "con", "p6b2"],
            &[&["01", "10", "5000"], &["2", "20.0", "100"], &["2", "20", "200"]],
        );
        let joined = harmonize(&left, &right, &canonical(), 14.0)?;
        assert_eq!(
            joined.headers,
            vec!["ent", "con", "eda", "p1", "p3o", "p3p2", "p6b2"]
        );
        assert_eq!(joined.len(), 4);
        assert_eq!(joined.rows[0][6], "5000");
        assert_eq!(joined.rows[1][6], "100");
        assert_eq!(joined.rows[2][6], "200");
        // unmatched respondent survives with a blank income
        assert_eq!(joined.rows[3][0], "3");
        assert_eq!(joined.rows[3][6], "");
        Ok(())
    }

    #[test]
    fn age_filter_applies_after_join() -> Result<(), SchemaError> {
        let left = table(
            &["ent", "con", "eda", "p1", "p3o", "p3p2"],
            &[
                &["1", "1", "14", "1", "2", ""],
                &["1", "2", "15", "1", "2", ""],
                &["1", "3", "", "1", "2", ""],
                &["1", "4", "abc", "1", "2", ""],
            ],
        );
        let right = table(&["ent", "con", "p6b2"], &[&["1", "2", "10"]]);
        let joined = harmonize(&left, &right, &canonical(), 14.0)?;
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.rows[0][2], "15");
        Ok(())
    }
}
