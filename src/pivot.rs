use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::record::InvoiceRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Subsystem {
    Careport,
    Sunrise,
}

impl Subsystem {
    pub fn sheet_name(self) -> &'static str {
        match self {
            Subsystem::Careport => "Careport Pivot",
            Subsystem::Sunrise => "Sunrise Pivot",
        }
    }

    pub fn counter_header(self) -> &'static str {
        match self {
            Subsystem::Careport => "CareportSuccessCount",
            Subsystem::Sunrise => "SunriseSuccessCount",
        }
    }

    fn success_count(self, row: &InvoiceRow) -> u32 {
        match self {
            Subsystem::Careport => row.attempts.careport_success,
            Subsystem::Sunrise => row.attempts.sunrise_success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotRow {
    pub category: &'static str,
    pub counts: Vec<usize>,
    pub total: usize,
}

/// Invoice rows per reason category, split by one subsystem's success count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryPivot {
    pub subsystem: Subsystem,
    pub counter_values: Vec<u32>,
    pub rows: Vec<PivotRow>,
}

impl CategoryPivot {
    pub fn build(subsystem: Subsystem, rows: &[InvoiceRow]) -> Self {
        let mut cells: BTreeMap<&'static str, BTreeMap<u32, usize>> = BTreeMap::new();
        let mut values = BTreeSet::new();
        for row in rows {
            // unlabelled rows have no pivot row
            let Some(label) = row.category.label() else {
                continue;
            };
            let value = subsystem.success_count(row);
            values.insert(value);
            *cells.entry(label).or_default().entry(value).or_insert(0) += 1;
        }

        let counter_values = values.into_iter().collect::<Vec<_>>();
        let rows = cells
            .into_iter()
            .map(|(category, by_value)| {
                let counts = counter_values
                    .iter()
                    .map(|v| by_value.get(v).copied().unwrap_or(0))
                    .collect::<Vec<_>>();
                let total = counts.iter().sum();
                PivotRow {
                    category,
                    counts,
                    total,
                }
            })
            .collect();

        Self {
            subsystem,
            counter_values,
            rows,
        }
    }
}

pub fn build_pivots(rows: &[InvoiceRow]) -> Vec<CategoryPivot> {
    vec![
        CategoryPivot::build(Subsystem::Careport, rows),
        CategoryPivot::build(Subsystem::Sunrise, rows),
    ]
}
