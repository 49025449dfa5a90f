//! Aggregate views for the overview screens.
//!
//! Chart series are built by fetching one flat column projection and
//! counting distinct values client side; the tables involved are small
//! enough to fit in memory, so there is no pagination. Headline
//! numbers use count queries and never transfer rows.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::Error;
use crate::grid::Row;
use crate::schema::stringify_cell;
use crate::Portal;

/// Bucket for rows with no usable value in the grouped column
pub const UNLABELED: &str = "unknown";

/// One bar or pie slice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub count: u64,
}

/// Totals shown at the top of the overview screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeadlineCounts {
    pub students: u64,
    pub employees: u64,
    pub educators: u64,
    pub centers: u64,
}

/// Count rows per distinct value of one column.
///
/// Nulls, missing cells and non-scalar values all land in the
/// [`UNLABELED`] bucket. Points come back sorted by label, so the same
/// rows always chart the same way.
pub fn group_count(rows: &[Row], column: &str) -> Vec<SeriesPoint> {
    let mut buckets: BTreeMap<String, u64> = BTreeMap::new();

    for row in rows {
        let label = row
            .get(column)
            .and_then(stringify_cell)
            .unwrap_or_else(|| UNLABELED.to_string());
        *buckets.entry(label).or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(label, count)| SeriesPoint { label, count })
        .collect()
}

/// Swap series labels through a lookup, merging points that land on
/// the same name. Labels without an entry are kept as they are.
fn relabel(points: Vec<SeriesPoint>, names: &HashMap<String, String>) -> Vec<SeriesPoint> {
    let mut buckets: BTreeMap<String, u64> = BTreeMap::new();

    for point in points {
        let label = names.get(&point.label).cloned().unwrap_or(point.label);
        *buckets.entry(label).or_insert(0) += point.count;
    }

    buckets
        .into_iter()
        .map(|(label, count)| SeriesPoint { label, count })
        .collect()
}

/// Aggregate queries used by the overview screens
pub struct Dashboard {
    portal: Portal,
}

impl Dashboard {
    pub(crate) fn new(portal: Portal) -> Self {
        Self { portal }
    }

    /// Students grouped by one column, for example `diagnosis`,
    /// `gender` or `enrollment_year`
    pub async fn student_breakdown(&self, column: &str) -> Result<Vec<SeriesPoint>, Error> {
        let rows: Vec<Row> = self
            .portal
            .entity("students")
            .select(column)
            .execute()
            .await?;
        Ok(group_count(&rows, column))
    }

    /// Students per center, labeled with center names
    pub async fn students_per_center(&self) -> Result<Vec<SeriesPoint>, Error> {
        let points = self.student_breakdown("center_id").await?;

        let centers: Vec<Row> = self
            .portal
            .entity("centers")
            .select("id,name")
            .execute()
            .await?;

        let mut names = HashMap::new();
        for center in &centers {
            let id = center.get("id").and_then(stringify_cell);
            let name = center.get("name").and_then(stringify_cell);
            if let (Some(id), Some(name)) = (id, name) {
                names.insert(id, name);
            }
        }

        Ok(relabel(points, &names))
    }

    /// Row totals for the headline cards
    pub async fn headline_counts(&self) -> Result<HeadlineCounts, Error> {
        let students = self.portal.entity("students").count().execute().await?;
        let employees = self.portal.entity("employees").count().execute().await?;
        let educators = self.portal.entity("educators").count().execute().await?;
        let centers = self.portal.entity("centers").count().execute().await?;

        Ok(HeadlineCounts {
            students,
            employees,
            educators,
            centers,
        })
    }
}
