//! Gap-filling identifier allocation
//!
//! New rows never rely on SQLite's rowid counter. Each insert takes the
//! smallest non-negative integer not already used as an `id` in the target
//! table, so identifiers freed by deletions are recycled and the id space stays
//! dense.
//!
//! Allocation reads the table and returns ids without reserving them, so it
//! only holds up when the caller inserts the rows inside the same transaction
//! and there is a single writer process. The functions take a
//! [`Transaction`] to make the first requirement impossible to skip.

use rusqlite::Transaction;

use super::StorageResult;

/// Tables whose identifiers come from the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Topic,
    Problem,
    SolvedProblem,
    DailyObject,
    UserDailyScore,
    UserMonthlyScore,
}

impl Table {
    /// SQL table name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Topic => "topic",
            Self::Problem => "problem",
            Self::SolvedProblem => "user_solved_problem",
            Self::DailyObject => "daily_object",
            Self::UserDailyScore => "user_daily_object",
            Self::UserMonthlyScore => "user_monthly_object",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Smallest unused identifier in `table`
pub fn next_id(tx: &Transaction<'_>, table: Table) -> StorageResult<i64> {
    let sql = format!(
        "SELECT CASE
             WHEN NOT EXISTS (SELECT 1 FROM {t} WHERE id = 0) THEN 0
             ELSE (
                 SELECT MIN(a.id) + 1 FROM {t} a
                 WHERE a.id >= 0
                   AND NOT EXISTS (SELECT 1 FROM {t} b WHERE b.id = a.id + 1)
             )
         END",
        t = table.name()
    );

    let id: i64 = tx.query_row(&sql, [], |row| row.get(0))?;
    tracing::trace!(table = %table, id, "Allocated identifier");
    Ok(id)
}

/// The `count` smallest unused identifiers in `table`, ascending
pub fn next_ids(tx: &Transaction<'_>, table: Table, count: usize) -> StorageResult<Vec<i64>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let sql = format!("SELECT id FROM {} WHERE id >= 0 ORDER BY id", table.name());
    let mut stmt = tx.prepare(&sql)?;
    let used = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let ids = first_free_ids(used, count);
    tracing::trace!(table = %table, count, ?ids, "Allocated identifiers");
    Ok(ids)
}

/// The `count` smallest non-negative integers missing from `used`
///
/// `used` may be unsorted and contain duplicates or negative values.
pub fn first_free_ids<I>(used: I, count: usize) -> Vec<i64>
where
    I: IntoIterator<Item = i64>,
{
    let mut used: Vec<i64> = used.into_iter().filter(|id| *id >= 0).collect();
    used.sort_unstable();
    used.dedup();

    let mut free = Vec::with_capacity(count);
    let mut taken = used.into_iter().peekable();
    let mut candidate = 0i64;

    while free.len() < count {
        if taken.peek() == Some(&candidate) {
            taken.next();
        } else {
            free.push(candidate);
        }
        candidate += 1;
    }

    free
}
