//! Catalog writes and read queries
//!
//! Writes here belong to processes outside the crawl loop (problem sync,
//! onboarding, the daily-problem job); the crawler itself only reads through
//! these methods. Each write allocates its ids inside its own transaction and
//! reports the commit attempt, same as the ledger.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::allocator::{next_id, next_ids, Table};
use super::{Database, StorageResult};
use crate::models::{
    DailyChallenge, DailyObject, LeaderboardEntry, NewProblem, NewUser, Problem, SolvedProblem,
    Topic, User, UserDailyScore, UserMonthlyScore, ONBOARDING_SUBMISSION_ID,
};
use crate::utils::{first_day_of_month, Clock};

// ============================================================================
// Row mapping
// ============================================================================

const USER_COLUMNS: &str = "u.id, u.discord_id, u.leetcode_username, u.most_recent_sub_id";
const PROBLEM_COLUMNS: &str = "p.id, p.title, p.title_slug, p.difficulty, p.is_premium";

fn user_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        discord_id: row.get(offset + 1)?,
        leetcode_username: row.get(offset + 2)?,
        most_recent_sub_id: row.get(offset + 3)?,
    })
}

/// Problem without topics; callers attach them with [`load_topics`]
fn problem_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Problem> {
    Ok(Problem {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        title_slug: row.get(offset + 2)?,
        difficulty: row.get(offset + 3)?,
        is_premium: row.get(offset + 4)?,
        topics: Vec::new(),
    })
}

fn daily_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<DailyObject> {
    Ok(DailyObject {
        id: row.get(offset)?,
        generated_date: row.get(offset + 1)?,
        problem_id: row.get(offset + 2)?,
    })
}

fn monthly_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserMonthlyScore> {
    Ok(UserMonthlyScore {
        id: row.get(offset)?,
        user_id: row.get(offset + 1)?,
        first_day_of_month: row.get(offset + 2)?,
        score_earned: row.get(offset + 3)?,
    })
}

/// Daily object generated for `date`
///
/// Shared by the ledger, which runs it inside its write transaction.
pub(super) fn daily_object_on(
    conn: &Connection,
    date: NaiveDate,
) -> rusqlite::Result<Option<DailyObject>> {
    conn.query_row(
        "SELECT id, generated_date, problem_id FROM daily_object WHERE generated_date = ?1",
        params![date],
        |row| daily_from_row(row, 0),
    )
    .optional()
}

/// The user's score row for one daily object
pub(super) fn daily_score_row(
    conn: &Connection,
    user_id: i64,
    daily_object_id: i64,
) -> rusqlite::Result<Option<UserDailyScore>> {
    conn.query_row(
        "SELECT id, user_id, daily_object_id, score_earned FROM user_daily_object
         WHERE user_id = ?1 AND daily_object_id = ?2",
        params![user_id, daily_object_id],
        |row| {
            Ok(UserDailyScore {
                id: row.get(0)?,
                user_id: row.get(1)?,
                daily_object_id: row.get(2)?,
                score_earned: row.get(3)?,
            })
        },
    )
    .optional()
}

/// The user's score row for the month starting on `month`
pub(super) fn monthly_score_row(
    conn: &Connection,
    user_id: i64,
    month: NaiveDate,
) -> rusqlite::Result<Option<UserMonthlyScore>> {
    conn.query_row(
        "SELECT id, user_id, first_day_of_month, score_earned FROM user_monthly_object
         WHERE user_id = ?1 AND first_day_of_month = ?2",
        params![user_id, month],
        |row| monthly_from_row(row, 0),
    )
    .optional()
}

fn load_topics(conn: &Connection, problem_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.topic_name FROM problem_topic pt
         JOIN topic t ON t.id = pt.topic_id
         WHERE pt.problem_id = ?1
         ORDER BY t.topic_name",
    )?;
    let topics = stmt
        .query_map(params![problem_id], |row| row.get(0))?
        .collect();
    topics
}

fn with_topics(conn: &Connection, mut problem: Problem) -> rusqlite::Result<Problem> {
    problem.topics = load_topics(conn, problem.id)?;
    Ok(problem)
}

fn problem_id_by_slug(tx: &Transaction<'_>, slug: &str) -> rusqlite::Result<Option<i64>> {
    tx.query_row(
        "SELECT id FROM problem WHERE title_slug = ?1",
        params![slug],
        |row| row.get(0),
    )
    .optional()
}

impl Database {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Add a topic tag, returning its id
    pub fn create_topic(&self, name: &str) -> StorageResult<i64> {
        let result = self.write(|tx| {
            let id = next_id(tx, Table::Topic)?;
            tx.execute(
                "INSERT INTO topic (id, topic_name) VALUES (?1, ?2)",
                params![id, name],
            )?;
            Ok(id)
        });
        self.report_commit(&format!("Topic<topic_name={name}>"), &result);
        result
    }

    /// Add a problem and link it to the named topics that already exist
    ///
    /// Unknown topic names are ignored.
    pub fn create_problem(&self, problem: &NewProblem) -> StorageResult<i64> {
        let result = self.write(|tx| {
            let id = next_id(tx, Table::Problem)?;
            tx.execute(
                "INSERT INTO problem (id, title, title_slug, difficulty, is_premium)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    problem.title,
                    problem.title_slug,
                    problem.difficulty,
                    problem.is_premium
                ],
            )?;

            for name in &problem.topics {
                let topic_id: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM topic WHERE topic_name = ?1",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()?;

                match topic_id {
                    Some(topic_id) => {
                        tx.execute(
                            "INSERT OR IGNORE INTO problem_topic (problem_id, topic_id)
                             VALUES (?1, ?2)",
                            params![id, topic_id],
                        )?;
                    }
                    None => tracing::debug!(
                        slug = %problem.title_slug,
                        topic = %name,
                        "Unknown topic not linked"
                    ),
                }
            }
            Ok(id)
        });
        self.report_commit(
            &format!(
                "Problem<title_slug={}, difficulty={}>",
                problem.title_slug, problem.difficulty
            ),
            &result,
        );
        result
    }

    /// Onboard a user, crediting the problems they had already solved
    ///
    /// Pre-existing solves are stored with `submission_id = -1` and earn no
    /// score. Slugs missing from the catalog are skipped.
    pub fn create_user(&self, user: &NewUser) -> StorageResult<i64> {
        let result = self.write(|tx| {
            let id = next_id(tx, Table::Users)?;
            tx.execute(
                "INSERT INTO users (id, discord_id, leetcode_username, most_recent_sub_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, user.discord_id, user.leetcode_username, user.most_recent_sub_id],
            )?;

            let mut problem_ids = Vec::with_capacity(user.solved_slugs.len());
            for slug in &user.solved_slugs {
                match problem_id_by_slug(tx, slug)? {
                    Some(problem_id) => problem_ids.push(problem_id),
                    None => tracing::debug!(slug = %slug, "Onboarding slug not in catalog"),
                }
            }

            let solved_ids = next_ids(tx, Table::SolvedProblem, problem_ids.len())?;
            for (solved_id, problem_id) in solved_ids.into_iter().zip(problem_ids) {
                tx.execute(
                    "INSERT INTO user_solved_problem (id, user_id, problem_id, submission_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![solved_id, id, problem_id, ONBOARDING_SUBMISSION_ID],
                )?;
            }
            Ok(id)
        });
        self.report_commit(
            &format!(
                "User<discord_id={}, leetcode_username={}, solved={}>",
                user.discord_id,
                user.leetcode_username,
                user.solved_slugs.len()
            ),
            &result,
        );
        result
    }

    /// Designate `problem_id` as the daily problem for `date`
    pub fn create_daily_object(&self, date: NaiveDate, problem_id: i64) -> StorageResult<i64> {
        let result = self.write(|tx| {
            let id = next_id(tx, Table::DailyObject)?;
            tx.execute(
                "INSERT INTO daily_object (id, generated_date, problem_id) VALUES (?1, ?2, ?3)",
                params![id, date, problem_id],
            )?;
            Ok(id)
        });
        self.report_commit(
            &format!("DailyObject<generated_date={date}, problem_id={problem_id}>"),
            &result,
        );
        result
    }

    /// Create an empty monthly score row for the month containing `month`
    pub fn create_monthly_object(&self, user_id: i64, month: NaiveDate) -> StorageResult<i64> {
        let month = first_day_of_month(month);
        let result = self.write(|tx| {
            let id = next_id(tx, Table::UserMonthlyScore)?;
            tx.execute(
                "INSERT INTO user_monthly_object (id, user_id, first_day_of_month, score_earned)
                 VALUES (?1, ?2, ?3, 0)",
                params![id, user_id, month],
            )?;
            Ok(id)
        });
        self.report_commit(
            &format!("UserMonthlyObject<user_id={user_id}, first_day_of_month={month}>"),
            &result,
        );
        result
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Resolve a problem by its external slug
    pub fn problem_by_slug(&self, slug: &str) -> StorageResult<Option<Problem>> {
        self.read(|conn| {
            let problem = conn
                .query_row(
                    &format!("SELECT {PROBLEM_COLUMNS} FROM problem p WHERE p.title_slug = ?1"),
                    params![slug],
                    |row| problem_from_row(row, 0),
                )
                .optional()?;
            problem.map(|p| with_topics(conn, p)).transpose()
        })
    }

    /// All problems ordered by id
    pub fn problems(&self) -> StorageResult<Vec<Problem>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {PROBLEM_COLUMNS} FROM problem p ORDER BY p.id"))?;
            let problems = stmt
                .query_map([], |row| problem_from_row(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            problems.into_iter().map(|p| with_topics(conn, p)).collect()
        })
    }

    /// All topic tags ordered by name
    pub fn topics(&self) -> StorageResult<Vec<Topic>> {
        self.read(|conn| {
            let mut stmt = conn.prepare("SELECT id, topic_name FROM topic ORDER BY topic_name")?;
            let topics = stmt
                .query_map([], |row| {
                    Ok(Topic {
                        id: row.get(0)?,
                        topic_name: row.get(1)?,
                    })
                })?
                .collect();
            topics
        })
    }

    /// Daily object for `date`, if one was generated
    pub fn daily_for_date(&self, date: NaiveDate) -> StorageResult<Option<DailyObject>> {
        self.read(|conn| daily_object_on(conn, date))
    }

    /// Most recently generated daily object with its problem
    pub fn latest_daily(&self) -> StorageResult<Option<DailyChallenge>> {
        self.read(|conn| {
            let found = conn
                .query_row(
                    &format!(
                        "SELECT d.id, d.generated_date, d.problem_id, {PROBLEM_COLUMNS}
                         FROM daily_object d JOIN problem p ON p.id = d.problem_id
                         ORDER BY d.generated_date DESC LIMIT 1"
                    ),
                    [],
                    |row| Ok((daily_from_row(row, 0)?, problem_from_row(row, 3)?)),
                )
                .optional()?;

            found
                .map(|(daily, problem)| {
                    Ok(DailyChallenge {
                        daily,
                        problem: with_topics(conn, problem)?,
                    })
                })
                .transpose()
        })
    }

    pub fn user(&self, id: i64) -> StorageResult<Option<User>> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
                params![id],
                |row| user_from_row(row, 0),
            )
            .optional()
        })
    }

    /// Look up a user by external handle
    pub fn user_by_handle(&self, handle: &str) -> StorageResult<Option<User>> {
        self.read(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users u
                     WHERE u.leetcode_username = ?1 ORDER BY u.id LIMIT 1"
                ),
                params![handle],
                |row| user_from_row(row, 0),
            )
            .optional()
        })
    }

    /// Users holding a score row for the month containing `month`, highest score first
    pub fn leaderboard(&self, month: NaiveDate) -> StorageResult<Vec<LeaderboardEntry>> {
        let month = first_day_of_month(month);
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS}, m.id, m.user_id, m.first_day_of_month, m.score_earned
                 FROM user_monthly_object m JOIN users u ON u.id = m.user_id
                 WHERE m.first_day_of_month = ?1
                 ORDER BY m.score_earned DESC, u.id ASC"
            ))?;
            let entries = stmt
                .query_map(params![month], |row| {
                    Ok(LeaderboardEntry {
                        user: user_from_row(row, 0)?,
                        monthly: monthly_from_row(row, 4)?,
                    })
                })?
                .collect();
            entries
        })
    }

    pub fn current_month_leaderboard(
        &self,
        clock: &dyn Clock,
    ) -> StorageResult<Vec<LeaderboardEntry>> {
        self.leaderboard(clock.current_month())
    }

    pub fn last_month_leaderboard(
        &self,
        clock: &dyn Clock,
    ) -> StorageResult<Vec<LeaderboardEntry>> {
        self.leaderboard(clock.previous_month())
    }

    /// Number of credit events (including onboarding rows) for a user
    pub fn solved_count(&self, user_id: i64) -> StorageResult<i64> {
        self.read(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM user_solved_problem WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
        })
    }

    /// Credit events for a user in insertion order
    pub fn solved_problems(&self, user_id: i64) -> StorageResult<Vec<SolvedProblem>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, problem_id, submission_id FROM user_solved_problem
                 WHERE user_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok(SolvedProblem {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        problem_id: row.get(2)?,
                        submission_id: row.get(3)?,
                    })
                })?
                .collect();
            rows
        })
    }

    /// The user's score row for the daily object generated on `date`
    pub fn daily_entry(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> StorageResult<Option<UserDailyScore>> {
        self.read(|conn| match daily_object_on(conn, date)? {
            Some(daily) => daily_score_row(conn, user_id, daily.id),
            None => Ok(None),
        })
    }

    /// The user's score for the daily object generated on `date`
    pub fn daily_score(&self, user_id: i64, date: NaiveDate) -> StorageResult<Option<i64>> {
        Ok(self.daily_entry(user_id, date)?.map(|entry| entry.score_earned))
    }

    /// The user's score for the month containing `month`
    pub fn monthly_score(&self, user_id: i64, month: NaiveDate) -> StorageResult<Option<i64>> {
        let month = first_day_of_month(month);
        let row = self.read(|conn| monthly_score_row(conn, user_id, month))?;
        Ok(row.map(|entry| entry.score_earned))
    }
}
