// Core data structures for the submission crawler

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Submission marker stored for problems credited at onboarding time
pub const ONBOARDING_SUBMISSION_ID: i64 = -1;

/// Problem difficulty as reported by the judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

impl ToSql for Difficulty {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Difficulty {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Tracked community member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Chat-platform member id
    pub discord_id: String,
    /// Handle on the judge, used to pull recent submissions
    pub leetcode_username: String,
    pub most_recent_sub_id: i64,
}

/// Problem topic tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub topic_name: String,
}

/// Judge problem, synced from the problem catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub title: String,
    /// External unique key
    pub title_slug: String,
    pub difficulty: Difficulty,
    pub is_premium: bool,
    pub topics: Vec<String>,
}

/// One credit event: a user was credited for a submission on a problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvedProblem {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: i64,
    pub submission_id: i64,
}

/// The designated problem for one calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyObject {
    pub id: i64,
    pub generated_date: NaiveDate,
    pub problem_id: i64,
}

/// Daily object joined with its problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyChallenge {
    pub daily: DailyObject,
    pub problem: Problem,
}

/// A user's running score for one daily object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDailyScore {
    pub id: i64,
    pub user_id: i64,
    pub daily_object_id: i64,
    pub score_earned: i64,
}

/// A user's running score for one month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMonthlyScore {
    pub id: i64,
    pub user_id: i64,
    pub first_day_of_month: NaiveDate,
    pub score_earned: i64,
}

/// Leaderboard row: a user with a monthly score row for the month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user: User,
    pub monthly: UserMonthlyScore,
}

/// Accepted submission as reported by the activity source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecentSubmission {
    pub submission_id: i64,
    pub title_slug: String,
}

impl RecentSubmission {
    pub fn new(submission_id: i64, title_slug: impl Into<String>) -> Self {
        Self {
            submission_id,
            title_slug: title_slug.into(),
        }
    }
}

/// Onboarding request for a new user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub discord_id: String,
    pub leetcode_username: String,
    pub most_recent_sub_id: i64,
    /// Slugs the user had already solved before joining
    #[serde(default)]
    pub solved_slugs: Vec<String>,
}

/// Catalog entry for a new problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProblem {
    pub title: String,
    pub title_slug: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub is_premium: bool,
    /// Topic names; only topics already present in the catalog are linked
    #[serde(default)]
    pub topics: Vec<String>,
}

impl NewProblem {
    pub fn new(
        title: impl Into<String>,
        title_slug: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            title: title.into(),
            title_slug: title_slug.into(),
            difficulty,
            is_premium: false,
            topics: Vec::new(),
        }
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }
}
