//! Diesel row models for task persistence.

use super::schema::tasks;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Optional group identifier.
    pub group_id: Option<uuid::Uuid>,
    /// Task title.
    pub title: String,
    /// Agent prompt.
    pub prompt: String,
    /// Agent CLI identifier.
    pub agent: String,
    /// Lifecycle status.
    pub status: String,
    /// Task source.
    pub source: String,
    /// Prerequisite identifiers as a JSON array.
    pub depends_on: Value,
    /// Retry count.
    pub retry_count: i32,
    /// Retry ceiling.
    pub max_retries: i32,
    /// Carried feedback.
    pub feedback: Option<String>,
    /// Reviewer comment.
    pub review_comment: Option<String>,
    /// Last execution error.
    pub error_message: Option<String>,
    /// Review requirement flag.
    pub requires_review: bool,
    /// Bound worker.
    pub assigned_worker_id: Option<uuid::Uuid>,
    /// Repository URL.
    pub repo_url: Option<String>,
    /// Base branch.
    pub base_branch: Option<String>,
    /// Work branch.
    pub work_branch: Option<String>,
    /// Pull request URL.
    pub pr_url: Option<String>,
    /// Queue entry timestamp.
    pub queued_at: Option<DateTime<Utc>>,
    /// Attempt start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Review timestamp.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Optional group identifier.
    pub group_id: Option<uuid::Uuid>,
    /// Task title.
    pub title: String,
    /// Agent prompt.
    pub prompt: String,
    /// Agent CLI identifier.
    pub agent: String,
    /// Lifecycle status.
    pub status: String,
    /// Task source.
    pub source: String,
    /// Prerequisite identifiers as a JSON array.
    pub depends_on: Value,
    /// Retry count.
    pub retry_count: i32,
    /// Retry ceiling.
    pub max_retries: i32,
    /// Carried feedback.
    pub feedback: Option<String>,
    /// Reviewer comment.
    pub review_comment: Option<String>,
    /// Last execution error.
    pub error_message: Option<String>,
    /// Review requirement flag.
    pub requires_review: bool,
    /// Bound worker.
    pub assigned_worker_id: Option<uuid::Uuid>,
    /// Repository URL.
    pub repo_url: Option<String>,
    /// Base branch.
    pub base_branch: Option<String>,
    /// Work branch.
    pub work_branch: Option<String>,
    /// Pull request URL.
    pub pr_url: Option<String>,
    /// Queue entry timestamp.
    pub queued_at: Option<DateTime<Utc>>,
    /// Attempt start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Review timestamp.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Columns rewritten by a conditional update.
///
/// `None` values clear the column rather than leaving it untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChangeset {
    /// Lifecycle status.
    pub status: String,
    /// Task source.
    pub source: String,
    /// Prerequisite identifiers as a JSON array.
    pub depends_on: Value,
    /// Retry count.
    pub retry_count: i32,
    /// Retry ceiling.
    pub max_retries: i32,
    /// Carried feedback.
    pub feedback: Option<String>,
    /// Reviewer comment.
    pub review_comment: Option<String>,
    /// Last execution error.
    pub error_message: Option<String>,
    /// Review requirement flag.
    pub requires_review: bool,
    /// Bound worker.
    pub assigned_worker_id: Option<uuid::Uuid>,
    /// Repository URL.
    pub repo_url: Option<String>,
    /// Base branch.
    pub base_branch: Option<String>,
    /// Work branch.
    pub work_branch: Option<String>,
    /// Pull request URL.
    pub pr_url: Option<String>,
    /// Queue entry timestamp.
    pub queued_at: Option<DateTime<Utc>>,
    /// Attempt start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Review timestamp.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
