//! Diesel schema for task lifecycle persistence.

diesel::table! {
    /// Task records with lifecycle, retry, and review metadata.
    tasks (id) {
        /// Internal task identifier.
        id -> Uuid,
        /// Optional pipeline run the task belongs to.
        group_id -> Nullable<Uuid>,
        /// Short human-readable summary.
        title -> Text,
        /// Instructions for the agent.
        prompt -> Text,
        /// Agent CLI identifier.
        #[max_length = 100]
        agent -> Varchar,
        /// Lifecycle status.
        #[max_length = 50]
        status -> Varchar,
        /// Whether the task is engine-driven or interactive.
        #[max_length = 20]
        source -> Varchar,
        /// JSON array of prerequisite task identifiers.
        depends_on -> Jsonb,
        /// Attempts consumed beyond the first.
        retry_count -> Int4,
        /// Retry ceiling.
        max_retries -> Int4,
        /// Guidance carried into the next attempt.
        feedback -> Nullable<Text>,
        /// Reviewer comment from the last decision.
        review_comment -> Nullable<Text>,
        /// Last execution error.
        error_message -> Nullable<Text>,
        /// Whether finished work waits for a human review.
        requires_review -> Bool,
        /// Worker currently executing the task.
        assigned_worker_id -> Nullable<Uuid>,
        /// Repository clone URL.
        repo_url -> Nullable<Text>,
        /// Branch the work starts from.
        base_branch -> Nullable<Text>,
        /// Branch the work is pushed to.
        work_branch -> Nullable<Text>,
        /// Pull request opened for the work branch.
        pr_url -> Nullable<Text>,
        /// When the task last entered the queue.
        queued_at -> Nullable<Timestamptz>,
        /// When the current attempt started.
        started_at -> Nullable<Timestamptz>,
        /// When the task reached a final status.
        completed_at -> Nullable<Timestamptz>,
        /// When the last review decision was taken.
        reviewed_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
