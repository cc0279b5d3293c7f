//! Workflow configuration.

/// Configuration shared by the workflow services.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Require a reviewer to belong to the cohort they review
    /// (default: true).
    pub enforce_reviewer_cohort_match: bool,
    /// Default number of entries returned for an object's history
    /// (default: 50).
    pub object_history_limit: u64,
    /// Default number of entries returned for a user's activity
    /// (default: 100).
    pub user_history_limit: u64,
    /// Optional pepper prepended to passwords before Argon2id verification.
    /// Must match the pepper the user repository hashes with.
    pub pepper: Option<String>,
    /// Minimum password length accepted at registration.
    pub min_password_length: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enforce_reviewer_cohort_match: true,
            object_history_limit: 50,
            user_history_limit: 100,
            pepper: None,
            min_password_length: 8,
        }
    }
}
