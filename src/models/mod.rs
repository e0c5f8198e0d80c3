use serde::{Deserialize, Serialize};

/// A completed user operation, ready to be appended to the log.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub original_filename: String,
    pub result_filename: String,
    pub effect: String,
    pub ai_description: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    /// Assigned by the store when absent.
    pub created_at: Option<String>,
    pub model: Option<String>,
}

/// A row as read back from the `operations` table. Legacy rows may carry NULLs.
#[derive(Debug, Clone)]
pub struct StoredOperation {
    pub id: i64,
    pub original_filename: Option<String>,
    pub result_filename: Option<String>,
    pub effect: Option<String>,
    pub ai_description: Option<String>,
    pub tokens_in: Option<i64>,
    pub tokens_out: Option<i64>,
    pub created_at: Option<String>,
    pub model: Option<String>,
}

/// A stored row annotated with its estimated cost, as shown on the logs page.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedOperation {
    pub id: i64,
    pub created_at: String,
    pub original_filename: String,
    pub result_filename: String,
    pub effect: String,
    pub ai_description: String,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub model: String,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogReport {
    pub operations: Vec<LoggedOperation>,
    pub total_cost: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub logged_operations: usize,
}

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    pub prompt: String,
}
