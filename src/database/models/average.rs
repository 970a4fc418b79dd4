use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Weighted roll-up of a student's notes for one composition. Rows are
/// created or overwritten by the aggregation engine, never appended.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Average {
    pub student_id: String,
    pub composition_code: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ComputeAveragePayload {
    pub student_id: String,
    pub composition_code: String,
}
