use tabled::Tabled;

#[derive(Tabled)]
pub struct OperationRow {
    pub operation_id: String,
    pub scenario: String,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "float2")]
    pub min_time_ms: f64,
    #[tabled(display = "float2")]
    pub max_time_ms: f64,
    #[tabled(display = "float2")]
    pub p95_time_ms: f64,
    pub total_operations: usize,
    pub failed_operations: usize,
}

#[derive(Tabled)]
pub struct CheckRow {
    pub check: String,
    pub scenario: String,
    pub passed: u64,
    pub failed: u64,
    #[tabled(display = "percent")]
    pub pass_rate: f64,
}

#[derive(Tabled)]
pub struct MetricRow {
    pub name: String,
    #[tabled(rename = "Time")]
    pub timestamp: String,
    #[tabled(rename = "Fields")]
    pub fields: String,
    #[tabled(rename = "Tags")]
    pub tags: String,
}

fn float2(n: &f64) -> String {
    format!("{n:.2}")
}

fn percent(n: &f64) -> String {
    format!("{:.2}%", n * 100.0)
}
