// Estimated max connections per instance class (fixed table, never queried)

use crate::models::EngineKind;

/// Bytes of instance memory budgeted per connection (MySQL family).
const MYSQL_BYTES_PER_CONNECTION: u64 = 12_582_880;
/// Bytes of instance memory budgeted per connection (Postgres and everything else).
const DEFAULT_BYTES_PER_CONNECTION: u64 = 9_531_392;
const POSTGRES_MAX_CONNECTIONS: u64 = 5_000;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Instance class -> memory (GiB).
const CLASS_MEMORY_GIB: &[(&str, f64)] = &[
    ("db.t3.micro", 1.0),
    ("db.t3.small", 2.0),
    ("db.t3.medium", 4.0),
    ("db.t3.large", 8.0),
    ("db.t3.xlarge", 16.0),
    ("db.t3.2xlarge", 32.0),
    ("db.t4g.micro", 1.0),
    ("db.t4g.small", 2.0),
    ("db.t4g.medium", 4.0),
    ("db.t4g.large", 8.0),
    ("db.t4g.xlarge", 16.0),
    ("db.t4g.2xlarge", 32.0),
    ("db.m5.large", 8.0),
    ("db.m5.xlarge", 16.0),
    ("db.m5.2xlarge", 32.0),
    ("db.m5.4xlarge", 64.0),
    ("db.m5.8xlarge", 128.0),
    ("db.m5.12xlarge", 192.0),
    ("db.m6g.large", 8.0),
    ("db.m6g.xlarge", 16.0),
    ("db.m6g.2xlarge", 32.0),
    ("db.m6g.4xlarge", 64.0),
    ("db.m6i.large", 8.0),
    ("db.m6i.xlarge", 16.0),
    ("db.m6i.2xlarge", 32.0),
    ("db.r5.large", 16.0),
    ("db.r5.xlarge", 32.0),
    ("db.r5.2xlarge", 64.0),
    ("db.r5.4xlarge", 128.0),
    ("db.r6g.large", 16.0),
    ("db.r6g.xlarge", 32.0),
    ("db.r6g.2xlarge", 64.0),
    ("db.r6g.4xlarge", 128.0),
    ("db.r6i.large", 16.0),
    ("db.r6i.xlarge", 32.0),
    ("db.r6i.2xlarge", 64.0),
];

pub fn memory_gib(instance_class: &str) -> Option<f64> {
    let class = instance_class.trim();
    CLASS_MEMORY_GIB
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(class))
        .map(|&(_, gib)| gib)
}

/// Estimated connection limit for a class/engine pair. Unknown classes yield 0.
pub fn estimated_max_connections(instance_class: &str, engine: &EngineKind) -> u32 {
    let Some(gib) = memory_gib(instance_class) else {
        return 0;
    };
    let memory_bytes = (gib * BYTES_PER_GIB) as u64;
    let per_connection = if engine.is_mysql_family() {
        MYSQL_BYTES_PER_CONNECTION
    } else {
        DEFAULT_BYTES_PER_CONNECTION
    };
    let mut estimate = memory_bytes / per_connection;
    if matches!(engine, EngineKind::Postgres | EngineKind::AuroraPostgres) {
        estimate = estimate.min(POSTGRES_MAX_CONNECTIONS);
    }
    u32::try_from(estimate).unwrap_or(u32::MAX)
}
