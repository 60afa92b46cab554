// Database instance as reported by the fleet lister

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::instance_class;

const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Database engine family. Unknown engines keep their raw name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EngineKind {
    Postgres,
    MySql,
    MariaDb,
    AuroraPostgres,
    AuroraMySql,
    Other(String),
}

impl EngineKind {
    pub fn as_str(&self) -> &str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::MySql => "mysql",
            EngineKind::MariaDb => "mariadb",
            EngineKind::AuroraPostgres => "aurora-postgresql",
            EngineKind::AuroraMySql => "aurora-mysql",
            EngineKind::Other(name) => name,
        }
    }

    /// MySQL-family engines size their connection limit from a larger per-connection budget.
    pub fn is_mysql_family(&self) -> bool {
        matches!(
            self,
            EngineKind::MySql | EngineKind::MariaDb | EngineKind::AuroraMySql
        )
    }
}

impl From<String> for EngineKind {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => EngineKind::Postgres,
            "mysql" => EngineKind::MySql,
            "mariadb" => EngineKind::MariaDb,
            "aurora-postgresql" => EngineKind::AuroraPostgres,
            "aurora" | "aurora-mysql" => EngineKind::AuroraMySql,
            _ => EngineKind::Other(raw),
        }
    }
}

impl From<EngineKind> for String {
    fn from(kind: EngineKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed database instance. Rebuilt from the lister every refresh; never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub engine: EngineKind,
    pub instance_class: String,
    pub allocated_storage_gib: u64,
    pub status: String,
    /// Estimated from the instance class, not queried.
    pub max_connections: u32,
}

impl Instance {
    pub fn new(
        id: impl Into<String>,
        engine: EngineKind,
        instance_class: impl Into<String>,
        allocated_storage_gib: u64,
        status: impl Into<String>,
    ) -> Self {
        let instance_class = instance_class.into();
        let max_connections = instance_class::estimated_max_connections(&instance_class, &engine);
        Self {
            id: id.into(),
            engine,
            instance_class,
            allocated_storage_gib,
            status: status.into(),
            max_connections,
        }
    }

    pub fn allocated_storage_bytes(&self) -> u64 {
        self.allocated_storage_gib.saturating_mul(BYTES_PER_GIB)
    }

    pub fn is_available(&self) -> bool {
        self.status.eq_ignore_ascii_case("available")
    }
}
