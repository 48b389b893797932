use serde::{Deserialize, Serialize};

pub const HEALTHY: &str = "healthy";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersions {
    #[serde(default)]
    pub pg_dump: String,
    #[serde(default)]
    pub psql: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default)]
    pub pg_dump: String,
    #[serde(default)]
    pub psql: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsHealth {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub versions: Option<ToolVersions>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthServices {
    #[serde(default)]
    pub postgresql_tools: Option<ToolsHealth>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub services: HealthServices,
}

impl SystemHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HEALTHY
    }

    pub fn tools_available(&self) -> bool {
        self.services
            .postgresql_tools
            .as_ref()
            .is_some_and(|tools| tools.status == HEALTHY)
    }

    pub fn tools_error(&self) -> Option<&str> {
        self.services
            .postgresql_tools
            .as_ref()
            .and_then(|tools| tools.error.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsInfo {
    pub available: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub versions: Option<ToolVersions>,
    #[serde(default)]
    pub paths: ToolPaths,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub application: ApplicationInfo,
    pub postgresql_tools: ToolsInfo,
}
