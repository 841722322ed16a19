use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::commission::CommissionSchedule;
use crate::engine::EngineSettings;
use crate::node::NewParticipant;
use crate::reward::RewardConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// `hourly`, `daily` or `never`
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub commission: CommissionSchedule,
    #[serde(default)]
    pub rewards: RewardConfig,
    #[serde(default)]
    pub founder: FounderConfig,
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Tree root created at start-up
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FounderConfig {
    pub name: String,
    pub email: String,
}

impl Default for FounderConfig {
    fn default() -> Self {
        Self {
            name: "Founder".to_string(),
            email: "founder@localhost".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ConsolidationConfig {
    /// Run consolidation in the background every N seconds
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config: {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(content).context("Failed to parse config yaml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Err(e) = self.commission.validate() {
            bail!("commission: {}", e);
        }
        if let Err(e) = self.rewards.validate() {
            bail!("rewards: {}", e);
        }
        if self.consolidation.interval_secs == Some(0) {
            bail!("consolidation.interval_secs must be positive");
        }
        self.founder_participant()
            .validate()
            .context("founder")?;
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            commission: self.commission.clone(),
            rewards: self.rewards.clone(),
        }
    }

    pub fn founder_participant(&self) -> NewParticipant {
        NewParticipant::founder(self.founder.name.clone(), self.founder.email.clone())
    }
}
