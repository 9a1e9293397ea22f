// Chain spec - Rules and genesis of a chain, loadable from JSON
use super::spec::GenesisSpec;
use crate::types::ChainRules;
use serde::{Deserialize, Serialize};

/// Chain development id
pub const DEV_CHAIN_ID: u64 = 1337;

/// Configuration complète d'une chaîne
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Nom de la chaîne
    pub name: String,

    pub rules: ChainRules,

    pub genesis: GenesisSpec,
}

impl ChainSpec {
    pub fn dev() -> Self {
        Self {
            name: "kratos-exec-dev".to_string(),
            rules: ChainRules::dev(DEV_CHAIN_ID),
            genesis: GenesisSpec::dev(),
        }
    }

    /// Charge depuis un fichier JSON
    pub fn from_file(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Sauvegarde vers un fichier JSON
    pub fn to_file(&self, path: &str) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::dev()
    }
}
