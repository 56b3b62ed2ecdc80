use std::sync::RwLock;

use crate::pricing::PricingConfig;

/// The pricing configuration document. Seeded with the defaults at
/// construction so the first read never finds it absent; replaced wholesale
/// by admins after validation.
pub struct PricingStore {
    config: RwLock<PricingConfig>,
}

impl PricingStore {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(PricingConfig::default()),
        }
    }

    pub fn current(&self) -> PricingConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace(&self, config: PricingConfig) {
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
    }
}

impl Default for PricingStore {
    fn default() -> Self {
        Self::new()
    }
}
