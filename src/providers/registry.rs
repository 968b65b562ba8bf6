// ABOUTME: Adapter registry mapping platform ids to adapter instances and form schemas
// ABOUTME: Global OnceLock accessor plus constructible local registries for test isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Adapter Registry
//!
//! Closed dispatch table built at startup: every supported platform gets one
//! adapter instance and one declarative config-field schema for the
//! connection form. Adding a platform means one [`PlatformId`] variant, one
//! adapter module, and one entry here. The registry hands out schemas as-is;
//! each adapter re-checks its own required keys at sync time.

use super::core::{ConfigField, PlatformAdapter, PlatformId};
use super::iserv::IServAdapter;
use super::moodle::MoodleAdapter;
use super::schulmanager::SchulmanagerAdapter;
use super::sdui::SduiAdapter;
use super::webuntis::WebUntisAdapter;
use crate::config::EngineConfig;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

const WEBUNTIS_FIELDS: &[ConfigField] = &[
    ConfigField {
        key: "server",
        label: "Untis-Server",
        required: true,
        help: "Hostname des Untis-Servers, z.B. mese.webuntis.com",
    },
    ConfigField {
        key: "school",
        label: "Schulname",
        required: true,
        help: "Schulkennung wie in der Untis-Anmeldung",
    },
    ConfigField {
        key: "student_id",
        label: "Schüler-ID",
        required: false,
        help: "Optional; sonst wird das angemeldete Konto verwendet",
    },
];

const ISERV_FIELDS: &[ConfigField] = &[ConfigField {
    key: "url",
    label: "IServ-Adresse",
    required: true,
    help: "Vollständige HTTPS-Adresse der Schul-Instanz",
}];

const SCHULMANAGER_FIELDS: &[ConfigField] = &[ConfigField {
    key: "student_id",
    label: "Schüler-ID",
    required: false,
    help: "Optional; sonst wird das erste verknüpfte Kind verwendet",
}];

const MOODLE_FIELDS: &[ConfigField] = &[ConfigField {
    key: "url",
    label: "Moodle-Adresse",
    required: true,
    help: "Vollständige HTTPS-Adresse der Moodle-Instanz",
}];

const SDUI_FIELDS: &[ConfigField] = &[ConfigField {
    key: "school",
    label: "Schulkürzel",
    required: true,
    help: "Sdui-Kürzel (slink) der Schule",
}];

/// Registry of all supported platform adapters
pub struct AdapterRegistry {
    adapters: HashMap<PlatformId, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    /// Build a registry with every supported adapter
    #[must_use]
    pub fn new(engine: &EngineConfig) -> Self {
        let mut adapters: HashMap<PlatformId, Arc<dyn PlatformAdapter>> = HashMap::new();
        adapters.insert(
            PlatformId::WebUntis,
            Arc::new(WebUntisAdapter::new(engine)),
        );
        adapters.insert(PlatformId::IServ, Arc::new(IServAdapter::new(engine)));
        adapters.insert(
            PlatformId::Schulmanager,
            Arc::new(SchulmanagerAdapter::new(engine)),
        );
        adapters.insert(PlatformId::Moodle, Arc::new(MoodleAdapter::new(engine)));
        adapters.insert(PlatformId::Sdui, Arc::new(SduiAdapter::new(engine)));
        Self { adapters }
    }

    /// Replace or insert the adapter for a platform
    ///
    /// Local registries use this to substitute a test double behind the
    /// [`PlatformAdapter`] seam.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    /// Look up the adapter for a platform
    #[must_use]
    pub fn get(&self, id: PlatformId) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&id).cloned()
    }

    /// Whether a platform has a registered adapter
    #[must_use]
    pub fn is_supported(&self, id: PlatformId) -> bool {
        self.adapters.contains_key(&id)
    }

    /// All registered platform ids, in declaration order
    #[must_use]
    pub fn supported_platforms(&self) -> Vec<PlatformId> {
        PlatformId::ALL
            .into_iter()
            .filter(|id| self.adapters.contains_key(id))
            .collect()
    }

    /// Declarative connection-form schema for a platform
    ///
    /// Schemas exist for every variant regardless of registration so the UI
    /// can render a form before the adapter is ever invoked.
    #[must_use]
    pub fn config_fields(id: PlatformId) -> &'static [ConfigField] {
        match id {
            PlatformId::WebUntis => WEBUNTIS_FIELDS,
            PlatformId::IServ => ISERV_FIELDS,
            PlatformId::Schulmanager => SCHULMANAGER_FIELDS,
            PlatformId::Moodle => MOODLE_FIELDS,
            PlatformId::Sdui => SDUI_FIELDS,
        }
    }
}

/// Process-wide registry built from environment configuration on first use
pub fn global_registry() -> &'static AdapterRegistry {
    static REGISTRY: OnceLock<AdapterRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| AdapterRegistry::new(&EngineConfig::from_env()))
}
