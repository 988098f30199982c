use std::sync::{Arc, LazyLock, RwLock};

use crate::providers::ModelClient;

use super::options::GenerateOptions;

/// Process-wide defaults used by generations with no explicitly attached
/// client or options.
pub struct Settings {
    pub client: Arc<dyn ModelClient>,
    pub defaults: GenerateOptions,
}

pub static GLOBAL_SETTINGS: LazyLock<RwLock<Option<Settings>>> =
    LazyLock::new(|| RwLock::new(None));

/// Installs the global model client and default generation options.
pub fn configure(client: impl ModelClient + 'static, defaults: GenerateOptions) {
    let settings = Settings {
        client: Arc::new(client),
        defaults,
    };
    *GLOBAL_SETTINGS.write().unwrap() = Some(settings);
}

pub(crate) fn default_client() -> Option<Arc<dyn ModelClient>> {
    GLOBAL_SETTINGS
        .read()
        .unwrap()
        .as_ref()
        .map(|settings| Arc::clone(&settings.client))
}

pub(crate) fn default_options() -> GenerateOptions {
    GLOBAL_SETTINGS
        .read()
        .unwrap()
        .as_ref()
        .map(|settings| settings.defaults.clone())
        .unwrap_or_default()
}
