//! Provider data structure passed to resources and data sources

use crate::api::Client;
use std::any::Any;
use std::sync::Arc;
use tfplug::Diagnostic;
use tokio::sync::Mutex;

/// Serializes operations that read-modify-write a shared remote list
pub type OperationLock = Arc<Mutex<()>>;

#[derive(Clone)]
pub struct ScalrProviderData {
    pub client: Arc<Client>,
    /// Account id from `SCALR_ACCOUNT_ID`, resolved once at configure time
    pub account_id: Option<String>,
    /// Guards the environment's default provider configuration list
    pub default_pcfg_lock: OperationLock,
}

impl ScalrProviderData {
    pub fn new(client: Client, account_id: Option<String>) -> Self {
        Self {
            client: Arc::new(client),
            account_id,
            default_pcfg_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replaces the lock, for callers that share one across providers
    pub fn with_lock(mut self, lock: OperationLock) -> Self {
        self.default_pcfg_lock = lock;
        self
    }

    /// Downcasts the opaque data handed to resource and data source
    /// configure calls
    pub fn from_provider_data(
        data: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<Self, Diagnostic> {
        let data = data.ok_or_else(|| {
            Diagnostic::error(
                "No provider data",
                "No provider data was provided to the resource",
            )
        })?;

        data.downcast_ref::<ScalrProviderData>()
            .cloned()
            .ok_or_else(|| {
                Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract ScalrProviderData from provider data",
                )
            })
    }
}
