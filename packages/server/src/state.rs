use std::sync::Arc;

use common::Clock;

use crate::config::AppConfig;
use crate::services::classification::Classifier;
use crate::services::notify::Notifier;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub classifier: Classifier,
    pub notifier: Notifier,
}
