use crate::config::Config;
use crate::convert::ConversionPipeline;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: ConversionPipeline,
    // office conversion tools are single-instance per machine, so
    // conversions are serialized across requests
    pub convert_lock: Mutex<()>,
}
