use std::sync::Arc;

use agrirec::{DistrictIndex, PredictionService};

/// Everything the handlers read. Built once before the listener binds.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub districts: Arc<DistrictIndex>,
}

impl AppState {
    pub fn new(service: PredictionService, districts: DistrictIndex) -> Self {
        Self {
            service: Arc::new(service),
            districts: Arc::new(districts),
        }
    }
}
