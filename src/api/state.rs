//! Shared, immutable handler state

use std::sync::Arc;

use crate::application::predict_use_case::PredictUseCase;

#[derive(Clone)]
pub struct AppState {
    pub predict: Arc<PredictUseCase>,
}

impl AppState {
    pub fn new(predict: PredictUseCase) -> Self {
        Self { predict: Arc::new(predict) }
    }
}
