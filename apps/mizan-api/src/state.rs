use std::sync::Arc;

use mizan_service::MizanService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<MizanService>,
}
impl AppState {
	pub fn new(config: mizan_config::Config) -> Self {
		Self { service: Arc::new(MizanService::new(config)) }
	}
}
