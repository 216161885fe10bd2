//! Shared application state.

use std::sync::Arc;

use crate::config::Config;
use crate::provider::TwilioClient;
use crate::queue::DispatchQueue;
use crate::store::DbPool;
use crate::web::session::SessionSigner;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: DbPool,
    /// Where accepted campaigns are handed off for dispatch
    pub queue: Arc<dyn DispatchQueue>,
    /// Template and report calls; `None` when provider credentials are missing
    pub twilio: Option<Arc<TwilioClient>>,
    pub sessions: Arc<SessionSigner>,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: DbPool,
        queue: Arc<dyn DispatchQueue>,
        twilio: Option<TwilioClient>,
        sessions: SessionSigner,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            queue,
            twilio: twilio.map(Arc::new),
            sessions: Arc::new(sessions),
        }
    }
}
