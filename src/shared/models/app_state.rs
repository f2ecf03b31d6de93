use std::sync::Arc;

use crate::{
    data_access::data_context::DataContext, media_service::MediaStore,
    notification_service::Mailer, settings::Settings,
};

pub struct AppState {
    pub data_context: DataContext,
    pub settings: Settings,
    pub media: MediaStore,
    pub mailer: Arc<dyn Mailer>,
}

pub type SharedState = Arc<AppState>;
