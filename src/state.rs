use crate::config::Config;
use crate::db::OperationLog;
use crate::pipeline::cost::PricingTable;
use crate::services::openai::OpenAiClient;
use std::sync::Arc;
use tera::Tera;

#[derive(Clone)]
pub struct AppState {
    pub tera: Arc<Tera>,
    pub config: Arc<Config>,
    pub openai: Arc<OpenAiClient>,
    pub pricing: Arc<PricingTable>,
    pub operations: OperationLog,
}
