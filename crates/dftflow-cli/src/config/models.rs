use crate::cli::StageKind;
use dftflow::engine::context::StageContext;
use std::path::PathBuf;

pub struct AppConfig {
    pub stage: StageKind,
    pub recording: PathBuf,
    pub context: StageContext,
}
