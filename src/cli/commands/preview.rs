//! Render one page of an image or PDF.

use std::path::Path;

use ocrflow::workflow::{Action, Orchestrator};
use ocrflow::Config;

use super::PreprocessArgs;
use crate::cli::helpers::{print_notices, print_outcome};

pub async fn cmd_preview(
    config: Config,
    file: &Path,
    page: u32,
    output: &Path,
    preprocess: &PreprocessArgs,
) -> anyhow::Result<()> {
    let mut orchestrator = Orchestrator::connect(config)?;

    let actions = [
        Action::Open(file.to_path_buf()),
        preprocess.action(),
        Action::Preview {
            page,
            output: Some(output.to_path_buf()),
        },
    ];
    let mut result = Ok(());
    for action in actions {
        match orchestrator.dispatch(action).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => {
                result = Err(e.into());
                break;
            }
        }
    }
    print_notices(orchestrator.session_mut());

    orchestrator.close().await;
    result
}
