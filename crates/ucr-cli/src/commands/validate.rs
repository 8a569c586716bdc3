use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;
use ucr_cli::Study;

pub fn handle(study_path: &Path) -> Result<()> {
    let study = Study::load(study_path)?;
    let diag = study.validate();
    print!("{diag}");
    if diag.has_errors() {
        bail!("{} is not a valid study ({})", study_path.display(), diag.summary());
    }
    info!(
        clusters = study.network.clusters.len(),
        nodes = study.network.nodes.len(),
        "study is valid"
    );
    Ok(())
}
