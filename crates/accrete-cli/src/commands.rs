//! Subcommand implementations

use accrete_composition::{AccretionStore, StoreSnapshot};
use accrete_core::{CapabilityOrchestrator, Manifest};
use accrete_validation::PreconditionValidator;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Options for `apply`
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Manifest path
    pub manifest: PathBuf,
    /// Snapshot to resume from and persist to
    pub state: Option<PathBuf>,
    /// Where to write the rendered configuration (stdout when unset)
    pub output: Option<PathBuf>,
    /// Re-download every artifact
    pub force: bool,
    /// Override the manifest's extension directory
    pub extension_dir: Option<PathBuf>,
}

/// Validate every enabled capability and report all failures
///
/// # Errors
/// Fails if the manifest cannot be loaded
pub fn check(manifest: &Path, out: &mut impl Write) -> Result<ExitCode> {
    let manifest = Manifest::load(manifest)
        .with_context(|| format!("loading manifest {}", manifest.display()))?;
    let capabilities = manifest.capabilities()?;
    let enabled = capabilities.iter().filter(|c| c.enabled).count();

    match PreconditionValidator::new().validate_all(&capabilities) {
        Ok(()) => {
            writeln!(out, "{enabled} enabled capabilities, all preconditions met")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(errors) => {
            for error in &errors {
                writeln!(out, "{error}")?;
            }
            writeln!(out, "{} of {enabled} enabled capabilities failed validation", errors.len())?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Run the orchestrator and emit the rendered configuration
///
/// The state file is written even when the run fails, so capabilities that
/// completed are skipped next time.
///
/// # Errors
/// Fails on manifest, state or orchestration errors
pub async fn apply(options: &ApplyOptions, out: &mut impl Write) -> Result<ExitCode> {
    let manifest = Manifest::load(&options.manifest)
        .with_context(|| format!("loading manifest {}", options.manifest.display()))?;
    let capabilities = manifest.capabilities()?;

    let mut config = manifest.engine.clone();
    if options.force {
        config.force_refresh = true;
    }
    if let Some(dir) = &options.extension_dir {
        config.extension_dir.clone_from(dir);
    }

    let store = match &options.state {
        Some(path) => load_state(path).await?,
        None => AccretionStore::new(),
    };

    let mut orchestrator = CapabilityOrchestrator::from_config(&config)?.with_store(store);
    let result = orchestrator.run(&capabilities).await.map(|_| ());

    if let Some(path) = &options.state {
        save_state(path, &orchestrator.store().snapshot()).await?;
    }
    result?;

    let rendered = serde_json::to_string_pretty(&orchestrator.store().render())?;
    match &options.output {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => writeln!(out, "{rendered}")?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Print a persisted snapshot, raw or rendered
///
/// # Errors
/// Fails if the state file cannot be read or parsed
pub async fn show(state: &Path, rendered: bool, out: &mut impl Write) -> Result<ExitCode> {
    let snapshot = read_snapshot(state).await?;
    let text = if rendered {
        let store = AccretionStore::from_snapshot(snapshot)
            .with_context(|| format!("restoring state {}", state.display()))?;
        serde_json::to_string_pretty(&store.render())?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    writeln!(out, "{text}")?;
    Ok(ExitCode::SUCCESS)
}

async fn read_snapshot(path: &Path) -> Result<StoreSnapshot> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading state {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing state {}", path.display()))
}

async fn load_state(path: &Path) -> Result<AccretionStore> {
    if !tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("checking state {}", path.display()))?
    {
        tracing::info!(path = %path.display(), "no previous state, starting fresh");
        return Ok(AccretionStore::new());
    }
    AccretionStore::from_snapshot(read_snapshot(path).await?)
        .with_context(|| format!("restoring state {}", path.display()))
}

async fn save_state(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    let json = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;
    tracing::debug!(path = %path.display(), "state saved");
    Ok(())
}
