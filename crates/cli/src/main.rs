//! sage — loads a parameter file, walks a tree file's forests, evolves
//! every forest's galaxy population, and stages output (spec.md §4.10, §6).
//!
//! Not a REPL: one invocation processes one run and exits.

mod output_format;
mod reference_mergers;
mod tree_format;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use sage_core::{RuntimeParams, SageConfig, SageError, TreeReader};
use sage_engine::{ForestDriver, MergerHandlers, ModuleRegistry, Pipeline};
use sage_primitives::PropertyTable;

use output_format::BinaryGalaxyWriter;
use tree_format::BinaryTreeReader;

#[derive(Debug, Parser)]
#[command(name = "sage", about = "Semi-analytic galaxy formation engine")]
struct Args {
    /// Path to the TOML parameter file (spec.md §6).
    #[arg(long, default_value = "sage.toml")]
    params: PathBuf,

    /// Path to the binary tree file this run reads forests from.
    #[arg(long)]
    trees: PathBuf,

    /// Path the staged galaxy output is written to.
    #[arg(long)]
    output: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match run(args) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            ExitCode::FAILURE
        }
    }
}

/// Scans `config.module_directory` for `.toml` module manifests when
/// discovery is enabled (spec.md §6). Returns the manifest paths found;
/// dynamic loading of the manifests themselves is not implemented, so a run
/// with discovery enabled still executes the statically registered
/// merger/disruption handlers once the manifests are confirmed present.
fn discover_module_manifests(config: &RuntimeParams) -> Result<Vec<PathBuf>, SageError> {
    if !config.enable_module_discovery {
        return Ok(Vec::new());
    }
    let dir = config.module_directory.as_deref().ok_or(SageError::NoModulesDiscovered)?;
    let dir = PathBuf::from(dir);
    let entries = std::fs::read_dir(&dir)
        .map_err(|e| SageError::Config(format!("failed to read module directory {}: {e}", dir.display())))?;

    let mut manifests = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SageError::Config(format!("failed to read module directory entry: {e}")))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            manifests.push(path);
        }
    }
    if manifests.is_empty() {
        return Err(SageError::NoModulesDiscovered);
    }
    Ok(manifests)
}

fn run(args: Args) -> Result<sage_engine::RunSummary, SageError> {
    let config = SageConfig::from_file(&args.params)?;

    let manifests = discover_module_manifests(&config.runtime)?;
    if !manifests.is_empty() {
        tracing::info!(count = manifests.len(), "discovered module manifests");
    }

    let mut registry = ModuleRegistry::new();
    let merger_module = registry.register(&config.runtime.merger_handler_module, 1, sage_engine::ModuleTypeTag::Mergers, None, None);
    registry.register_function(
        merger_module,
        &config.runtime.merger_handler_function,
        reference_mergers::process_merger,
        "process_merger(ctx) -> i32",
    )?;
    registry.initialize(merger_module)?;

    let disruption_module = registry.register(&config.runtime.disruption_handler_module, 1, sage_engine::ModuleTypeTag::Mergers, None, None);
    registry.register_function(
        disruption_module,
        &config.runtime.disruption_handler_function,
        reference_mergers::process_disruption,
        "process_disruption(ctx) -> i32",
    )?;
    if disruption_module != merger_module {
        registry.initialize(disruption_module)?;
    }

    // Leaked once at startup: `MergerHandlers` carries `&'static str` function
    // names the same way `ModuleFn` carries plain function pointers (spec.md
    // §9 — no per-invocation string ownership on the hot path).
    let handlers = MergerHandlers {
        merger_module,
        merger_function: Box::leak(config.runtime.merger_handler_function.clone().into_boxed_str()),
        disruption_module,
        disruption_function: Box::leak(config.runtime.disruption_handler_function.clone().into_boxed_str()),
    };

    let pipeline = Pipeline::create("default", config.runtime.fail_fast);
    let properties = PropertyTable::with_standard_properties(config.simulation.steps)?;

    let reader = BinaryTreeReader::open(&args.trees)?;
    let mut writer = BinaryGalaxyWriter::create(&args.output)?;

    let driver = ForestDriver::new(&config);
    let mut run_summary = sage_engine::RunSummary::new();

    for descriptor in reader.forests()? {
        let halos = reader.load_halos(&descriptor)?;
        let forest_id = descriptor.forest_id;
        match driver.run_forest(forest_id, &halos, &config, &registry, &pipeline, handlers, &properties, &mut writer) {
            Ok(forest_summary) => run_summary.record_success(forest_summary),
            Err(err) if err.is_fatal_for_forest() => {
                tracing::warn!(forest = %forest_id, error = %err, "forest aborted, continuing with the next one");
                run_summary.record_failure(forest_id, &err);
            }
            Err(err) => return Err(err),
        }
    }

    registry.cleanup_all()?;
    Ok(run_summary)
}

fn print_summary(summary: &sage_engine::RunSummary) {
    println!("forests completed: {}", summary.forests_completed);
    println!("forests skipped:   {}", summary.forests_skipped);
    println!("galaxies written:  {}", summary.galaxies_output);
    println!("orphans created:   {}", summary.orphans_created);
    println!("orphans rescued:   {}", summary.orphans_rescued);
    println!("FOF-disruption losses: {}", summary.complete_fof_disruption_losses);
    println!("mergers resolved:  {}", summary.mergers_resolved);
    println!("disruptions resolved: {}", summary.disruptions_resolved);
    println!("stale merger events skipped: {}", summary.stale_merger_events_skipped);
    if !summary.gap_histogram.is_empty() {
        println!("progenitor gap histogram: {:?}", summary.gap_histogram);
    }
    for (forest, reason) in &summary.failed_forests {
        println!("  forest {forest} skipped: {reason}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(module_directory: Option<String>, enable_module_discovery: bool) -> RuntimeParams {
        RuntimeParams {
            module_directory,
            enable_module_discovery,
            merger_handler_module: "mergers".into(),
            merger_handler_function: "process_merger".into(),
            disruption_handler_module: "mergers".into(),
            disruption_handler_function: "process_disruption".into(),
            invariant_policy: sage_core::InvariantPolicy::Fatal,
            fail_fast: false,
        }
    }

    #[test]
    fn discovery_disabled_skips_the_scan_entirely() {
        let config = runtime(None, false);
        assert_eq!(discover_module_manifests(&config).unwrap(), Vec::<PathBuf>::new());
    }

    #[test]
    fn discovery_enabled_with_no_directory_fails() {
        let config = runtime(None, true);
        assert!(matches!(discover_module_manifests(&config), Err(SageError::NoModulesDiscovered)));
    }

    #[test]
    fn discovery_enabled_with_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = runtime(Some(dir.path().to_string_lossy().into_owned()), true);
        assert!(matches!(discover_module_manifests(&config), Err(SageError::NoModulesDiscovered)));
    }

    #[test]
    fn discovery_enabled_with_manifests_present_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cooling.toml"), "name = \"cooling\"\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a manifest").unwrap();
        let config = runtime(Some(dir.path().to_string_lossy().into_owned()), true);

        let manifests = discover_module_manifests(&config).unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].extension().unwrap(), "toml");
    }
}
