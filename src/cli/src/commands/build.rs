//! `hoist build` command.
//!
//! Loads the images tree, plans the build and runs it on a dispatcher.
//! Only the dry-run driver ships with hoist; other drivers are registered
//! by embedders of the runtime crate.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use clap::Args;
use hoist_core::event::EventEmitter;
use hoist_core::options::BuildOptions;
use hoist_queue::{DispatcherBuilder, DispatcherMonitor, MonitorConfig};
use hoist_runtime::{
    BuildService, DefaultSemverGenerator, DriverFactory, DryRunDriver, PlanFactory,
    PlanParameters, CASCADE_PLAN_ID, DRY_RUN_DRIVER_NAME, SINGLE_PLAN_ID,
};
use tokio_util::sync::CancellationToken;

use crate::output;

#[derive(Args)]
pub struct BuildArgs {
    /// Image to build
    pub name: String,

    /// Versions to build, can be repeated (default: every version)
    #[arg(short = 'v', long = "image-version")]
    pub versions: Vec<String>,

    /// Also build the descendants of the image
    #[arg(long)]
    pub cascade: bool,

    /// Descendant levels to build with --cascade (negative: all)
    #[arg(long, allow_hyphen_values = true)]
    pub depth: Option<i64>,

    /// Describe the builds instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Number of builds running at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Extra tag, can be repeated
    #[arg(short = 't', long = "tag")]
    pub tags: Vec<String>,

    /// Generate semantic version tags
    #[arg(long)]
    pub semver: bool,

    /// Push images once built
    #[arg(long)]
    pub push: bool,

    /// Remove local images once pushed
    #[arg(long)]
    pub remove_after_push: bool,

    /// Pull the parent image before building
    #[arg(long)]
    pub pull_parent_image: bool,

    /// Override the registry host
    #[arg(long)]
    pub registry: Option<String>,

    /// Override the registry namespace
    #[arg(long)]
    pub namespace: Option<String>,

    /// Build variable (KEY=VALUE), can be repeated
    #[arg(long = "var")]
    pub vars: Vec<String>,

    /// Persistent build variable (KEY=VALUE), can be repeated
    #[arg(long = "persistent-var")]
    pub persistent_vars: Vec<String>,

    /// Image label (KEY=VALUE), can be repeated
    #[arg(long = "label")]
    pub labels: Vec<String>,
}

pub async fn execute(args: BuildArgs, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = super::open_image_store(&config)?;
    let builders = super::open_builders(&config)?;
    let credentials = super::open_credentials(&config);

    let options = build_options(&args, &config)?;

    let (plan_id, parameters) = if args.cascade {
        (CASCADE_PLAN_ID, PlanParameters::with_depth(args.depth.unwrap_or(-1)))
    } else {
        (SINGLE_PLAN_ID, PlanParameters::default())
    };
    let plan = PlanFactory::new(store).new_plan(plan_id, parameters)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, waiting for running builds");
            interrupt.cancel();
        }
    });

    let mut dispatcher_config = config.dispatcher();
    if let Some(concurrency) = args.concurrency {
        dispatcher_config.workers = concurrency;
    }
    let dispatcher = Arc::new(
        DispatcherBuilder::new()
            .with_config(&dispatcher_config)
            .with_default_workers()
            .build()?,
    );
    dispatcher.start(&cancel)?;

    let events = EventEmitter::new(256);
    let mut progress_events = events.subscribe_filtered(|e| e.key.starts_with("build.step."));
    let progress = tokio::spawn(async move {
        while let Some(event) = progress_events.recv().await {
            if let Some(line) = output::progress_line(&event) {
                eprintln!("{line}");
            }
        }
    });

    let monitor = Arc::new(
        DispatcherMonitor::with_config(
            Arc::clone(&dispatcher),
            MonitorConfig {
                interval: dispatcher_config.monitor_interval,
                ..Default::default()
            },
        )
        .with_event_emitter(events.clone()),
    );
    let monitor_cancel = cancel.child_token();
    Arc::clone(&monitor).start(monitor_cancel.clone());

    let drivers = DriverFactory::new();
    drivers.register(DRY_RUN_DRIVER_NAME, Arc::new(DryRunDriver::new()))?;

    let service = BuildService::new()
        .with_builders(builders)
        .with_driver_factory(Arc::new(drivers))
        .with_dispatcher(dispatcher.clone())
        .with_semver(Arc::new(DefaultSemverGenerator))
        .with_credentials(credentials)
        .with_event_emitter(events);

    let result = service
        .build(
            &cancel,
            Some(plan.as_ref()),
            &args.name,
            &args.versions,
            Some(&options),
        )
        .await;

    // the progress stream ends once every emitter is gone
    drop(service);
    monitor_cancel.cancel();
    drop(monitor);
    dispatcher.stop();
    let _ = progress.await;
    result?;
    Ok(())
}

fn build_options(
    args: &BuildArgs,
    config: &hoist_core::config::HoistConfig,
) -> Result<BuildOptions, String> {
    Ok(BuildOptions {
        image_registry_host: args.registry.clone(),
        image_registry_namespace: args.namespace.clone(),
        tags: args.tags.clone(),
        enable_semver: args.semver,
        semantic_version_tags_templates: config.semantic_version_tags_templates.clone(),
        persistent_vars: parse_vars(&args.persistent_vars)?,
        vars: parse_vars(&args.vars)?,
        labels: parse_key_values(&args.labels)?,
        pull_parent_image: args.pull_parent_image,
        push_after_build: args.push || config.push_images,
        remove_after_push: args.remove_after_push,
        dry_run: args.dry_run,
        cascade_depth: args.cascade.then(|| args.depth.unwrap_or(-1)),
        ..Default::default()
    })
}

/// Parse KEY=VALUE pairs.
fn parse_key_values(args: &[String]) -> Result<BTreeMap<String, String>, String> {
    let mut map = BTreeMap::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("Invalid value (expected KEY=VALUE): {arg}"))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

fn parse_vars(args: &[String]) -> Result<BTreeMap<String, serde_json::Value>, String> {
    Ok(parse_key_values(args)?
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use hoist_core::config::HoistConfig;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        build: BuildArgs,
    }

    fn parse(args: &[&str]) -> BuildArgs {
        let mut argv = vec!["build"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().build
    }

    #[test]
    fn test_parse_key_values_valid() {
        let args = vec!["env=prod".to_string(), "team=a=b".to_string()];
        let result = parse_key_values(&args).unwrap();
        assert_eq!(result.get("env"), Some(&"prod".to_string()));
        assert_eq!(result.get("team"), Some(&"a=b".to_string()));
    }

    #[test]
    fn test_parse_key_values_invalid() {
        let args = vec!["NOEQUALS".to_string()];
        assert!(parse_key_values(&args).is_err());
    }

    #[test]
    fn test_build_options_from_args() {
        let args = parse(&[
            "app", "--cascade", "--var", "env=prod", "--label", "team=infra", "--semver",
        ]);
        let config = HoistConfig::default();

        let options = build_options(&args, &config).unwrap();
        assert_eq!(options.cascade_depth, Some(-1));
        assert_eq!(options.vars["env"], serde_json::json!("prod"));
        assert_eq!(options.labels["team"], "infra");
        assert!(options.enable_semver);
        assert_eq!(
            options.semantic_version_tags_templates,
            config.semantic_version_tags_templates
        );
        assert!(!options.push_after_build);
    }

    #[test]
    fn test_negative_depth() {
        let args = parse(&["app", "--cascade", "--depth", "-1"]);
        assert_eq!(args.depth, Some(-1));
    }

    #[test]
    fn test_push_from_config() {
        let args = parse(&["app"]);
        let config = HoistConfig {
            push_images: true,
            ..Default::default()
        };
        assert!(build_options(&args, &config).unwrap().push_after_build);
        assert_eq!(build_options(&args, &config).unwrap().cascade_depth, None);
    }
}
