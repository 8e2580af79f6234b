//! Build orchestration.
//!
//! [`BuildService::build`] asks a planner for the steps of a build and runs
//! one task per step. A step waits for its parent step, enriches its image
//! with the caller options, resolves credentials, builder and driver, and
//! hands the resulting command to the dispatcher. The dispatcher bounds how
//! many drivers run at once; the steps only order them.

mod enrich;

use std::sync::Arc;

use hoist_core::builder::{Builder, BuilderRef, DEFAULT_DRIVER_NAME};
use hoist_core::error::{HoistError, Result};
use hoist_core::event::{events, BuildEvent, EventEmitter};
use hoist_core::image::Image;
use hoist_core::options::{BuildDriverOptions, BuildOptions, UserPasswordAuth};
use hoist_core::queue::{Job, JobDispatcher};
use tokio_util::sync::CancellationToken;

use crate::builders::BuildersStore;
use crate::command::{CommandFactory, DefaultCommandFactory};
use crate::credentials::CredentialsStore;
use crate::driver::{Driver, DriverFactory, DRY_RUN_DRIVER_NAME};
use crate::plan::Planner;
use crate::semver::SemverGenerator;

/// Builds images through a plan.
#[derive(Clone, Default)]
pub struct BuildService {
    builders: Option<Arc<BuildersStore>>,
    command_factory: Option<Arc<dyn CommandFactory>>,
    driver_factory: Option<Arc<DriverFactory>>,
    dispatcher: Option<Arc<dyn JobDispatcher>>,
    semver: Option<Arc<dyn SemverGenerator>>,
    credentials: Option<Arc<dyn CredentialsStore>>,
    events: Option<EventEmitter>,
}

impl BuildService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builders(mut self, builders: Arc<BuildersStore>) -> Self {
        self.builders = Some(builders);
        self
    }

    pub fn with_command_factory(mut self, factory: Arc<dyn CommandFactory>) -> Self {
        self.command_factory = Some(factory);
        self
    }

    pub fn with_driver_factory(mut self, factory: Arc<DriverFactory>) -> Self {
        self.driver_factory = Some(factory);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_semver(mut self, semver: Arc<dyn SemverGenerator>) -> Self {
        self.semver = Some(semver);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialsStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Publish step lifecycle events on `events`
    pub fn with_event_emitter(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    /// Build `name` at `versions` following `plan`.
    ///
    /// Every step is attempted; the failures of all of them are returned
    /// together once the last step has finished. A step releases its
    /// children whether its own build succeeded or not.
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        plan: Option<&dyn Planner>,
        name: &str,
        versions: &[String],
        options: Option<&BuildOptions>,
    ) -> Result<()> {
        let plan = plan.ok_or_else(|| HoistError::Config("a build plan is required".to_string()))?;
        let options =
            options.ok_or_else(|| HoistError::Config("service options are required".to_string()))?;
        self.validate()?;

        let steps = plan.plan(name, versions)?;
        tracing::info!(image = %name, versions = ?versions, steps = steps.len(), "Starting build");
        self.emit(BuildEvent::for_image(
            events::BUILD_STARTED,
            name,
            &versions.join(","),
        ));

        let service = Arc::new(self.clone());
        let options = Arc::new(options.clone());

        let mut references = Vec::with_capacity(steps.len());
        let mut handles = Vec::with_capacity(steps.len());
        for mut step in steps {
            references.push(step.image().reference());

            let service = Arc::clone(&service);
            let options = Arc::clone(&options);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                step.wait().await;
                let image = Arc::clone(step.image());
                let result = service.build_step(&cancel, &image, &options).await;
                step.notify();
                result
            }));
        }

        let mut errors = Vec::new();
        for (reference, outcome) in references
            .into_iter()
            .zip(futures::future::join_all(handles).await)
        {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(HoistError::Other(format!(
                    "build task for '{}' did not complete: {}",
                    reference, e
                ))),
            }
        }

        self.emit(BuildEvent::for_image(
            events::BUILD_FINISHED,
            name,
            &versions.join(","),
        ));

        if errors.is_empty() {
            tracing::info!(image = %name, "Build finished");
            Ok(())
        } else {
            tracing::warn!(image = %name, failed = errors.len(), "Build finished with errors");
            Err(HoistError::Build(errors))
        }
    }

    fn validate(&self) -> Result<()> {
        let missing = if self.dispatcher.is_none() {
            Some("a dispatcher")
        } else if self.driver_factory.is_none() {
            Some("a driver factory")
        } else if self.semver.is_none() {
            Some("a semver generator")
        } else if self.credentials.is_none() {
            Some("a credentials store")
        } else {
            None
        };

        match missing {
            Some(what) => Err(HoistError::Config(format!(
                "the build service requires {}",
                what
            ))),
            None => Ok(()),
        }
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    async fn build_step(
        &self,
        cancel: &CancellationToken,
        image: &Image,
        options: &BuildOptions,
    ) -> Result<()> {
        self.emit(BuildEvent::for_image(
            events::BUILD_STEP_STARTED,
            &image.name,
            &image.version,
        ));
        tracing::debug!(image = %image.name, version = %image.version, "Building image");

        match self.build_image(cancel, image, options).await {
            Ok(()) => {
                tracing::info!(image = %image.name, version = %image.version, "Image built");
                self.emit(BuildEvent::for_image(
                    events::BUILD_STEP_COMPLETED,
                    &image.name,
                    &image.version,
                ));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    image = %image.name,
                    version = %image.version,
                    error = %e,
                    "Image build failed"
                );
                let mut event = BuildEvent::for_image(
                    events::BUILD_STEP_FAILED,
                    &image.name,
                    &image.version,
                );
                event
                    .payload
                    .insert("error".to_string(), serde_json::json!(e.to_string()));
                self.emit(event);
                Err(e)
            }
        }
    }

    async fn build_image(
        &self,
        cancel: &CancellationToken,
        image: &Image,
        options: &BuildOptions,
    ) -> Result<()> {
        let (driver, image, driver_options) = self.prepare(image, options)?;

        let factory: Arc<dyn CommandFactory> = self
            .command_factory
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultCommandFactory));
        let command = factory.new_command(driver, image, driver_options)?;

        let dispatcher = self
            .dispatcher
            .as_ref()
            .ok_or_else(|| HoistError::Config("the build service requires a dispatcher".to_string()))?;

        let job = Arc::new(Job::new(command));
        dispatcher.enqueue(Arc::clone(&job)).await?;
        job.wait().await
    }

    /// Enrich one image and resolve what is needed to build it.
    fn prepare(
        &self,
        image: &Image,
        options: &BuildOptions,
    ) -> Result<(Arc<dyn Driver>, Image, BuildDriverOptions)> {
        let mut image = image.copy();
        enrich::apply_overrides(&mut image, options);

        let generated = if options.enable_semver {
            self.semantic_version_tags(&image, options)
        } else {
            Vec::new()
        };
        enrich::merge_tags(&mut image, &generated, options);
        enrich::merge_vars_and_labels(&mut image, options);

        let pull_auth = match image.parent.as_ref().map(|p| p.registry_host.clone()) {
            Some(host) if !host.is_empty() => self.user_password(&host)?,
            _ => None,
        };
        let push_auth = if image.registry_host.is_empty() {
            None
        } else {
            self.user_password(&image.registry_host)?
        };

        let builder = self.resolve_builder(&image)?;
        let driver_name = if options.dry_run {
            DRY_RUN_DRIVER_NAME.to_string()
        } else {
            builder.driver.clone()
        };
        let driver = self
            .driver_factory
            .as_ref()
            .ok_or_else(|| {
                HoistError::Config("the build service requires a driver factory".to_string())
            })?
            .get(&driver_name)?;

        let ansible = enrich::ansible_options(&image, &builder.driver, options);

        image.sanitize();

        let driver_options = BuildDriverOptions {
            tags: image.tags.clone(),
            persistent_vars: image.persistent_vars.clone(),
            vars: image.vars.clone(),
            persistent_labels: image.persistent_labels.clone(),
            labels: image.labels.clone(),
            builder: Some(builder),
            pull_parent_image: options.pull_parent_image,
            pull_auth,
            push_image: options.push_after_build,
            push_auth,
            remove_after_push: options.remove_after_push,
            ansible,
        };

        tracing::debug!(
            image = %image.name,
            version = %image.version,
            driver = %driver_name,
            tags = ?driver_options.tags,
            "Prepared image build"
        );
        Ok((driver, image, driver_options))
    }

    fn semantic_version_tags(&self, image: &Image, options: &BuildOptions) -> Vec<String> {
        let Some(semver) = &self.semver else {
            return Vec::new();
        };

        let mut candidates = options.tags.clone();
        candidates.push(image.version.clone());
        match semver.generate_semver_list(&candidates, &options.semantic_version_tags_templates) {
            Ok(tags) => tags,
            Err(e) => {
                tracing::debug!(image = %image.name, error = %e, "Semantic version tags skipped");
                Vec::new()
            }
        }
    }

    /// Basic auth credentials for `registry`, if any are stored.
    fn user_password(&self, registry: &str) -> Result<Option<UserPasswordAuth>> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            HoistError::Config("the build service requires a credentials store".to_string())
        })?;

        match credentials.get(registry)? {
            None => Ok(None),
            Some(method) => match method.as_user_password() {
                Some(auth) => Ok(Some(auth)),
                None => Err(HoistError::AuthMethodMismatch {
                    registry: registry.to_string(),
                    method: method.name().to_string(),
                }),
            },
        }
    }

    fn resolve_builder(&self, image: &Image) -> Result<Builder> {
        match &image.builder {
            None => Ok(Builder::new(image.name.clone(), DEFAULT_DRIVER_NAME, None, None)),
            Some(BuilderRef::Name(name)) => self
                .builders
                .as_ref()
                .ok_or_else(|| {
                    HoistError::Config(format!(
                        "builder '{}' of '{}' cannot be resolved without a builders store",
                        name,
                        image.reference()
                    ))
                })?
                .find(name),
            Some(BuilderRef::Inline(builder)) => Ok(builder.clone()),
            Some(BuilderRef::Document(document)) => Builder::from_document(document),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{AuthMethod, MemoryCredentialsStore};
    use crate::plan::SinglePlan;
    use crate::render::TemplateRenderer;
    use crate::semver::DefaultSemverGenerator;
    use crate::store::ImageStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    // ========================================================================
    // Test collaborators
    // ========================================================================

    /// Runs jobs inline on enqueue
    struct InlineDispatcher;

    #[async_trait]
    impl JobDispatcher for InlineDispatcher {
        async fn enqueue(&self, job: Arc<Job>) -> Result<()> {
            job.run(&CancellationToken::new()).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDriver {
        builds: Mutex<Vec<(Image, BuildDriverOptions)>>,
    }

    #[async_trait]
    impl Driver for RecordingDriver {
        async fn build(
            &self,
            _cancel: &CancellationToken,
            image: &Image,
            options: &BuildDriverOptions,
        ) -> Result<()> {
            self.builds.lock().push((image.copy(), options.clone()));
            Ok(())
        }
    }

    fn service(driver: Arc<RecordingDriver>, credentials: Arc<MemoryCredentialsStore>) -> BuildService {
        let drivers = DriverFactory::new();
        drivers.register(DEFAULT_DRIVER_NAME, driver.clone()).unwrap();
        drivers.register(DRY_RUN_DRIVER_NAME, driver).unwrap();

        BuildService::new()
            .with_builders(Arc::new(BuildersStore::new()))
            .with_driver_factory(Arc::new(drivers))
            .with_dispatcher(Arc::new(InlineDispatcher))
            .with_semver(Arc::new(DefaultSemverGenerator))
            .with_credentials(credentials)
    }

    fn store_with(image: Image) -> Arc<ImageStore> {
        let store = Arc::new(ImageStore::new(Arc::new(TemplateRenderer::new())));
        let name = image.name.clone();
        let version = image.version.clone();
        store.store(&name, &version, image).unwrap();
        store
    }

    fn versions(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[tokio::test]
    async fn test_build_requires_plan() {
        let err = BuildService::new()
            .build(&CancellationToken::new(), None, "app", &[], Some(&BuildOptions::default()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("a build plan is required"));
    }

    #[tokio::test]
    async fn test_build_requires_options() {
        let plan = SinglePlan::new(store_with(Image::new("app", "1.0")));
        let err = BuildService::new()
            .build(&CancellationToken::new(), Some(&plan), "app", &[], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("service options are required"));
    }

    #[tokio::test]
    async fn test_build_requires_collaborators() {
        let plan = SinglePlan::new(store_with(Image::new("app", "1.0")));
        let err = BuildService::new()
            .with_dispatcher(Arc::new(InlineDispatcher))
            .build(
                &CancellationToken::new(),
                Some(&plan),
                "app",
                &[],
                Some(&BuildOptions::default()),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: the build service requires a driver factory"
        );
    }

    // ========================================================================
    // Enrichment
    // ========================================================================

    #[tokio::test]
    async fn test_build_enriches_image() {
        let driver = Arc::new(RecordingDriver::default());
        let credentials = Arc::new(MemoryCredentialsStore::new());
        credentials.store("registry.test", AuthMethod::basic("user", "pass"));

        let image = Image::new("app", "1.2.3+build").with_registry("registry.test", "team");
        let plan = SinglePlan::new(store_with(image));
        let options = BuildOptions {
            tags: vec!["latest".to_string()],
            enable_semver: true,
            semantic_version_tags_templates: vec!["{{ .Major }}.{{ .Minor }}".to_string()],
            push_after_build: true,
            ..Default::default()
        };

        service(driver.clone(), credentials)
            .build(&CancellationToken::new(), Some(&plan), "app", &[], Some(&options))
            .await
            .unwrap();

        let builds = driver.builds.lock();
        assert_eq!(builds.len(), 1);
        let (image, options) = &builds[0];
        assert_eq!(image.version, "1.2.3_build");
        assert_eq!(image.tags, vec!["1.2", "latest"]);
        assert!(options.push_image);
        assert_eq!(options.push_auth, Some(UserPasswordAuth::new("user", "pass")));
        assert!(options.pull_auth.is_none());
        assert_eq!(options.driver_name(), Some(DEFAULT_DRIVER_NAME));
        assert_eq!(
            options.ansible.intermediate_container_name,
            "builder_docker_team_app_1.2.3+build"
        );
    }

    #[tokio::test]
    async fn test_build_dry_run_overrides_driver() {
        let dry_run = Arc::new(RecordingDriver::default());
        let drivers = DriverFactory::new();
        drivers.register(DRY_RUN_DRIVER_NAME, dry_run.clone()).unwrap();

        let plan = SinglePlan::new(store_with(Image::new("app", "1.0")));
        let service = BuildService::new()
            .with_driver_factory(Arc::new(drivers))
            .with_dispatcher(Arc::new(InlineDispatcher))
            .with_semver(Arc::new(DefaultSemverGenerator))
            .with_credentials(Arc::new(MemoryCredentialsStore::new()));
        let options = BuildOptions {
            dry_run: true,
            ..Default::default()
        };

        service
            .build(&CancellationToken::new(), Some(&plan), "app", &[], Some(&options))
            .await
            .unwrap();
        assert_eq!(dry_run.builds.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_build_auth_method_mismatch() {
        let driver = Arc::new(RecordingDriver::default());
        let credentials = Arc::new(MemoryCredentialsStore::new());
        credentials.store("registry.test", AuthMethod::SshAgent);

        let image = Image::new("app", "1.0").with_registry("registry.test", "");
        let plan = SinglePlan::new(store_with(image));

        let err = service(driver.clone(), credentials)
            .build(
                &CancellationToken::new(),
                Some(&plan),
                "app",
                &[],
                Some(&BuildOptions::default()),
            )
            .await
            .unwrap_err();

        let HoistError::Build(errors) = err else {
            panic!("expected an aggregate error");
        };
        assert!(matches!(
            &errors[0],
            HoistError::AuthMethodMismatch { registry, method }
                if registry == "registry.test" && method == "sshagent"
        ));
        assert!(driver.builds.lock().is_empty());
    }

    #[tokio::test]
    async fn test_build_named_builder() {
        let driver = Arc::new(RecordingDriver::default());
        let builders = Arc::new(BuildersStore::new());
        builders
            .store(Builder::new("app-builder", "missing-driver", None, None))
            .unwrap();

        let image = Image::new("app", "1.0").with_builder(BuilderRef::Name("app-builder".to_string()));
        let plan = SinglePlan::new(store_with(image));

        let err = service(driver, Arc::new(MemoryCredentialsStore::new()))
            .with_builders(builders)
            .build(
                &CancellationToken::new(),
                Some(&plan),
                "app",
                &versions(&["1.0"]),
                Some(&BuildOptions::default()),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("driver 'missing-driver'"));
    }

    #[tokio::test]
    async fn test_driver_sees_children_of_stored_image() {
        let store = Arc::new(ImageStore::new(Arc::new(TemplateRenderer::new())));
        let base = store.store("base", "1.0", Image::new("base", "1.0")).unwrap();
        let app = store
            .store("app", "1.0", Image::new("app", "1.0").with_parent(Arc::clone(&base)))
            .unwrap();
        base.add_child(&app);

        let driver = Arc::new(RecordingDriver::default());
        service(driver.clone(), Arc::new(MemoryCredentialsStore::new()))
            .build(
                &CancellationToken::new(),
                Some(&SinglePlan::new(store)),
                "base",
                &versions(&["1.0"]),
                Some(&BuildOptions::default()),
            )
            .await
            .unwrap();

        let builds = driver.builds.lock();
        let children = builds[0].0.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].reference().to_string(), "app:1.0");
    }

    #[tokio::test]
    async fn test_build_emits_events() {
        let events = EventEmitter::new(16);
        let mut rx = events.subscribe();

        let plan = SinglePlan::new(store_with(Image::new("app", "1.0")));
        service(
            Arc::new(RecordingDriver::default()),
            Arc::new(MemoryCredentialsStore::new()),
        )
        .with_event_emitter(events)
        .build(
            &CancellationToken::new(),
            Some(&plan),
            "app",
            &[],
            Some(&BuildOptions::default()),
        )
        .await
        .unwrap();

        let mut keys = Vec::new();
        while let Ok(event) = rx.try_recv() {
            keys.push(event.key);
        }
        assert_eq!(
            keys,
            vec![
                events::BUILD_STARTED,
                events::BUILD_STEP_STARTED,
                events::BUILD_STEP_COMPLETED,
                events::BUILD_FINISHED,
            ]
        );
    }
}
