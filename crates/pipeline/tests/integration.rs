//! Integration tests for pipeline crate

#[cfg(test)]
mod tests {
    use mdk_artifact::{
        ArtifactKind, ArtifactLifecycle, ArtifactNode, ArtifactStateMonitor, InMemoryModuleRuntime,
        InstallArtifact, ListenerRegistry, StagedArtifact,
    };
    use mdk_errors::{DeploymentError, Error};
    use mdk_graph::Dag;
    use mdk_manifest::{LibraryImport, LibraryPackage, Manifest, PackageExport, PackageImport, PlanDescriptor};
    use mdk_pipeline::*;
    use mdk_resolver::{LibraryImportExpander, LibraryProvider, ResolvedLibrary};
    use mdk_types::{ArtifactIdentity, ArtifactState, ArtifactType, Properties, Version, VersionRange};
    use std::sync::{Arc, Mutex};

    struct Libraries(Vec<ResolvedLibrary>);

    impl LibraryProvider for Libraries {
        fn find_library(
            &self,
            name: &str,
            range: &VersionRange,
        ) -> Result<Option<ResolvedLibrary>, Error> {
            Ok(self
                .0
                .iter()
                .find(|l| l.name == name && range.includes(&l.version))
                .cloned())
        }
    }

    fn env_with(libraries: Vec<ResolvedLibrary>) -> InstallEnvironment {
        let lifecycle = ArtifactLifecycle::new(
            ArtifactStateMonitor::new(ListenerRegistry::new()),
            Arc::new(InMemoryModuleRuntime::new()),
        );
        InstallEnvironment::new(
            lifecycle,
            Arc::new(LibraryImportExpander::new(Arc::new(Libraries(libraries)))),
        )
    }

    fn env() -> InstallEnvironment {
        env_with(Vec::new())
    }

    fn module(name: &str, manifest: Manifest) -> InstallArtifact {
        InstallArtifact::new(
            ArtifactIdentity::new(ArtifactType::Module, name, Version::new(1, 0, 0)),
            ArtifactKind::Module { manifest },
            StagedArtifact::new(format!("{name}.toml"), format!("staged/{name}.toml")),
            Properties::new(),
        )
    }

    fn plan(name: &str, scoped: bool) -> InstallArtifact {
        InstallArtifact::new(
            ArtifactIdentity::new(ArtifactType::Plan, name, Version::new(1, 0, 0)),
            ArtifactKind::Plan {
                descriptor: PlanDescriptor {
                    scoped,
                    ..PlanDescriptor::default()
                },
            },
            StagedArtifact::new(format!("{name}.toml"), format!("staged/{name}.toml")),
            Properties::new(),
        )
    }

    fn exporting(package: &str) -> Manifest {
        Manifest {
            exports: vec![PackageExport::new(package, Version::empty())],
            ..Manifest::default()
        }
    }

    fn importing(package: &str) -> Manifest {
        Manifest {
            imports: vec![PackageImport::new(
                package,
                VersionRange::at_least(Version::new(1, 0, 0)),
            )],
            ..Manifest::default()
        }
    }

    /// Plan `shop` with a provider and a consumer of `shop.api`
    fn shop(scoped: bool, consumer: Manifest) -> (ArtifactNode, ArtifactNode, ArtifactNode) {
        let dag = Dag::new();
        let root = dag.create_root_node(plan("shop", scoped));
        let provider = dag.create_root_node(module("shop.core", exporting("shop.api")));
        let consumer = dag.create_root_node(module("shop.web", consumer));
        root.add_child(&provider).unwrap();
        root.add_child(&consumer).unwrap();
        (root, provider, consumer)
    }

    struct Recording {
        name: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl PipelineStage for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn process(&self, _tree: &ArtifactNode, _env: &InstallEnvironment) -> Result<(), Error> {
            self.calls.lock().unwrap().push(self.name);
            if self.fail {
                Err(Error::internal(format!("{} failed", self.name)))
            } else {
                Ok(())
            }
        }
    }

    fn recording(
        name: &'static str,
        calls: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    ) -> Recording {
        Recording {
            name,
            calls: calls.clone(),
            fail,
        }
    }

    #[test]
    fn test_pipeline_aborts_at_first_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .with_stage(recording("first", &calls, false))
            .with_stage(recording("second", &calls, true))
            .with_stage(recording("third", &calls, false));
        let tree = Dag::new().create_root_node(module("m", Manifest::default()));

        let err = pipeline.process(&tree, &env()).unwrap_err();
        assert!(err.to_string().contains("second failed"));
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_compensation_runs_only_on_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tree = Dag::new().create_root_node(module("m", Manifest::default()));

        let failing = CompensatingPipeline::new(
            recording("guarded", &calls, true),
            recording("compensation", &calls, false),
        );
        let err = failing.process(&tree, &env()).unwrap_err();
        assert!(err.to_string().contains("guarded failed"));
        assert_eq!(*calls.lock().unwrap(), vec!["guarded", "compensation"]);

        calls.lock().unwrap().clear();
        let passing = CompensatingPipeline::new(
            recording("guarded", &calls, false),
            recording("compensation", &calls, false),
        );
        passing.process(&tree, &env()).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["guarded"]);
    }

    #[test]
    fn test_compensation_failure_keeps_original_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tree = Dag::new().create_root_node(module("m", Manifest::default()));
        let stage = CompensatingPipeline::new(
            recording("guarded", &calls, true),
            recording("compensation", &calls, true),
        );

        let err = stage.process(&tree, &env()).unwrap_err();
        assert!(err.to_string().contains("guarded failed"));
    }

    #[test]
    fn test_install_pipeline_resolves_scoped_plan() {
        let env = env();
        let (root, provider, consumer) = shop(true, importing("shop.api"));

        install_pipeline().process(&root, &env).unwrap();

        for node in [&root, &provider, &consumer] {
            assert_eq!(node.value().state(), ArtifactState::Resolved);
        }
        assert_eq!(
            consumer.value().identity().scope_name(),
            Some("shop-1.0.0")
        );
        assert_eq!(root.value().identity().scope_name(), None);
        assert_eq!(
            provider.value().property(MODULE_TYPE_PROPERTY).as_deref(),
            Some("standard")
        );

        let state = env.resolver_state();
        let wired = state.get(&consumer.value().identity()).unwrap();
        assert!(wired.resolved);
        assert_eq!(
            wired.wiring.get("shop.api"),
            Some(&provider.value().identity())
        );
    }

    #[test]
    fn test_export_version_defaults_to_module_version() {
        let env = env();
        let (root, provider, _) = shop(false, Manifest::default());

        ManifestUpgrader.process(&root, &env).unwrap();

        let manifest = provider.value().manifest().unwrap();
        assert_eq!(manifest.exports[0].version, Version::new(1, 0, 0));
        assert!(!env.log().is_empty());
    }

    #[test]
    fn test_unresolvable_plan_is_compensated() {
        let env = env();
        let (root, provider, consumer) = shop(false, importing("missing.api"));

        let err = install_pipeline().process(&root, &env).unwrap_err();
        match err {
            Error::Deployment(DeploymentError::UnableToSatisfyPlanDependencies {
                name,
                description,
                ..
            }) => {
                assert_eq!(name, "shop");
                assert!(description.contains("missing.api"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        for node in [&root, &provider, &consumer] {
            assert_eq!(node.value().state(), ArtifactState::Uninstalled);
        }
        assert!(env.resolver_state().is_empty());
    }

    #[test]
    fn test_unresolvable_module_reports_bundle_failure() {
        let env = env();
        let tree = Dag::new().create_root_node(module("lonely", importing("missing.api")));

        let err = install_pipeline().process(&tree, &env).unwrap_err();
        assert!(matches!(
            err,
            Error::Deployment(DeploymentError::UnableToSatisfyBundleDependencies { .. })
        ));
    }

    #[test]
    fn test_clashing_exports_in_scope_are_rejected() {
        let env = env();
        let (root, _, consumer) = shop(true, exporting("shop.api"));

        let err = install_pipeline().process(&root, &env).unwrap_err();
        assert!(matches!(
            err,
            Error::Deployment(DeploymentError::ScopeConflict { ref package, .. }) if package == "shop.api"
        ));
        assert_eq!(consumer.value().state(), ArtifactState::Initial);
    }

    #[test]
    fn test_library_imports_expand_to_packages() {
        let library = ResolvedLibrary::new(
            "commons",
            Version::new(2, 0, 0),
            vec![LibraryPackage {
                name: "commons.io".to_string(),
                range: VersionRange::exact(Version::new(2, 0, 0)),
            }],
        );
        let env = env_with(vec![library]);
        let manifest = Manifest {
            library_imports: vec![LibraryImport::new(
                "commons",
                VersionRange::at_least(Version::new(2, 0, 0)),
            )],
            ..Manifest::default()
        };
        let tree = Dag::new().create_root_node(module("app", manifest));

        ImportExpansionStage.process(&tree, &env).unwrap();

        let manifest = tree.value().manifest().unwrap();
        assert!(manifest.library_imports.is_empty());
        let import = manifest.import("commons.io").unwrap();
        assert_eq!(import.range, VersionRange::exact(Version::new(2, 0, 0)));
    }

    #[test]
    fn test_missing_library_is_logged_as_warning() {
        let env = env();
        let manifest = Manifest {
            library_imports: vec![LibraryImport::new(
                "absent",
                VersionRange::at_least(Version::new(1, 0, 0)),
            )],
            ..Manifest::default()
        };
        let tree = Dag::new().create_root_node(module("app", manifest));

        let err = ImportExpansionStage.process(&tree, &env).unwrap_err();
        assert!(matches!(
            err,
            Error::Deployment(DeploymentError::UnableToSatisfyLibraryDependencies { .. })
        ));

        let entries = env.log().drain();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warning);
        assert_eq!(entries[0].artifact, tree.value().to_string());
        assert!(entries[0].message.contains("absent"));
    }

    #[test]
    fn test_web_module_type_detected() {
        let env = env();
        let mut manifest = Manifest::default();
        manifest
            .headers
            .insert("Web-ContextPath".to_string(), "/shop".to_string());
        let tree = Dag::new().create_root_node(module("web", manifest));

        ModuleTypeDetector.process(&tree, &env).unwrap();
        assert_eq!(
            tree.value().property(MODULE_TYPE_PROPERTY).as_deref(),
            Some("web")
        );
    }

    #[test]
    fn test_refresh_pipeline_leaves_lifecycle_alone() {
        let env = env();
        let (root, _, consumer) = shop(false, importing("shop.api"));
        install_pipeline().process(&root, &env).unwrap();

        env.resolver_state_mut().unresolve(&consumer.value().identity());
        refresh_pipeline().process(&root, &env).unwrap();

        assert_eq!(consumer.value().state(), ArtifactState::Resolved);
        assert!(env
            .resolver_state()
            .get(&consumer.value().identity())
            .unwrap()
            .resolved);
    }

    const STAGES: [&str; 5] = ["a", "b", "c", "d", "e"];

    proptest::proptest! {
        #[test]
        fn prop_pipeline_runs_prefix_up_to_first_failure(
            failing in proptest::collection::vec(proptest::bool::ANY, 5)
        ) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let pipeline = STAGES
                .iter()
                .zip(&failing)
                .fold(Pipeline::new(), |p, (name, fail)| {
                    p.with_stage(recording(*name, &calls, *fail))
                });
            let tree = Dag::new().create_root_node(module("m", Manifest::default()));

            let result = pipeline.process(&tree, &env());
            let ran = calls.lock().unwrap().clone();
            match failing.iter().position(|f| *f) {
                Some(first) => {
                    proptest::prop_assert!(result.is_err());
                    proptest::prop_assert_eq!(ran, STAGES[..=first].to_vec());
                }
                None => {
                    proptest::prop_assert!(result.is_ok());
                    proptest::prop_assert_eq!(ran, STAGES.to_vec());
                }
            }
        }
    }
}
