//! Integration tests for artifact crate

#[cfg(test)]
mod tests {
    use mdk_artifact::*;
    use mdk_errors::{Error, LifecycleError};
    use mdk_events::{AppEvent, LifecycleEvent};
    use mdk_graph::Dag;
    use mdk_manifest::{Manifest, PlanDescriptor};
    use mdk_types::{ArtifactIdentity, ArtifactState, ArtifactType, Properties, Version};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    /// Records every notification as `(artifact name, event)`
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, &'static str)>>,
    }

    impl Recorder {
        fn push(&self, artifact: &InstallArtifact, event: &'static str) {
            self.seen.lock().unwrap().push((artifact.name(), event));
        }

        fn events_of(&self, name: &str) -> Vec<&'static str> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, e)| *e)
                .collect()
        }
    }

    impl InstallArtifactLifecycleListener for Recorder {
        fn on_installing(&self, a: &InstallArtifact) -> Result<(), Error> {
            self.push(a, "installing");
            Ok(())
        }
        fn on_installed(&self, a: &InstallArtifact) {
            self.push(a, "installed");
        }
        fn on_install_failed(&self, a: &InstallArtifact, _e: &Error) {
            self.push(a, "install_failed");
        }
        fn on_resolving(&self, a: &InstallArtifact) -> Result<(), Error> {
            self.push(a, "resolving");
            Ok(())
        }
        fn on_resolved(&self, a: &InstallArtifact) {
            self.push(a, "resolved");
        }
        fn on_starting(&self, a: &InstallArtifact) -> Result<(), Error> {
            self.push(a, "starting");
            Ok(())
        }
        fn on_started(&self, a: &InstallArtifact) -> Result<(), Error> {
            self.push(a, "started");
            Ok(())
        }
        fn on_start_failed(&self, a: &InstallArtifact, _e: &Error) {
            self.push(a, "start_failed");
        }
        fn on_start_aborted(&self, a: &InstallArtifact) {
            self.push(a, "start_aborted");
        }
        fn on_stopping(&self, a: &InstallArtifact) -> Result<(), Error> {
            self.push(a, "stopping");
            Ok(())
        }
        fn on_stopped(&self, a: &InstallArtifact) {
            self.push(a, "stopped");
        }
        fn on_uninstalling(&self, a: &InstallArtifact) -> Result<(), Error> {
            self.push(a, "uninstalling");
            Ok(())
        }
        fn on_uninstalled(&self, a: &InstallArtifact) {
            self.push(a, "uninstalled");
        }
        fn on_unresolved(&self, a: &InstallArtifact) {
            self.push(a, "unresolved");
        }
    }

    struct FailOn(&'static str);

    impl InstallArtifactLifecycleListener for FailOn {
        fn on_installing(&self, _a: &InstallArtifact) -> Result<(), Error> {
            match self.0 {
                "installing" => Err(Error::internal("rejected install")),
                _ => Ok(()),
            }
        }
        fn on_started(&self, _a: &InstallArtifact) -> Result<(), Error> {
            match self.0 {
                "started" => Err(Error::internal("rejected start")),
                _ => Ok(()),
            }
        }
    }

    /// Fails or aborts the start of one named module
    struct Faulty {
        inner: InMemoryModuleRuntime,
        name: &'static str,
        abort: bool,
    }

    impl ModuleRuntime for Faulty {
        fn install(&self, module: &ArtifactIdentity, manifest: &Manifest) -> Result<(), Error> {
            self.inner.install(module, manifest)
        }
        fn start(&self, module: &ArtifactIdentity) -> Result<StartOutcome, Error> {
            if module.name() != self.name {
                return self.inner.start(module);
            }
            if self.abort {
                Ok(StartOutcome::Aborted)
            } else {
                Err(Error::internal("activator threw"))
            }
        }
        fn stop(&self, module: &ArtifactIdentity) -> Result<(), Error> {
            self.inner.stop(module)
        }
        fn uninstall(&self, module: &ArtifactIdentity) -> Result<(), Error> {
            self.inner.uninstall(module)
        }
    }

    fn module(name: &str) -> InstallArtifact {
        InstallArtifact::new(
            ArtifactIdentity::new(ArtifactType::Module, name, Version::new(1, 0, 0)),
            ArtifactKind::Module {
                manifest: Manifest::default(),
            },
            StagedArtifact::new(format!("{name}.toml"), format!("staged/{name}.toml")),
            Properties::new(),
        )
    }

    fn plan(name: &str, atomic: bool) -> InstallArtifact {
        InstallArtifact::new(
            ArtifactIdentity::new(ArtifactType::Plan, name, Version::new(1, 0, 0)),
            ArtifactKind::Plan {
                descriptor: PlanDescriptor {
                    atomic,
                    ..PlanDescriptor::default()
                },
            },
            StagedArtifact::new(format!("{name}.toml"), format!("staged/{name}.toml")),
            Properties::new(),
        )
    }

    fn setup(runtime: Arc<dyn ModuleRuntime>) -> (ArtifactLifecycle, ListenerRegistry, Arc<Recorder>) {
        let registry = ListenerRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register(recorder.clone());
        let lifecycle = ArtifactLifecycle::new(ArtifactStateMonitor::new(registry.clone()), runtime);
        (lifecycle, registry, recorder)
    }

    fn bring_up(lifecycle: &ArtifactLifecycle, node: &ArtifactNode) -> Result<(), Error> {
        lifecycle.install(node)?;
        lifecycle.resolve_with(node, || Ok(()))?;
        lifecycle.start(node)
    }

    #[test]
    fn test_happy_path_notifications() {
        let (lifecycle, _, recorder) = setup(Arc::new(InMemoryModuleRuntime::new()));
        let node = Dag::new().create_root_node(module("m"));

        bring_up(&lifecycle, &node).unwrap();

        assert_eq!(node.value().state(), ArtifactState::Started);
        assert_eq!(
            recorder.events_of("m"),
            vec!["installing", "installed", "resolving", "resolved", "starting", "started"]
        );
    }

    #[test]
    fn test_child_install_completes_before_parent() {
        let (lifecycle, _, recorder) = setup(Arc::new(InMemoryModuleRuntime::new()));
        let dag = Dag::new();
        let root = dag.create_root_node(plan("p", false));
        let child = dag.create_root_node(module("m"));
        root.add_child(&child).unwrap();

        lifecycle.install(&root).unwrap();

        let seen = recorder.seen.lock().unwrap().clone();
        let child_installed = seen.iter().position(|e| *e == ("m".to_string(), "installed"));
        let parent_installed = seen.iter().position(|e| *e == ("p".to_string(), "installed"));
        assert!(child_installed.unwrap() < parent_installed.unwrap());
    }

    #[test]
    fn test_listener_failure_in_installing_fails_install() {
        let (lifecycle, registry, recorder) = setup(Arc::new(InMemoryModuleRuntime::new()));
        registry.register(Arc::new(FailOn("installing")));
        let node = Dag::new().create_root_node(module("m"));

        let err = lifecycle.install(&node).unwrap_err();
        assert!(matches!(
            err,
            Error::Lifecycle(LifecycleError::ListenerFailed { .. })
        ));
        assert_eq!(node.value().state(), ArtifactState::Initial);
        assert_eq!(recorder.events_of("m"), vec!["installing", "install_failed"]);
    }

    #[test]
    fn test_listener_failure_in_started_stops_artifact() {
        let runtime = Arc::new(InMemoryModuleRuntime::new());
        let (lifecycle, registry, recorder) = setup(runtime.clone());
        registry.register(Arc::new(FailOn("started")));
        let node = Dag::new().create_root_node(module("m"));

        let err = bring_up(&lifecycle, &node).unwrap_err();
        assert!(matches!(
            err,
            Error::Lifecycle(LifecycleError::ListenerFailed { .. })
        ));
        assert_eq!(node.value().state(), ArtifactState::Stopped);
        assert_eq!(
            runtime.status(&node.value().identity()),
            Some(ModuleStatus::Installed)
        );
        let events = recorder.events_of("m");
        assert_eq!(&events[events.len() - 3..], &["started", "stopping", "stopped"]);
    }

    #[test]
    fn test_atomic_plan_stops_started_siblings() {
        let runtime = Arc::new(Faulty {
            inner: InMemoryModuleRuntime::new(),
            name: "bad",
            abort: false,
        });
        let (lifecycle, _, _) = setup(runtime);
        let dag = Dag::new();
        let root = dag.create_root_node(plan("p", true));
        let good = dag.create_root_node(module("good"));
        let bad = dag.create_root_node(module("bad"));
        root.add_child(&good).unwrap();
        root.add_child(&bad).unwrap();

        assert!(bring_up(&lifecycle, &root).is_err());
        assert_eq!(good.value().state(), ArtifactState::Stopped);
        assert_eq!(bad.value().state(), ArtifactState::Resolved);
        assert_eq!(root.value().state(), ArtifactState::Resolved);
    }

    #[test]
    fn test_non_atomic_plan_keeps_started_siblings() {
        let runtime = Arc::new(Faulty {
            inner: InMemoryModuleRuntime::new(),
            name: "bad",
            abort: false,
        });
        let (lifecycle, _, _) = setup(runtime);
        let dag = Dag::new();
        let root = dag.create_root_node(plan("p", false));
        let good = dag.create_root_node(module("good"));
        let bad = dag.create_root_node(module("bad"));
        root.add_child(&good).unwrap();
        root.add_child(&bad).unwrap();

        assert!(bring_up(&lifecycle, &root).is_err());
        assert_eq!(good.value().state(), ArtifactState::Started);
    }

    #[test]
    fn test_aborted_start() {
        let runtime = Arc::new(Faulty {
            inner: InMemoryModuleRuntime::new(),
            name: "m",
            abort: true,
        });
        let (lifecycle, _, recorder) = setup(runtime);
        let node = Dag::new().create_root_node(module("m"));

        let err = bring_up(&lifecycle, &node).unwrap_err();
        assert!(matches!(
            err,
            Error::Lifecycle(LifecycleError::StartAborted { .. })
        ));
        assert_eq!(node.value().state(), ArtifactState::Resolved);
        assert_eq!(recorder.events_of("m").last(), Some(&"start_aborted"));
    }

    #[test]
    fn test_uninstall_waits_for_resolve_in_progress() {
        let (lifecycle, _, recorder) = setup(Arc::new(InMemoryModuleRuntime::new()));
        let node = Dag::new().create_root_node(module("m"));
        lifecycle.install(&node).unwrap();

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (lifecycle, node) = (&lifecycle, &node);
        std::thread::scope(|scope| {
            let resolver = scope.spawn(move || {
                lifecycle.resolve_with(node, || {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
            });
            entered_rx.recv().unwrap();

            let uninstaller = scope.spawn(move || lifecycle.uninstall(node));
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert_eq!(node.value().state(), ArtifactState::Resolving);

            release_tx.send(()).unwrap();
            resolver.join().unwrap().unwrap();
            uninstaller.join().unwrap().unwrap();
        });

        assert_eq!(node.value().state(), ArtifactState::Uninstalled);
        assert_eq!(
            recorder.events_of("m"),
            vec![
                "installing",
                "installed",
                "resolving",
                "resolved",
                "uninstalling",
                "uninstalled"
            ]
        );
    }

    /// Reports the module stopped from inside its own start
    struct StoppedWhileStarting {
        inner: InMemoryModuleRuntime,
        signals: ArtifactRuntime,
        artifact: std::sync::OnceLock<Arc<InstallArtifact>>,
    }

    impl ModuleRuntime for StoppedWhileStarting {
        fn install(&self, module: &ArtifactIdentity, manifest: &Manifest) -> Result<(), Error> {
            self.inner.install(module, manifest)
        }
        fn start(&self, module: &ArtifactIdentity) -> Result<StartOutcome, Error> {
            if let Some(artifact) = self.artifact.get() {
                self.signals.signal_stopped(artifact)?;
            }
            self.inner.start(module)
        }
        fn stop(&self, module: &ArtifactIdentity) -> Result<(), Error> {
            self.inner.stop(module)
        }
        fn uninstall(&self, module: &ArtifactIdentity) -> Result<(), Error> {
            self.inner.uninstall(module)
        }
    }

    #[test]
    fn test_stop_signal_inside_start_aborts_start() {
        let registry = ListenerRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register(recorder.clone());
        let runtime = Arc::new(StoppedWhileStarting {
            inner: InMemoryModuleRuntime::new(),
            signals: ArtifactRuntime::new(ArtifactStateMonitor::new(registry.clone())),
            artifact: std::sync::OnceLock::new(),
        });
        let lifecycle = ArtifactLifecycle::new(ArtifactStateMonitor::new(registry), runtime.clone());
        let node = Dag::new().create_root_node(module("m"));
        runtime.artifact.set(node.value_arc()).unwrap();

        let err = bring_up(&lifecycle, &node).unwrap_err();

        assert!(matches!(
            err,
            Error::Lifecycle(LifecycleError::StartAborted { .. })
        ));
        assert_eq!(node.value().state(), ArtifactState::Resolved);
        let events = recorder.events_of("m");
        assert_eq!(events.last(), Some(&"start_aborted"));
        assert!(!events.contains(&"started"));
    }

    #[test]
    fn test_runtime_signals_are_idempotent() {
        let registry = ListenerRegistry::new();
        let monitor = ArtifactStateMonitor::new(registry.clone());
        let runtime = ArtifactRuntime::new(monitor);
        let artifact = module("m");

        runtime.signal_starting(&artifact).unwrap();
        let late = Arc::new(Recorder::default());
        registry.register(late.clone());

        runtime.signal_started(&artifact).unwrap();
        runtime.signal_started(&artifact).unwrap();
        runtime.signal_stopped(&artifact).unwrap();
        runtime.signal_stopped(&artifact).unwrap();

        assert_eq!(late.events_of("m"), vec!["started", "stopping", "stopped"]);
    }

    #[test]
    fn test_stop_signal_during_start_aborts() {
        let registry = ListenerRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register(recorder.clone());
        let runtime = ArtifactRuntime::new(ArtifactStateMonitor::new(registry));
        let artifact = module("m");

        runtime.signal_starting(&artifact).unwrap();
        runtime.signal_stopped(&artifact).unwrap();
        assert_eq!(artifact.state(), ArtifactState::Resolved);
        assert_eq!(recorder.events_of("m"), vec!["starting", "start_aborted"]);
    }

    #[test]
    fn test_event_emitting_listener() {
        let (sender, mut receiver) = mdk_events::channel();
        let registry = ListenerRegistry::new();
        registry.register(Arc::new(EventEmittingListener::new(sender)));
        let lifecycle = ArtifactLifecycle::new(
            ArtifactStateMonitor::new(registry),
            Arc::new(InMemoryModuleRuntime::new()),
        );
        let node = Dag::new().create_root_node(module("m"));

        lifecycle.install(&node).unwrap();

        let mut transitions = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            if let AppEvent::Lifecycle(LifecycleEvent::Transition { from, to, .. }) = message.event {
                transitions.push((from, to));
            }
        }
        assert_eq!(
            transitions,
            vec![
                (ArtifactState::Initial, ArtifactState::Installing),
                (ArtifactState::Installing, ArtifactState::Installed),
            ]
        );
    }

    #[test]
    fn test_emitted_transition_starts_from_actual_state() {
        let (sender, mut receiver) = mdk_events::channel();
        let registry = ListenerRegistry::new();
        registry.register(Arc::new(EventEmittingListener::new(sender)));
        let lifecycle = ArtifactLifecycle::new(
            ArtifactStateMonitor::new(registry),
            Arc::new(InMemoryModuleRuntime::new()),
        );
        let node = Dag::new().create_root_node(module("m"));

        lifecycle.install(&node).unwrap();
        lifecycle.resolve_with(&node, || Ok(())).unwrap();
        lifecycle.uninstall(&node).unwrap();

        let mut transitions = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            if let AppEvent::Lifecycle(LifecycleEvent::Transition { from, to, .. }) = message.event {
                transitions.push((from, to));
            }
        }
        assert!(transitions.contains(&(ArtifactState::Resolved, ArtifactState::Uninstalling)));
        assert!(!transitions.contains(&(ArtifactState::Stopped, ArtifactState::Uninstalling)));
    }

    #[test]
    fn test_shared_child_survives_one_parent_uninstall() {
        let (lifecycle, _, _) = setup(Arc::new(InMemoryModuleRuntime::new()));
        let dag = Dag::new();
        let p1 = dag.create_root_node(plan("p1", false));
        let p2 = dag.create_root_node(plan("p2", false));
        let shared = dag.create_root_node(module("lib"));
        p1.add_child(&shared).unwrap();
        p2.add_child(&shared).unwrap();

        bring_up(&lifecycle, &p1).unwrap();
        bring_up(&lifecycle, &p2).unwrap();
        lifecycle.uninstall(&p1).unwrap();

        assert_eq!(p1.value().state(), ArtifactState::Uninstalled);
        assert_eq!(shared.value().state(), ArtifactState::Started);

        lifecycle.uninstall(&p2).unwrap();
        assert_eq!(shared.value().state(), ArtifactState::Uninstalled);
    }

    #[test]
    fn test_read_manifest_from_staged_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.toml");
        std::fs::write(
            &path,
            "type = \"module\"\nname = \"m\"\nversion = \"1.0\"\n\n[[manifest.exports]]\nname = \"p\"\n",
        )
        .unwrap();

        let artifact = InstallArtifact::new(
            ArtifactIdentity::new(ArtifactType::Module, "m", Version::new(1, 0, 0)),
            ArtifactKind::Module {
                manifest: Manifest::default(),
            },
            StagedArtifact::new(&path, &path),
            Properties::new(),
        );
        let manifest = artifact.read_manifest().unwrap();
        assert_eq!(manifest.exports.len(), 1);
    }

    const CANONICAL: [&str; 10] = [
        "installing",
        "installed",
        "resolving",
        "resolved",
        "starting",
        "started",
        "stopping",
        "stopped",
        "uninstalling",
        "uninstalled",
    ];

    proptest! {
        #[test]
        fn prop_lifecycle_is_monotonic(mut ops in proptest::collection::vec(0usize..5, 1..12)) {
            ops.sort_unstable();
            let (lifecycle, _, recorder) = setup(Arc::new(InMemoryModuleRuntime::new()));
            let node = Dag::new().create_root_node(module("m"));

            for op in ops {
                // out-of-order requests are rejected without a state change
                let _ = match op {
                    0 => lifecycle.install(&node),
                    1 => lifecycle.resolve_with(&node, || Ok(())),
                    2 => lifecycle.start(&node),
                    3 => lifecycle.stop(&node),
                    _ => lifecycle.uninstall(&node),
                };
            }

            let positions: Vec<usize> = recorder
                .events_of("m")
                .iter()
                .map(|event| CANONICAL.iter().position(|c| c == event).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
