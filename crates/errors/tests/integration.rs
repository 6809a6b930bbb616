//! Integration tests for error types

#[cfg(test)]
mod tests {
    use mdk_errors::*;

    #[test]
    fn test_error_conversion() {
        let graph_err = GraphError::Cyclic {
            parent: "n1".into(),
            child: "n0".into(),
        };
        let err: Error = graph_err.into();
        assert!(matches!(err, Error::Graph(GraphError::Cyclic { .. })));
        assert_eq!(err.user_code(), Some("graph.cyclic"));
    }

    #[test]
    fn test_error_display() {
        let err = DeploymentError::ImportMergeConflict {
            package: "net.a".into(),
            first_source: "Import-Package".into(),
            second_source: "library util".into(),
        };
        assert_eq!(
            err.to_string(),
            "import of package net.a from Import-Package conflicts with import from library util"
        );
    }

    #[test]
    fn test_wrapped_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::io_with_path(&io, "/tmp/module.toml")
            .into_deployment_failure("failed to read manifest");

        assert_eq!(err.chain().count(), 2);
        assert!(matches!(err.root_cause(), Error::Io { .. }));
        assert!(err.user_message().contains("failed to read manifest"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unsatisfied_dependency_classification() {
        let err = DeploymentError::UnableToSatisfyBundleDependencies {
            name: "app".into(),
            version: "1.0.0".into(),
            description: "missing net.a".into(),
            failures: vec!["missing net.a".into()],
        };
        assert!(err.is_unsatisfied_dependencies());
        assert!(!DeploymentError::Failed {
            message: "boom".into()
        }
        .is_unsatisfied_dependencies());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::IoError { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let storage_err =
            StorageError::from_io_with_path(&io_err, std::path::Path::new("/var/stage"));
        assert!(matches!(storage_err, StorageError::PermissionDenied { .. }));
    }
}
