//! Integration tests for types

#[cfg(test)]
mod tests {
    use mdk_types::*;
    use proptest::prelude::*;

    fn version() -> impl Strategy<Value = Version> {
        (0u32..5, 0u32..5, 0u32..5).prop_map(|(a, b, c)| Version::new(a, b, c))
    }

    fn range() -> impl Strategy<Value = VersionRange> {
        (version(), any::<bool>(), proptest::option::of(version()), any::<bool>()).prop_map(
            |(floor, floor_inclusive, ceiling, ceiling_inclusive)| {
                VersionRange::new(floor, floor_inclusive, ceiling, ceiling_inclusive)
            },
        )
    }

    proptest! {
        #[test]
        fn intersection_includes_exactly_common_versions(a in range(), b in range(), v in version()) {
            let both = a.intersect(&b);
            prop_assert_eq!(both.includes(&v), a.includes(&v) && b.includes(&v));
        }

        #[test]
        fn range_display_reparses(r in range()) {
            let reparsed: VersionRange = r.to_string().parse().unwrap();
            prop_assert_eq!(reparsed, r);
        }
    }

    #[test]
    fn test_empty_intersection() {
        let low: VersionRange = "[1.0,2.0)".parse().unwrap();
        let high: VersionRange = "[2.0,3.0)".parse().unwrap();
        assert!(low.intersect(&high).is_empty());
    }

    #[test]
    fn test_deployment_options_serde_defaults() {
        let opts: DeploymentOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, DeploymentOptions::default());
        assert!(opts.recoverable);
        assert!(!opts.install_only);
    }

    #[test]
    fn test_deployment_identity_from_artifact() {
        let id = ArtifactIdentity::new(ArtifactType::Module, "net.a", Version::new(1, 2, 0))
            .scoped(Some("app".into()));
        let deployed = DeploymentIdentity::from(&id);
        assert_eq!(deployed.to_string(), "module net.a 1.2.0");
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }
}
