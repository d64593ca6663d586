//! Integration tests for the fetch → parse → check → update pipeline
//!
//! These tests drive a complete "dummy" ecosystem through:
//! - Registry lookup
//! - Update round trips and idempotence
//! - Per-dependency failure isolation

mod common;

use common::*;
use depcore::domain::{DependencyFile, DependencySet};
use depcore::ecosystem::EcosystemRegistry;
use depcore::error::{CoreError, DependencyFileError};
use depcore::pipeline::{parse_files, FileUpdate, Pipeline, Stage};
use std::sync::Arc;

fn registry() -> EcosystemRegistry {
    EcosystemRegistry::from_descriptors([Arc::new(dummy_ecosystem(default_available()))]).unwrap()
}

fn repo() -> InMemoryRepo {
    InMemoryRepo::default()
        .with_file("app/Dummyfile", MANIFEST)
        .with_file("app/Dummyfile.lock", LOCKFILE)
}

/// Replace each original file with its updated snapshot
fn apply(originals: &[DependencyFile], updated: &[DependencyFile]) -> Vec<DependencyFile> {
    originals
        .iter()
        .map(|file| {
            updated
                .iter()
                .find(|u| u.path() == file.path())
                .unwrap_or(file)
                .clone()
        })
        .collect()
}

mod registry {
    use super::*;

    #[test]
    fn test_lookup_returns_complete_descriptor() {
        let registry = registry();
        let ecosystem = registry.get("dummy").unwrap();
        assert_eq!(ecosystem.name(), "dummy");
        assert_eq!(ecosystem.parser().required_files(), &["Dummyfile"]);
        assert!(ecosystem.fetcher().required_files_in(&["Dummyfile", "README"]));
        assert!(!ecosystem.fetcher().required_files_in(&["README"]));
    }

    #[test]
    fn test_pipeline_for_unknown_ecosystem() {
        let err = Pipeline::for_ecosystem(&registry(), "cobol").unwrap_err();
        assert_eq!(CoreError::from(err).error_type(), "unknown_ecosystem");
    }
}

mod round_trip {
    use super::*;

    #[tokio::test]
    async fn test_update_then_recheck_is_up_to_date() {
        let pipeline = Pipeline::for_ecosystem(&registry(), "dummy").unwrap();
        let report = pipeline.run(&fetch_context(repo(), "/app")).await.unwrap();

        assert!(!report.has_failures());
        assert_eq!(report.dependencies.len(), 2);
        assert_eq!(report.updates.len(), 1);

        let update = &report.updates[0];
        assert_eq!(update.dependency.name, "rack");
        assert_eq!(update.dependency.version.as_deref(), Some("2.0.0"));
        assert_eq!(update.dependency.previous_version.as_deref(), Some("1.2.0"));
        assert_eq!(
            update.dependency.requirements[0].requirement.as_deref(),
            Some("~> 2.0")
        );

        let manifest = update.files.iter().find(|f| f.name() == "Dummyfile").unwrap();
        assert_eq!(
            manifest.content_text(),
            Some("rack \"~> 2.0\"\nrspec \"~> 3.0\" test\n")
        );
        let lockfile = update.files.iter().find(|f| f.name() == "Dummyfile.lock").unwrap();
        assert_eq!(lockfile.content_text(), Some("rack 2.0.0\nrspec 3.0.0\n"));

        // Feed the updated files back through the pipeline.
        let files = apply(&report.files, &update.files);
        let updated_repo = files.iter().fold(InMemoryRepo::default(), |repo, file| {
            repo.with_file(&file.path(), file.content_text().unwrap())
        });
        let second = pipeline
            .run(&fetch_context(updated_repo, "/app"))
            .await
            .unwrap();
        assert!(second.updates.is_empty());
        assert!(!second.has_failures());
        assert_eq!(
            second.dependencies.get("rack").unwrap().version.as_deref(),
            Some("2.0.0")
        );
    }

    #[tokio::test]
    async fn test_fetched_files_are_not_modified() -> anyhow::Result<()> {
        let pipeline = Pipeline::for_ecosystem(&registry(), "dummy")?;
        let report = pipeline.run(&fetch_context(repo(), "/app")).await?;

        let manifest = report
            .files
            .iter()
            .find(|f| f.name() == "Dummyfile")
            .ok_or_else(|| anyhow::anyhow!("Dummyfile was not fetched"))?;
        assert_eq!(manifest.content_text(), Some(MANIFEST));
        assert_eq!(manifest.path(), "app/Dummyfile");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let pipeline = Pipeline::for_ecosystem(&registry(), "dummy").unwrap();
        let report = pipeline.run(&fetch_context(repo(), "/app")).await.unwrap();
        let update = &report.updates[0];

        let ecosystem = pipeline.ecosystem();
        let dependencies = std::slice::from_ref(&update.dependency);
        let first = FileUpdate::new(ecosystem.updater())
            .apply(dependencies, &report.files)
            .await
            .unwrap();
        let second = FileUpdate::new(ecosystem.updater())
            .apply(dependencies, &report.files)
            .await
            .unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.path(), b.path());
            assert_eq!(a.content(), b.content());
        }
    }

    #[tokio::test]
    async fn test_manifest_without_lockfile() {
        let repo = InMemoryRepo::default().with_file("app/Dummyfile", MANIFEST);
        let pipeline = Pipeline::for_ecosystem(&registry(), "dummy").unwrap();
        let report = pipeline.run(&fetch_context(repo, "/app")).await.unwrap();

        assert_eq!(report.files.len(), 1);
        // rspec's "~> 3.0" already admits 3.0.0, so only rack moves.
        assert_eq!(report.updates.len(), 1);
        let rack = &report.updates[0];
        assert_eq!(rack.dependency.name, "rack");
        assert_eq!(rack.dependency.previous_version, None);
        assert_eq!(rack.files.len(), 1);
        assert_eq!(
            rack.files[0].content_text(),
            Some("rack \"~> 2.0\"\nrspec \"~> 3.0\" test\n")
        );
    }
}

mod fetching {
    use super::*;

    #[tokio::test]
    async fn test_missing_manifest_names_path() {
        let repo = InMemoryRepo::default().with_file("Dummyfile", MANIFEST);
        let pipeline = Pipeline::for_ecosystem(&registry(), "dummy").unwrap();
        let err = pipeline.run(&fetch_context(repo, "/app")).await.unwrap_err();

        assert_eq!(err.error_type(), "dependency_file_not_found");
        match err {
            CoreError::DependencyFile(DependencyFileError::NotFound { path }) => {
                assert_eq!(path, "app/Dummyfile");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_root_directory() {
        let repo = InMemoryRepo::default()
            .with_file("Dummyfile", MANIFEST)
            .with_file("Dummyfile.lock", LOCKFILE);
        let pipeline = Pipeline::for_ecosystem(&registry(), "dummy").unwrap();
        let report = pipeline.run(&fetch_context(repo, "/")).await.unwrap();
        assert_eq!(report.files[0].path(), "Dummyfile");
        assert_eq!(report.updates.len(), 1);
    }
}

mod parsing {
    use super::*;

    fn parse(manifest: &str) -> DependencySet {
        let ecosystem = dummy_ecosystem(default_available());
        let files = vec![DependencyFile::new("Dummyfile", manifest)];
        parse_files(ecosystem.name(), ecosystem.parser(), &files).unwrap()
    }

    #[test]
    fn test_repeated_declarations_merge() {
        let set = parse("foo \"1.0\" test\nfoo \"1.0\" runtime\n");
        assert_eq!(set.len(), 1);

        let foo = set.get("foo").unwrap();
        assert_eq!(foo.requirements.len(), 2);
        assert_eq!(foo.groups(), vec!["test", "runtime"]);
    }

    #[test]
    fn test_production_predicate() {
        let ecosystem = dummy_ecosystem(default_available());
        let set = parse("foo \"1.0\" test\nfoo \"1.0\" runtime\nrspec \"3.0\" test\n");

        assert!(set.get("foo").unwrap().production(&ecosystem));
        assert!(!set.get("rspec").unwrap().production(&ecosystem));
    }

    #[test]
    fn test_unparseable_line() {
        let ecosystem = dummy_ecosystem(default_available());
        let files = vec![DependencyFile::new("Dummyfile", "rack ~> 1.2\n")];
        let err = parse_files(ecosystem.name(), ecosystem.parser(), &files).unwrap_err();
        assert_eq!(err.error_type(), "dependency_file_not_parseable");
    }
}

mod failure_isolation {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_check_failure_does_not_stop_other_dependencies() {
        let available = HashMap::from([("rack", vec!["1.2.0", "2.0.0"])]);
        let registry =
            EcosystemRegistry::from_descriptors([Arc::new(dummy_ecosystem(available))]).unwrap();
        let pipeline = Pipeline::for_ecosystem(&registry, "dummy").unwrap();
        let report = pipeline.run(&fetch_context(repo(), "/app")).await.unwrap();

        assert!(report.has_failures());
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.dependency, "rspec");
        assert_eq!(failure.stage, Stage::Check);
        assert_eq!(failure.error.error_type(), "registry_error");

        assert_eq!(report.updates.len(), 1);
        assert_eq!(report.updates[0].dependency.name, "rack");
    }

    #[tokio::test]
    async fn test_ignored_versions_are_not_proposed() {
        let options = depcore::pipeline::CheckOptions {
            ignored_versions: vec![">= 2.0".to_string()],
            ..Default::default()
        };
        let pipeline = Pipeline::for_ecosystem(&registry(), "dummy")
            .unwrap()
            .with_options(options);
        let report = pipeline.run(&fetch_context(repo(), "/app")).await.unwrap();

        let rack = &report.updates[0].dependency;
        assert_eq!(rack.version.as_deref(), Some("1.3.0"));
        assert_eq!(rack.requirements[0].requirement.as_deref(), Some("~> 1.3"));
    }
}
