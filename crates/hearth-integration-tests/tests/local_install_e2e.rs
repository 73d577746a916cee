//! End-to-end install through the real catalog file source and the local
//! directory installer.

use std::sync::Arc;

use hearth_catalog::{CatalogClient, DEFAULT_TIMEOUT, source_for_location};
use hearth_core::HearthHome;
use hearth_env::{EnvironmentRegistry, EnvironmentStore, SessionContext, SourceInstaller};
use hearth_test::{env_name, package_name};

#[tokio::test]
async fn installs_local_package_from_catalog_file() {
    let tmp = tempfile::tempdir().unwrap();

    let source_dir = tmp.path().join("src").join("french");
    std::fs::create_dir_all(source_dir.join("phrases")).unwrap();
    std::fs::write(source_dir.join("skill.toml"), "name = \"french-skill\"\n").unwrap();
    std::fs::write(source_dir.join("phrases").join("greetings.txt"), "bonjour\n").unwrap();

    let catalog_path = tmp.path().join("catalog.json");
    let catalog = serde_json::json!([
        {
            "name": "french-skill",
            "version": "1.2.0",
            "kind": "ability",
            "sourceRef": source_dir.display().to_string(),
        },
        {
            "name": "french-skill",
            "version": "1.0.0",
            "kind": "ability",
            "sourceRef": format!("file://{}", source_dir.display()),
        }
    ]);
    std::fs::write(&catalog_path, serde_json::to_vec(&catalog).unwrap()).unwrap();

    let source = source_for_location(&catalog_path.display().to_string(), DEFAULT_TIMEOUT).unwrap();
    let registry = Arc::new(EnvironmentRegistry::new(
        EnvironmentStore::new(HearthHome::from_path(tmp.path().join("home"))),
        Arc::new(CatalogClient::new(source)),
        Arc::new(SourceInstaller::default()),
        env_name("default"),
    ));

    let session = SessionContext::create_in(Arc::clone(&registry), env_name("research"))
        .await
        .unwrap();
    let name = package_name("french-skill");
    let pkg = session
        .install(&name, None, &hearth_core::CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(pkg.version, "1.2.0");

    let manager = session.package_manager();
    assert!(manager.verify().is_empty());
    let root = manager.environment().storage_root.clone();
    let installed: Vec<_> = std::fs::read_dir(root.join("packages").join("french-skill"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(installed.len(), 1);
    assert_eq!(
        std::fs::read_to_string(installed[0].join("phrases").join("greetings.txt")).unwrap(),
        "bonjour\n"
    );

    session.remove(&name).await.unwrap();
    assert!(session.list_packages().is_empty());
    assert!(!installed[0].exists());
}

#[tokio::test]
async fn unsupported_source_ref_fails_install() {
    let tmp = tempfile::tempdir().unwrap();
    let catalog_path = tmp.path().join("catalog.json");
    std::fs::write(
        &catalog_path,
        r#"[{"name":"odd","version":"1","kind":"driver","sourceRef":"ftp://host/odd"}]"#,
    )
    .unwrap();

    let source = source_for_location(&catalog_path.display().to_string(), DEFAULT_TIMEOUT).unwrap();
    let registry = EnvironmentRegistry::new(
        EnvironmentStore::new(HearthHome::from_path(tmp.path().join("home"))),
        Arc::new(CatalogClient::new(source)),
        Arc::new(SourceInstaller::default()),
        env_name("default"),
    );
    let manager = registry
        .attach(&env_name("default"), hearth_core::SessionId::new())
        .await
        .unwrap();

    let err = manager
        .install(&package_name("odd"), None, &hearth_core::CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, hearth_core::HearthError::InstallFailed { .. }));
    assert!(manager.list().is_empty());
}
