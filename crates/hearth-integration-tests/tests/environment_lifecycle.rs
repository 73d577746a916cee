//! Environment deletion and per-environment index corruption.

use std::sync::Arc;

use hearth_core::HearthError;
use hearth_env::{INDEX_FILE_NAME, SessionContext};
use hearth_test::{GatedInstaller, RegistryFixture, french_skill_entry};

#[tokio::test]
async fn delete_refused_while_bound_then_allowed() {
    let fx = RegistryFixture::new().with_entry(french_skill_entry()).build();
    let name = fx.env("research");
    let session = SessionContext::create_in(Arc::clone(&fx.registry), name.clone())
        .await
        .unwrap();
    session
        .install(&fx.package("french-skill"), None, &fx.token())
        .await
        .unwrap();
    let root = session.package_manager().environment().storage_root.clone();

    let err = fx.registry.delete(&name).await.unwrap_err();
    assert!(matches!(err, HearthError::EnvironmentInUse { sessions: 1, .. }));
    assert!(root.exists());

    drop(session);
    fx.registry.delete(&name).await.unwrap();
    assert!(!root.exists());
    assert!(fx.registry.get(&name).unwrap().is_none());
    assert!(matches!(
        fx.registry.get_manager(&name).await,
        Err(HearthError::EnvironmentNotFound(_))
    ));
}

#[tokio::test]
async fn recreated_environment_starts_empty() {
    let fx = RegistryFixture::new().with_entry(french_skill_entry()).build();
    let name = fx.env("scratch");
    let session = SessionContext::create_in(Arc::clone(&fx.registry), name.clone())
        .await
        .unwrap();
    session
        .install(&fx.package("french-skill"), None, &fx.token())
        .await
        .unwrap();
    session.destroy();

    fx.registry.delete(&name).await.unwrap();
    let session = SessionContext::create_in(Arc::clone(&fx.registry), name.clone())
        .await
        .unwrap();
    assert!(session.list_packages().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_stops_installs_running_without_a_session() {
    let gate = Arc::new(GatedInstaller::new());
    let fx = RegistryFixture::new()
        .with_entry(french_skill_entry())
        .with_installer(gate.clone())
        .build();
    let name = fx.env("scratch");
    let root = fx.registry.ensure(&name).unwrap().storage_root;
    let manager = fx.registry.get_manager(&name).await.unwrap();

    let install = {
        let manager = Arc::clone(&manager);
        let package = fx.package("french-skill");
        let token = fx.token();
        tokio::spawn(async move { manager.install(&package, None, &token).await })
    };
    gate.wait_started(1).await;

    fx.registry.delete(&name).await.unwrap();
    assert!(!root.exists());

    // Opening the gate after the delete must not resurrect anything.
    gate.open(1);
    let err = install.await.unwrap().unwrap_err();
    assert!(matches!(err, HearthError::EnvironmentNotFound(_)));
    assert_eq!(gate.finished(), 0);
    assert!(!root.exists());
    assert!(matches!(
        manager.install(&fx.package("french-skill"), None, &fx.token()).await,
        Err(HearthError::EnvironmentNotFound(_))
    ));

    fx.registry.ensure(&name).unwrap();
    let fresh = fx.registry.get_manager(&name).await.unwrap();
    assert!(!Arc::ptr_eq(&manager, &fresh));
    assert!(fresh.list().is_empty());
    assert!(!root.join(INDEX_FILE_NAME).exists());
}

#[tokio::test]
async fn create_rejects_existing_environment() {
    let fx = RegistryFixture::new().build();
    fx.registry.create(&fx.env("lab")).unwrap();
    assert!(matches!(
        fx.registry.create(&fx.env("lab")),
        Err(HearthError::EnvironmentExists(_))
    ));
    let first = fx.registry.ensure(&fx.env("lab")).unwrap();
    let second = fx.registry.ensure(&fx.env("lab")).unwrap();
    assert_eq!(first, second);
    assert_eq!(fx.registry.list().unwrap().len(), 1);
}

#[tokio::test]
async fn corrupt_index_is_confined_and_repairable() {
    let fx = RegistryFixture::new().with_entry(french_skill_entry()).build();
    let broken = fx.env("broken");
    let healthy = fx.env("healthy");
    let root = fx.registry.ensure(&broken).unwrap().storage_root;
    std::fs::write(root.join(INDEX_FILE_NAME), "this is [not toml").unwrap();

    let err = fx.registry.get_manager(&broken).await.unwrap_err();
    assert!(err.is_index_corrupt());

    let manager = fx.registry.attach(&healthy, fx.session()).await.unwrap();
    manager
        .install(&fx.package("french-skill"), None, &fx.token())
        .await
        .unwrap();
    assert_eq!(manager.list().len(), 1);

    std::fs::write(root.join(INDEX_FILE_NAME), "").unwrap();
    let repaired = fx.registry.get_manager(&broken).await.unwrap();
    assert!(repaired.list().is_empty());
}

#[tokio::test]
async fn prune_clears_orphans_but_keeps_installed() {
    let fx = RegistryFixture::new().with_entry(french_skill_entry()).build();
    let manager = fx.registry.attach(&fx.env("research"), fx.session()).await.unwrap();
    manager
        .install(&fx.package("french-skill"), None, &fx.token())
        .await
        .unwrap();
    let root = manager.environment().storage_root.clone();
    std::fs::create_dir_all(root.join("packages").join("french-skill").join("leftover")).unwrap();
    std::fs::create_dir_all(root.join(hearth_env::STAGING_DIR).join("dead")).unwrap();

    let removed = manager.prune_orphans().await.unwrap();
    assert_eq!(removed, 2);
    assert!(manager.verify().is_empty());
    assert_eq!(manager.list().len(), 1);
}
