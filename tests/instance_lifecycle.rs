use std::fs;
use webots_manager::api::ManagerApi;
use webots_manager::catalog::dir::DirCatalog;
use webots_manager::error::ManagerError;
use webots_manager::instance::InstanceStore;
use webots_manager::lock::LockFile;
use webots_manager::test_utils::TestEnv;
use webots_manager::version::Version;

fn open(env: &TestEnv) -> InstanceStore<DirCatalog> {
    let catalog = DirCatalog::new(&env.mirror, &env.config.arch).unwrap();
    InstanceStore::open(&env.config, catalog).unwrap()
}

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

#[test]
fn active_version_is_always_installed() {
    let env = TestEnv::new();
    env.publish(v("2020.1.0"));
    env.publish(v("2021.0.0"));
    let mut store = open(&env);

    for step in ["2021.0.0", "2020.1.0", "9.9.9", "2021.0.0"] {
        let _ = store.use_version(v(step));
        let active = store.active().unwrap();
        assert!(store.installed().contains(&active));
        for other in store.installed() {
            assert_eq!(store.is_used(other), other == active);
        }
    }
    assert_eq!(store.active(), Some(v("2021.0.0")));
}

#[test]
fn home_link_follows_active_version() {
    let env = TestEnv::new();
    env.publish(v("2020.1.0"));
    env.publish(v("2021.0.0"));
    let mut api = ManagerApi::from_config(&env.config).unwrap();
    api.init().unwrap();

    let marker = env.config.home_link.join("resources/version.txt");
    api.use_version("2021.0.0").unwrap();
    assert_eq!(fs::read_to_string(&marker).unwrap(), "2021.0.0");
    api.use_version("2020.1.0").unwrap();
    assert_eq!(fs::read_to_string(&marker).unwrap(), "2020.1.0");
    assert_eq!(
        fs::read_link(&env.config.home_link).unwrap(),
        env.layout().used_link()
    );
}

#[test]
fn motd_reaches_only_whitelisted_version() {
    let env = TestEnv::new();
    env.publish(v("2020.1.0"));
    env.publish(v("2021.0.0"));
    let mut api = ManagerApi::from_config(&env.config).unwrap();

    let motd = env.source_file("motd", "hello");
    api.add_template(&motd, "etc/motd").unwrap();
    api.whitelist("etc/motd", &["2021.0.0"]).unwrap();
    api.install(&["2021.0.0", "2020.1.0"]).unwrap();

    let layout = env.layout();
    assert_eq!(
        fs::read_to_string(layout.version_dir(v("2021.0.0")).join("etc/motd")).unwrap(),
        "hello"
    );
    assert!(fs::symlink_metadata(layout.version_dir(v("2020.1.0")).join("etc/motd")).is_err());
}

#[test]
fn held_lock_blocks_a_second_process() {
    let env = TestEnv::new();
    env.publish(v("2021.0.0"));
    let mut store = open(&env);

    let lock = LockFile::new(env.layout().lock_path());
    let guard = lock.try_acquire().unwrap();
    assert!(matches!(
        store.use_version(v("2021.0.0")),
        Err(ManagerError::LockContention { .. })
    ));
    assert_eq!(store.active(), None);

    guard.release().unwrap();
    store.use_version(v("2021.0.0")).unwrap();
    assert!(!lock.path().exists());
}

#[test]
fn state_survives_reopen() {
    let env = TestEnv::new();
    env.publish(v("2021.0.0"));
    open(&env).use_version(v("2021.0.0")).unwrap();

    let store = open(&env);
    assert_eq!(store.installed(), vec![v("2021.0.0")]);
    assert!(store.is_used(v("2021.0.0")));
}

#[test]
fn template_reconciliation_covers_versions_installed_by_another_store() {
    let env = TestEnv::new();
    env.publish(v("2020.1.0"));
    env.publish(v("2021.0.0"));
    let mut api = ManagerApi::from_config(&env.config).unwrap();
    api.install(&["2020.1.0"]).unwrap();

    open(&env).install(v("2021.0.0")).unwrap();
    let license = env.source_file("license", "site");
    api.add_template(&license, "resources/license").unwrap();

    let link = env.layout().version_dir(v("2021.0.0")).join("resources/license");
    assert_eq!(fs::read_to_string(link).unwrap(), "site");
}
