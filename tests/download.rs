#![cfg(unix)]

mod support;

use node_brainer::client_config::ConfigStore;
use node_brainer::clients::{geth, lighthouse, Geth, GethConfig, Lighthouse, LighthouseConfig};
use node_brainer::platform::HostPlatform;
use node_brainer::release::ClientIdentity;
use node_brainer::{Client, Error, RunState};
use support::{fake_node, tarball, StubServer};

const LIGHTHOUSE_ASSET: &str = "/download/v1.2.3/lighthouse-v1.2.3-x86_64-unknown-linux-gnu.tar.gz";

fn lighthouse_client(server: &StubServer, store: ConfigStore) -> Lighthouse {
    let identity = ClientIdentity::new(
        lighthouse::NAME,
        &server.url("/lighthouse/releases/latest"),
        &server.url("/download/{tag}/lighthouse-{tag}-{arch}-{os}.tar.gz"),
    )
    .unwrap();
    Lighthouse::with_identity(store, identity)
        .unwrap()
        .with_host(HostPlatform::new("linux", "amd64"))
}

async fn lighthouse_server() -> StubServer {
    let server = StubServer::start().await;
    server.json("/lighthouse/releases/latest", r#"{"tag_name":"v1.2.3","name":"Lighthouse"}"#);
    server.bytes(
        LIGHTHOUSE_ASSET,
        tarball(&[("lighthouse", &fake_node("Lighthouse v1.2.3-abcdef"))]),
    );
    server
}

#[tokio::test]
async fn lighthouse_download_installs_and_records_provenance() {
    let server = lighthouse_server().await;
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path());
    store.init::<LighthouseConfig>(lighthouse::NAME).unwrap();

    let mut client = lighthouse_client(&server, store.clone());
    client.download().await.unwrap();

    let binary = dir.path().join("clients/binaries/lighthouse/v1.2.3/lighthouse");
    assert!(binary.is_file());

    let saved: LighthouseConfig = store.load(lighthouse::NAME).unwrap();
    let provenance = saved.node.binary.clone().unwrap();
    assert_eq!(provenance.path, "clients/binaries/lighthouse/v1.2.3/lighthouse");
    assert_eq!(provenance.version, "v1.2.3");
    assert_eq!(provenance.os, "linux-gnu");
    assert_eq!(provenance.arch, "x86_64-unknown");
    assert_eq!(provenance.sha_commit, None);
    assert_eq!(&saved, client.config());
    assert_eq!(client.status().state, RunState::Installed);
}

#[tokio::test]
async fn second_download_reuses_the_installed_release() {
    let server = lighthouse_server().await;
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path());
    store.init::<LighthouseConfig>(lighthouse::NAME).unwrap();

    lighthouse_client(&server, store.clone()).download().await.unwrap();
    let first = std::fs::read(store.config_path(lighthouse::NAME)).unwrap();

    lighthouse_client(&server, store.clone()).download().await.unwrap();
    let second = std::fs::read(store.config_path(lighthouse::NAME)).unwrap();

    assert_eq!(server.hits("/lighthouse/releases/latest"), 2);
    assert_eq!(server.hits(LIGHTHOUSE_ASSET), 1);
    assert_eq!(first, second);
    assert!(!dir
        .path()
        .join("clients/binaries/lighthouse/v1.2.3.lock")
        .exists());
}

#[tokio::test]
async fn upstream_errors_leave_config_untouched() {
    let server = StubServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path());
    store.init::<LighthouseConfig>(lighthouse::NAME).unwrap();
    let before = std::fs::read(store.config_path(lighthouse::NAME)).unwrap();

    let err = lighthouse_client(&server, store.clone())
        .download()
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("lighthouse download failed"));
    assert!(matches!(err.root(), Error::Upstream { status: 404, .. }));
    assert_eq!(std::fs::read(store.config_path(lighthouse::NAME)).unwrap(), before);
}

#[tokio::test]
async fn corrupt_archive_is_a_decompression_error() {
    let server = StubServer::start().await;
    server.json("/lighthouse/releases/latest", r#"{"tag_name":"v1.2.3"}"#);
    server.bytes(LIGHTHOUSE_ASSET, b"definitely not gzip".to_vec());

    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path());
    store.init::<LighthouseConfig>(lighthouse::NAME).unwrap();

    let mut client = lighthouse_client(&server, store.clone());
    let err = client.download().await.unwrap_err();
    assert!(matches!(err.root(), Error::Decompression(_)));

    let saved: LighthouseConfig = store.load(lighthouse::NAME).unwrap();
    assert_eq!(saved.node.binary, None);
}

#[tokio::test]
async fn geth_download_resolves_the_tag_commit() {
    let server = StubServer::start().await;
    server.json("/geth/releases/latest", r#"{"tag_name":"v1.13.5"}"#);
    server.json(
        "/geth/refs/tags/v1.13.5",
        r#"{"ref":"refs/tags/v1.13.5","object":{"sha":"916d6a441a866cb618ae826c220866de118899f7","type":"commit"}}"#,
    );
    let asset = "/builds/geth-linux-amd64-1.13.5-916d6a44.tar.gz";
    server.bytes(
        asset,
        tarball(&[(
            "geth-linux-amd64-1.13.5-916d6a44/geth",
            &fake_node("Geth version 1.13.5-stable-916d6a44"),
        )]),
    );

    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path());
    store.init::<GethConfig>(geth::NAME).unwrap();

    let identity = ClientIdentity::new(
        geth::NAME,
        &server.url("/geth/releases/latest"),
        &server.url("/builds/geth-{os}-{arch}-{version}-{commit}.tar.gz"),
    )
    .unwrap()
    .with_tag_commit_url(&server.url("/geth/refs/tags/{tag}"))
    .unwrap();
    let mut client = Geth::with_identity(store.clone(), identity)
        .unwrap()
        .with_host(HostPlatform::new("linux", "amd64"));
    client.download().await.unwrap();

    assert_eq!(server.hits(asset), 1);
    let saved: GethConfig = store.load(geth::NAME).unwrap();
    let provenance = saved.node.binary.unwrap();
    assert_eq!(
        provenance.path,
        "clients/binaries/geth/v1.13.5/geth-linux-amd64-1.13.5-916d6a44/geth"
    );
    assert_eq!(provenance.sha_commit.as_deref(), Some("916d6a44"));
    assert!(dir.path().join(&provenance.path).is_file());
}

#[tokio::test]
async fn installs_when_server_sends_no_length() {
    let server = StubServer::start().await;
    server.json("/lighthouse/releases/latest", r#"{"tag_name":"v1.2.3"}"#);
    server.bytes_chunked(
        LIGHTHOUSE_ASSET,
        tarball(&[("lighthouse", &fake_node("Lighthouse v1.2.3"))]),
    );

    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path());
    store.init::<LighthouseConfig>(lighthouse::NAME).unwrap();

    let mut client = lighthouse_client(&server, store.clone());
    client.download().await.unwrap();

    assert_eq!(server.hits(LIGHTHOUSE_ASSET), 1);
    assert!(dir
        .path()
        .join("clients/binaries/lighthouse/v1.2.3/lighthouse")
        .is_file());
    assert_eq!(client.status().state, RunState::Installed);
}

#[tokio::test]
async fn truncated_binary_from_an_earlier_run_is_reinstalled() {
    let server = lighthouse_server().await;
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path());
    store.init::<LighthouseConfig>(lighthouse::NAME).unwrap();

    let binary = dir.path().join("clients/binaries/lighthouse/v1.2.3/lighthouse");
    support::write_file(&binary, "#!/bin/sh\nif [");
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    lighthouse_client(&server, store.clone()).download().await.unwrap();
    assert_eq!(server.hits(LIGHTHOUSE_ASSET), 1);
    assert!(std::fs::read_to_string(&binary)
        .unwrap()
        .contains("Lighthouse v1.2.3-abcdef"));

    lighthouse_client(&server, store.clone()).download().await.unwrap();
    assert_eq!(server.hits(LIGHTHOUSE_ASSET), 1);

    let saved: LighthouseConfig = store.load(lighthouse::NAME).unwrap();
    assert_eq!(saved.node.binary.unwrap().version, "v1.2.3");
}
