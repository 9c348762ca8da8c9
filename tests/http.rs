mod common;

use actix_web::{http::StatusCode, test, web, App};
use std::path::Path;

use common::{content, hash, params, Network, CIPHER_KEY};
use deoss_gateway::app_state::AppState;
use deoss_gateway::config::AppConfig;
use deoss_gateway::retrieve::assemble::SegmentCipher;
use deoss_gateway::service;
use deoss_gateway::track::{TrackOperation, TrackRecord};
use tempfile::tempdir;

fn state_for(network: &Network, root: &Path) -> AppState {
    let mut config = AppConfig::default();
    let erasure = params();
    config.retrieval.file_dir = root.join("file");
    config.retrieval.data_shards = erasure.data_shards;
    config.retrieval.par_shards = erasure.par_shards;
    config.retrieval.fragment_size = erasure.fragment_size;
    config.track.dir = root.join("track");

    AppState::with_collaborators(
        config,
        network.metadata.clone(),
        network.book.clone(),
        network.transport.clone(),
    )
    .unwrap()
}

#[actix_web::test]
async fn test_version() {
    let network = Network::new();
    let dir = tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_for(&network, dir.path())))
            .configure(service::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/version").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, env!("CARGO_PKG_VERSION").as_bytes());
}

#[actix_web::test]
async fn test_download_plain_and_encrypted() {
    let mut network = Network::new();
    let plain = content(200);
    let plain_meta = network.publish(&plain, None);
    let secret = content(130);
    let secret_meta = network.publish(&secret, Some(&SegmentCipher::new(CIPHER_KEY).unwrap()));

    let dir = tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_for(&network, dir.path())))
            .configure(service::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/download/{}", plain_meta.fid))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/octet-stream");
    let disposition = resp.headers().get("content-disposition").unwrap().to_str().unwrap();
    assert!(disposition.contains(plain_meta.fid.as_str()));
    assert_eq!(test::read_body(resp).await, plain);

    let req = test::TestRequest::get()
        .uri(&format!("/download/{}", secret_meta.fid))
        .insert_header(("Cipher", CIPHER_KEY))
        .to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, secret);

    assert!(dir.path().join("file").join(plain_meta.fid.as_str()).is_file());
}

#[actix_web::test]
async fn test_download_error_statuses() {
    let mut network = Network::new();
    let meta = network.publish(&content(100), None);
    for shard in 0..3 {
        network.transport.set_unreachable(common::peer(shard));
    }

    let dir = tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state_for(&network, dir.path())))
            .configure(service::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/download/not-a-hash").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri(&format!("/download/{}", hash(0xbeef)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/download/{}", meta.fid))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[actix_web::test]
async fn test_track_records_over_http() {
    let network = Network::new();
    let dir = tempdir().unwrap();
    let state = state_for(&network, dir.path());
    let fid = hash(42);
    let mut record = TrackRecord::new(fid, TrackOperation::Upload);
    record.file_name = "report.pdf".into();
    record.file_size = 4096;
    state.track_store.write_record(&record).unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(service::configure),
    )
    .await;

    let req = test::TestRequest::get().uri(&format!("/track/{}", fid)).to_request();
    let fetched: TrackRecord = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched, record);

    let req = test::TestRequest::delete().uri(&format!("/track/{}", fid)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    assert!(!state.track_store.exists(fid.as_str()));

    // deleting again is a no-op
    let req = test::TestRequest::delete().uri(&format!("/track/{}", fid)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&format!("/track/{}", fid)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}
