//! HTTP handlers

use actix_web::http::header;
use actix_web::{delete, get, web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream};
use log::{debug, error, info};
use log_mdc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::app_state::AppState;
use crate::error::{GatewayError, Result};
use crate::types::FileHash;

const CIPHER_HEADER: &str = "Cipher";
const DOWNLOAD_CHUNK: usize = 64 * 1024;

/// Register every gateway route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(version)
        .service(download)
        .service(get_track)
        .service(delete_track);
}

fn parse_fid(raw: &str) -> Result<FileHash> {
    let fid = FileHash::parse(raw)?;
    log_mdc::insert("fid", fid.as_str());
    Ok(fid)
}

fn cipher_key(req: &HttpRequest) -> Result<Option<String>> {
    match req.headers().get(CIPHER_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|key| Some(key.to_string()))
            .map_err(|_| GatewayError::DecryptFailure("cipher header is not valid text".into())),
    }
}

/// Read `file` as a stream of chunks of at most `chunk` bytes
fn file_chunks(file: File, chunk: usize) -> impl Stream<Item = std::io::Result<Bytes>> {
    stream::try_unfold(file, move |mut file| async move {
        let mut buf = BytesMut::zeroed(chunk);
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((buf.freeze(), file)))
    })
}

#[get("/version")]
pub async fn version() -> HttpResponse {
    HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
}

#[get("/download/{fid}")]
pub async fn download(path: web::Path<String>, req: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let fid = parse_fid(&path.into_inner())?;
    let key = cipher_key(&req)?;
    info!("Download requested for {}", fid);

    let file = app_state
        .coordinator
        .retrieve(&fid, app_state.file_dir(), key.as_deref())
        .await
        .map_err(|e| {
            error!("Download of {} failed: {}", fid, e);
            e
        })?;

    let handle = File::open(&file)
        .await
        .map_err(GatewayError::io(format!("open {}", file.display())))?;
    let len = handle
        .metadata()
        .await
        .map_err(GatewayError::io(format!("stat {}", file.display())))?
        .len();
    debug!("Streaming {} bytes for {}", len, fid);

    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .insert_header((header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", fid)))
        .no_chunking(len)
        .streaming(file_chunks(handle, DOWNLOAD_CHUNK)))
}

#[get("/track/{fid}")]
pub async fn get_track(path: web::Path<String>, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let fid = parse_fid(&path.into_inner())?;
    let record = app_state.track_store.read_record(fid.as_str())?;
    Ok(HttpResponse::Ok().json(record))
}

#[delete("/track/{fid}")]
pub async fn delete_track(path: web::Path<String>, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let fid = parse_fid(&path.into_inner())?;
    app_state.track_store.delete(fid.as_str());
    Ok(HttpResponse::NoContent().finish())
}
