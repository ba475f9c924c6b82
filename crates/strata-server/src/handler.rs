//! Route handlers: streaming upload, streaming download, and diff.
//!
//! Uploads arrive as multipart bodies whose parts are JSON arrays of
//! objects, optionally gzipped. Downloads leave as gzip streams built
//! chunk by chunk from store pages, so neither direction ever holds a
//! whole model in memory. Every response is produced exactly once; a
//! failed part stops admission, drains what is already in flight, and
//! answers with the first failure.

use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Json, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;

use strata_query::SimpleChildQuery;
use strata_types::{ObjectId, StreamId};

use crate::auth::Permit;
use crate::error::{ServerError, ServerResult};
use crate::gzip::{gunzip_limited, gzip_all, GzipChunker};
use crate::state::AppState;

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler() -> Json<Value> {
    Json(json!({
        "name": "strata-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn require(permit: Permit) -> ServerResult<()> {
    if permit.allowed {
        Ok(())
    } else {
        Err(ServerError::Denied {
            status: permit.status,
            reason: permit.reason,
        })
    }
}

fn parse_stream(raw: &str) -> ServerResult<StreamId> {
    StreamId::parse(raw).map_err(|e| ServerError::BadRequest(e.to_string()))
}

fn parse_object_id(raw: &str) -> ServerResult<ObjectId> {
    ObjectId::parse(raw).map_err(|e| ServerError::BadRequest(e.to_string()))
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// `POST /objects/{streamId}` -- multipart batched upload.
///
/// Each part is one JSON array of objects, plain or gzipped. Parts are
/// admitted into bounded waves; uploads are not atomic, so batches
/// committed before a failing part stay committed.
pub async fn upload_objects(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
    mut multipart: Multipart,
) -> ServerResult<StatusCode> {
    let stream = parse_stream(&stream_id)?;
    require(state.permissions.can_write(&stream).await)?;

    let max_part = state.config.max_part_size;
    let wave_width = state.config.wave_width.max(1);

    let mut tasks: JoinSet<ServerResult<usize>> = JoinSet::new();
    let mut parts = 0usize;
    let mut stored = 0usize;
    let mut failure: Option<ServerError> = None;

    while failure.is_none() {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                failure = Some(ServerError::BadRequest(format!("malformed multipart: {e}")));
                break;
            }
        };

        match read_part(field, max_part).await {
            Ok(objects) => {
                parts += 1;
                if tasks.len() >= wave_width {
                    if let Err(e) = drain_parts(&mut tasks, &mut stored).await {
                        failure = Some(e);
                        break;
                    }
                }
                let ingester = state.ingester.clone();
                let stream = stream.clone();
                tasks.spawn(async move {
                    let ids = ingester.ingest(&stream, objects).await?;
                    Ok(ids.len())
                });
            }
            Err(e) => failure = Some(e),
        }
    }

    // Always settle in-flight parts before answering, failure or not.
    if let Err(e) = drain_parts(&mut tasks, &mut stored).await {
        failure = Some(failure.take().unwrap_or(e));
    }
    if let Some(err) = failure {
        return Err(err);
    }
    if parts == 0 {
        return Err(ServerError::BadRequest(
            "upload contained no multipart parts".into(),
        ));
    }

    tracing::info!(stream = %stream, parts, objects = stored, "upload complete");
    Ok(StatusCode::CREATED)
}

const PLAIN_PART_TYPES: [&str; 3] = ["text/plain", "application/json", "application/octet-stream"];

/// Read one multipart part into a JSON array of objects, enforcing the
/// per-part size cap on both wire and inflated bytes.
async fn read_part(
    mut field: axum::extract::multipart::Field<'_>,
    max_part: usize,
) -> ServerResult<Vec<Value>> {
    let content_type = field.content_type().unwrap_or("application/json").to_owned();
    let is_gzip = content_type.contains("gzip")
        || field.file_name().is_some_and(|n| n.ends_with(".gz"));
    if !is_gzip && !PLAIN_PART_TYPES.iter().any(|t| content_type.starts_with(t)) {
        return Err(ServerError::BadRequest(format!(
            "unsupported upload part content type: {content_type}"
        )));
    }

    let mut buf: Vec<u8> = Vec::new();
    loop {
        let chunk = field
            .chunk()
            .await
            .map_err(|e| ServerError::BadRequest(format!("malformed multipart part: {e}")))?;
        let Some(chunk) = chunk else { break };
        let observed = buf.len() + chunk.len();
        if observed > max_part {
            return Err(ServerError::BadRequest(format!(
                "upload part too large ({observed} > {max_part} bytes)"
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    let raw = if is_gzip {
        gunzip_limited(&buf, max_part)?
    } else {
        buf
    };

    let value: Value = serde_json::from_slice(&raw)
        .map_err(|e| ServerError::BadRequest(format!("upload part is not valid JSON: {e}")))?;
    match value {
        Value::Array(objects) => Ok(objects),
        _ => Err(ServerError::BadRequest(
            "upload part must be a JSON array of objects".into(),
        )),
    }
}

async fn drain_parts(
    tasks: &mut JoinSet<ServerResult<usize>>,
    stored: &mut usize,
) -> ServerResult<()> {
    let mut failure: Option<ServerError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(count)) => *stored += count,
            Ok(Err(e)) => failure = Some(failure.take().unwrap_or(e)),
            Err(e) => {
                failure = Some(
                    failure
                        .take()
                        .unwrap_or_else(|| ServerError::Internal(e.to_string())),
                );
            }
        }
    }
    failure.map_or(Ok(()), Err)
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// How object rows are framed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Framing {
    /// One JSON array of payloads (the default).
    JsonArray,
    /// `id\t{payload}\n` per row, selected with `Accept: text/plain`.
    SimpleText,
}

impl Framing {
    fn from_headers(headers: &HeaderMap) -> Self {
        let accepts_text = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/plain"));
        if accepts_text {
            Self::SimpleText
        } else {
            Self::JsonArray
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Self::JsonArray => "application/json",
            Self::SimpleText => "text/plain",
        }
    }

    fn head(self) -> &'static [u8] {
        match self {
            Self::JsonArray => b"[",
            Self::SimpleText => b"",
        }
    }

    fn tail(self) -> &'static [u8] {
        match self {
            Self::JsonArray => b"]",
            Self::SimpleText => b"",
        }
    }

    fn frame(self, id: &ObjectId, payload: &serde_json::Map<String, Value>, first: bool) -> Vec<u8> {
        let data = serde_json::to_vec(payload).unwrap_or_else(|_| b"null".to_vec());
        match self {
            Self::JsonArray => {
                let mut out = Vec::with_capacity(data.len() + 1);
                if !first {
                    out.push(b',');
                }
                out.extend_from_slice(&data);
                out
            }
            Self::SimpleText => {
                let mut out = Vec::with_capacity(id.as_str().len() + data.len() + 2);
                out.extend_from_slice(id.as_str().as_bytes());
                out.push(b'\t');
                out.extend_from_slice(&data);
                out.push(b'\n');
                out
            }
        }
    }
}

type FrameSender = mpsc::Sender<Result<Bytes, std::io::Error>>;

/// Hand one compressed frame to the client within the chunk deadline.
/// Returns false when the client is gone or too slow; the producer then
/// stops and its store cursor is dropped.
async fn send_frame(tx: &FrameSender, timeout: Duration, frame: Bytes) -> bool {
    if frame.is_empty() {
        return true;
    }
    matches!(
        tokio::time::timeout(timeout, tx.send(Ok(frame))).await,
        Ok(Ok(()))
    )
}

async fn fail_stream(tx: &FrameSender, err: impl std::fmt::Display) {
    let _ = tx.send(Err(std::io::Error::other(err.to_string()))).await;
}

fn gzip_stream_response(framing: Framing, rx: mpsc::Receiver<Result<Bytes, std::io::Error>>) -> ServerResult<Response> {
    Response::builder()
        .header(header::CONTENT_TYPE, framing.content_type())
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| ServerError::Internal(e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    /// Closure depth bound; omitted means the whole subtree.
    pub depth: Option<u32>,
}

/// `GET /objects/{streamId}/{objectId}` -- the root object followed by
/// its whole subtree, streamed as one gzip body in store-page chunks.
pub async fn download_object(
    State(state): State<AppState>,
    Path((stream_id, object_id)): Path<(String, String)>,
    Query(params): Query<DownloadQuery>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let stream = parse_stream(&stream_id)?;
    let root_id = parse_object_id(&object_id)?;
    require(state.permissions.can_read(&stream).await)?;

    let root = state
        .store
        .get(&stream, &root_id)?
        .ok_or_else(|| ServerError::NotFound(format!("object {object_id} in {stream_id}")))?;

    let framing = Framing::from_headers(&headers);
    let depth = params.depth.unwrap_or(u32::MAX);
    let chunk_size = state.config.download_chunk_size.max(1);
    let timeout = state.config.chunk_timeout();
    let queries = state.queries.clone();

    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut chunker = GzipChunker::new();
        let mut buf: Vec<u8> = Vec::new();
        buf.extend_from_slice(framing.head());
        buf.extend_from_slice(&framing.frame(&root.id, &root.data, true));

        let mut sent = 1usize;
        let mut cursor: Option<ObjectId> = None;
        loop {
            let query = SimpleChildQuery {
                limit: Some(chunk_size),
                depth: Some(depth),
                select: None,
                cursor: cursor.take(),
            };
            let page = match queries.children(&stream, &root.id, &query) {
                Ok(page) => page,
                Err(e) => {
                    fail_stream(&tx, e).await;
                    return;
                }
            };
            if page.objects.is_empty() {
                break;
            }
            let last_page = page.objects.len() < chunk_size;
            for record in &page.objects {
                buf.extend_from_slice(&framing.frame(&record.id, &record.data, false));
            }
            sent += page.objects.len();

            let frame = match chunker.write(&buf) {
                Ok(frame) => frame,
                Err(e) => {
                    fail_stream(&tx, e).await;
                    return;
                }
            };
            buf.clear();
            if !send_frame(&tx, timeout, frame).await {
                tracing::debug!(stream = %stream, root = %root.id, "client went away mid-download");
                return;
            }
            if last_page {
                break;
            }
            cursor = page.cursor;
        }

        buf.extend_from_slice(framing.tail());
        let frame = match chunker.write(&buf) {
            Ok(frame) => frame,
            Err(e) => {
                fail_stream(&tx, e).await;
                return;
            }
        };
        let fin = match chunker.finish() {
            Ok(fin) => fin,
            Err(e) => {
                fail_stream(&tx, e).await;
                return;
            }
        };
        if send_frame(&tx, timeout, frame).await {
            let _ = send_frame(&tx, timeout, fin).await;
            tracing::debug!(stream = %stream, root = %root.id, objects = sent, "subtree download complete");
        }
    });

    gzip_stream_response(framing, rx)
}

/// `GET /objects/{streamId}/{objectId}/single` -- one payload, no
/// children, no compression.
pub async fn download_single(
    State(state): State<AppState>,
    Path((stream_id, object_id)): Path<(String, String)>,
) -> ServerResult<Json<Value>> {
    let stream = parse_stream(&stream_id)?;
    let id = parse_object_id(&object_id)?;
    require(state.permissions.can_read(&stream).await)?;

    let record = state
        .store
        .get(&stream, &id)?
        .ok_or_else(|| ServerError::NotFound(format!("object {object_id} in {stream_id}")))?;
    Ok(Json(Value::Object(record.data)))
}

/// Body shape shared by the id-list download and diff routes. The id list
/// itself travels as a JSON-encoded string, mirroring the upload client's
/// form encoding.
#[derive(Debug, Deserialize)]
pub struct IdListBody {
    pub objects: String,
}

fn parse_id_list(body: &IdListBody) -> ServerResult<Vec<ObjectId>> {
    let raw: Vec<String> = serde_json::from_str(&body.objects).map_err(|_| {
        ServerError::BadRequest("`objects` must be a JSON array of object ids".into())
    })?;
    raw.iter().map(|id| parse_object_id(id)).collect()
}

/// `POST /api/getobjects/{streamId}` -- stream the existing subset of the
/// requested ids. Absent ids are silently omitted.
pub async fn download_object_list(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<IdListBody>,
) -> ServerResult<Response> {
    let stream = parse_stream(&stream_id)?;
    require(state.permissions.can_read(&stream).await)?;
    let ids = parse_id_list(&body)?;

    let framing = Framing::from_headers(&headers);
    let chunk_size = state.config.download_chunk_size.max(1);
    let timeout = state.config.chunk_timeout();
    let store = state.store.clone();

    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut chunker = GzipChunker::new();
        let mut buf: Vec<u8> = Vec::new();
        buf.extend_from_slice(framing.head());

        let mut first = true;
        for chunk in ids.chunks(chunk_size) {
            let records = match store.get_many(&stream, chunk) {
                Ok(records) => records,
                Err(e) => {
                    fail_stream(&tx, e).await;
                    return;
                }
            };
            for record in &records {
                buf.extend_from_slice(&framing.frame(&record.id, &record.data, first));
                first = false;
            }
            let frame = match chunker.write(&buf) {
                Ok(frame) => frame,
                Err(e) => {
                    fail_stream(&tx, e).await;
                    return;
                }
            };
            buf.clear();
            if !send_frame(&tx, timeout, frame).await {
                tracing::debug!(stream = %stream, "client went away mid-download");
                return;
            }
        }

        buf.extend_from_slice(framing.tail());
        let frame = match chunker.write(&buf) {
            Ok(frame) => frame,
            Err(e) => {
                fail_stream(&tx, e).await;
                return;
            }
        };
        let fin = match chunker.finish() {
            Ok(fin) => fin,
            Err(e) => {
                fail_stream(&tx, e).await;
                return;
            }
        };
        if send_frame(&tx, timeout, frame).await {
            let _ = send_frame(&tx, timeout, fin).await;
        }
    });

    gzip_stream_response(framing, rx)
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// `POST /api/diff/{streamId}` -- gzip JSON map `id -> present` covering
/// every requested id.
pub async fn diff_objects(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
    Json(body): Json<IdListBody>,
) -> ServerResult<Response> {
    let stream = parse_stream(&stream_id)?;
    require(state.permissions.can_read(&stream).await)?;
    let ids = parse_id_list(&body)?;

    let report = strata_diff::diff(&state.store, &stream, &ids)?;
    let json = serde_json::to_vec(&report.presence)
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    let compressed = gzip_all(&json)?;

    tracing::debug!(
        stream = %stream,
        requested = ids.len(),
        missing = report.missing().count(),
        "diff answered"
    );
    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(compressed))
        .map_err(|e| ServerError::Internal(e.to_string()))
}
