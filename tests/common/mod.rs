#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;

/// Request as seen by the fake service.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub blobs: HashMap<String, (Vec<u8>, String)>,
    pub rows: Vec<Value>,
    pub requests: Vec<SeenRequest>,
    pub fail_inserts: bool,
    next_id: u64,
}

/// Minimal Supabase storage + PostgREST stand-in on an ephemeral port.
pub struct FakeSupabase {
    pub base_url: String,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeSupabase {
    pub fn start() -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind fake supabase");
        let addr = server
            .server_addr()
            .to_ip()
            .expect("fake supabase listens on an ip address");
        let state = Arc::new(Mutex::new(FakeState::default()));

        let thread_state = state.clone();
        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                handle(request, &thread_state);
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn blob_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().unwrap().blobs.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.state.lock().unwrap().fail_inserts = fail;
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

fn json_header() -> Header {
    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap()
}

fn respond_json(request: Request, status: u16, body: Value) {
    let _ = request.respond(
        Response::from_string(body.to_string())
            .with_status_code(status)
            .with_header(json_header()),
    );
}

fn handle(mut request: Request, state: &Arc<Mutex<FakeState>>) {
    let url = Url::parse(&format!("http://fake{}", request.url())).unwrap();
    let segments: Vec<String> = url
        .path_segments()
        .map(|s| s.map(str::to_string).collect())
        .unwrap_or_default();
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .map(|h| (h.field.as_str().as_str().to_ascii_lowercase(), h.value.as_str().to_string()))
        .collect();
    let method = request.method().clone();

    let mut body = Vec::new();
    let _ = request.as_reader().read_to_end(&mut body);

    let mut st = state.lock().unwrap();
    st.requests.push(SeenRequest {
        method: method.to_string(),
        path: url.path().to_string(),
        headers: headers.clone(),
    });

    let parts: Vec<&str> = segments.iter().map(String::as_str).collect();
    match (&method, parts.as_slice()) {
        (Method::Get, ["storage", "v1", "object", "public", _bucket, key @ ..]) => {
            let key = key.join("/");
            match st.blobs.get(&key) {
                Some((bytes, content_type)) => {
                    let header =
                        Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap();
                    let _ = request.respond(Response::from_data(bytes.clone()).with_header(header));
                }
                None => {
                    drop(st);
                    respond_json(request, 404, json!({"error": "not_found", "message": "Object not found"}));
                }
            }
        }
        (Method::Post, ["storage", "v1", "object", bucket, key @ ..]) => {
            let key = key.join("/");
            if st.blobs.contains_key(&key) {
                drop(st);
                respond_json(
                    request,
                    409,
                    json!({"statusCode": "409", "error": "Duplicate", "message": "The resource already exists"}),
                );
                return;
            }
            let content_type = headers.get("content-type").cloned().unwrap_or_default();
            st.blobs.insert(key.clone(), (body, content_type));
            drop(st);
            respond_json(request, 200, json!({"Key": format!("{bucket}/{key}")}));
        }
        (Method::Post, ["rest", "v1", _table]) => {
            if st.fail_inserts {
                drop(st);
                respond_json(
                    request,
                    500,
                    json!({"code": "XX000", "message": "insert rejected by test"}),
                );
                return;
            }
            let mut row: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            st.next_id += 1;
            row["id"] = json!(st.next_id);
            if row.get("user_id").is_none() {
                row["user_id"] = Value::Null;
            }
            st.rows.push(row.clone());
            drop(st);
            respond_json(request, 201, json!([row]));
        }
        (Method::Get, ["rest", "v1", _table]) => {
            let mut rows: Vec<Value> = st
                .rows
                .iter()
                .filter(|row| matches_filter(row, "id", query.get("id")))
                .filter(|row| matches_filter(row, "user_id", query.get("user_id")))
                .cloned()
                .collect();
            if query.get("order").map(String::as_str) == Some("created_at.desc") {
                rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
            }
            if let Some(limit) = query.get("limit").and_then(|l| l.parse::<usize>().ok()) {
                rows.truncate(limit);
            }
            drop(st);
            respond_json(request, 200, Value::Array(rows));
        }
        _ => {
            drop(st);
            respond_json(request, 404, json!({"message": "no route"}));
        }
    }
}

fn matches_filter(row: &Value, column: &str, filter: Option<&String>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let expected = filter.strip_prefix("eq.").unwrap_or(filter);
    match &row[column] {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        _ => false,
    }
}

fn created_at(row: &Value) -> Option<DateTime<Utc>> {
    row["created_at"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Solid-colour PNG bytes.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, Rgba, RgbaImage};

    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, ColorType::Rgba8)
        .unwrap();
    bytes
}
