use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

pub const CLIP_BYTES: &[u8] = b"stub-video-bytes";

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum JobBehavior {
    /// Report `in_progress` for `pending_polls` polls, then `completed`.
    Complete { pending_polls: u32 },
    /// Report `failed` on the first poll.
    Fail,
    /// Reject job creation with 401.
    Unauthorized,
}

/// Minimal stand-in for the `/v1/videos` API.
pub struct VideoApiStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl VideoApiStub {
    pub fn spawn(behavior: JobBehavior) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start video api stub");
        let base_url = format!("http://{}/v1", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let mut polls = 0u32;
            let mut next_id = 0u32;
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                let is_post = request.method() == &tiny_http::Method::Post;

                if is_post && path == "/v1/videos" {
                    let authorized = request.headers().iter().any(|h| {
                        h.field.equiv("Authorization") && h.value.as_str().starts_with("Bearer ")
                    });
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    if let Ok(value) = serde_json::from_str::<Value>(&body) {
                        recorded.lock().expect("lock requests").push(value);
                    }

                    if !authorized || matches!(behavior, JobBehavior::Unauthorized) {
                        respond_json(
                            request,
                            401,
                            serde_json::json!({ "error": { "message": "Incorrect API key provided" } }),
                        );
                        continue;
                    }
                    next_id += 1;
                    respond_json(
                        request,
                        200,
                        serde_json::json!({ "id": format!("video_{next_id}"), "status": "queued" }),
                    );
                    continue;
                }

                let Some(rest) = path.strip_prefix("/v1/videos/") else {
                    let _ = request
                        .respond(tiny_http::Response::from_string("not found").with_status_code(404));
                    continue;
                };

                if rest.ends_with("/content") {
                    let _ = request.respond(
                        tiny_http::Response::from_data(CLIP_BYTES.to_vec()).with_status_code(200),
                    );
                    continue;
                }

                let job_id = rest.to_owned();
                let body = match behavior {
                    JobBehavior::Fail => serde_json::json!({
                        "id": job_id,
                        "status": "failed",
                        "error": { "message": "content policy" }
                    }),
                    JobBehavior::Complete { pending_polls } if polls < pending_polls => {
                        polls += 1;
                        serde_json::json!({ "id": job_id, "status": "in_progress", "progress": 50 })
                    }
                    _ => serde_json::json!({ "id": job_id, "status": "completed", "progress": 100 }),
                };
                respond_json(request, 200, body);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Bodies of every job creation request received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("lock requests").clone()
    }
}

fn respond_json(request: tiny_http::Request, status: u16, body: Value) {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    let response = tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header);
    let _ = request.respond(response);
}

impl Drop for VideoApiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
