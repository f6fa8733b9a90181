use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub const ALLOWED_TITLES: &[&str] = &[
    "Get Started with Cloud Storage",
    "Get Started with Pub/Sub",
    "Prompt Design in Vertex AI",
    "Monitoring in Google Cloud",
];

/// Serves fake public profiles.
///
/// `/alice` shows `alice_badges` allow-listed badges plus one unrelated
/// badge; `/bob` and anything unknown is a 404.
pub struct ProfileStub {
    pub base_url: String,
    alice_badges: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProfileStub {
    pub fn spawn(alice_badges: usize) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start profile stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let alice = Arc::new(AtomicUsize::new(alice_badges));
        let requests = Arc::new(AtomicUsize::new(0));
        let alice_for_server = Arc::clone(&alice);
        let requests_for_server = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                requests_for_server.fetch_add(1, Ordering::SeqCst);

                let (status, body) = match request.url() {
                    "/alice" => (
                        200,
                        profile_page(alice_for_server.load(Ordering::SeqCst)),
                    ),
                    _ => (404, "not found".to_string()),
                };

                let mut response = tiny_http::Response::from_string(body).with_status_code(status);
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"text/html; charset=utf-8"[..],
                )
                .expect("build header");
                response.add_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            alice_badges: alice,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[allow(dead_code)]
    pub fn set_alice_badges(&self, count: usize) {
        self.alice_badges.store(count, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for ProfileStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn profile_page(badges: usize) -> String {
    let mut cards = String::new();
    for title in ALLOWED_TITLES.iter().cycle().take(badges) {
        cards.push_str(&format!(
            r#"<div class="profile-badge">
  <a class="badge-image" href="/public_profiles/badges/1"><img alt="{title}" src="/badge.png"></a>
  <span class="ql-body-2 l-mts">
    {title}
  </span>
  <span class="ql-body-2 l-mbs">Earned Mar 3, 2025 EST</span>
</div>
"#
        ));
    }
    cards.push_str(
        r#"<div class="profile-badge"><span class="ql-body-2">Level 1: Some Other Program</span></div>"#,
    );
    format!(
        "<!doctype html><html><head><title>Profile</title></head><body><div class=\"profile-badges\">{cards}</div></body></html>"
    )
}

/// Writes a roster with the default header labels.
pub fn write_roster(path: &std::path::Path, rows: &[(&str, String)]) {
    let mut out = String::from("User Name,Google Cloud Skills Boost Profile URL\n");
    for (name, url) in rows {
        out.push_str(&format!("{name},{url}\n"));
    }
    std::fs::write(path, out).expect("write roster");
}
