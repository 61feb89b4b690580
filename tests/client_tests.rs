mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bizdir::client::{
    AttemptOutcome, HttpSessionClient, Navigator, RefreshScheduler, SessionTransport,
    TransportError, Trigger,
};
use bizdir::{db::Database, start_server};
use common::*;
use url::Url;

/// Browser location stand-in.
struct Page {
    path: Mutex<String>,
    redirects: AtomicUsize,
}

impl Page {
    fn at(path: &str) -> Arc<Self> {
        Arc::new(Self {
            path: Mutex::new(path.to_string()),
            redirects: AtomicUsize::new(0),
        })
    }
}

impl Navigator for Page {
    fn current_path(&self) -> String {
        self.path.lock().unwrap().clone()
    }

    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        *self.path.lock().unwrap() = "/login".to_string();
    }
}

async fn live_server() -> (Url, tokio::task::JoinHandle<()>) {
    let db = Database::open(":memory:").await.unwrap();
    let (handle, addr) = start_server(test_config(db), 0).await.unwrap();
    let base = Url::parse(&format!("http://{}", addr)).unwrap();
    (base, handle)
}

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let (base, server) = live_server().await;
    let client = HttpSessionClient::new(base).unwrap();

    let session = client
        .signup("live@example.com", "long-enough-pw", "Live")
        .await
        .unwrap();
    assert_eq!(session.user.email, "live@example.com");

    let me = client.me().await.unwrap();
    assert_eq!(me.user.email, "live@example.com");

    client.refresh().await.unwrap();
    assert!(client.me().await.is_ok());

    client.logout().await.unwrap();
    assert_eq!(client.me().await.unwrap_err(), TransportError::Unauthorized);
    assert_eq!(client.refresh().await.unwrap_err(), TransportError::Unauthorized);

    let again = client
        .login("live@example.com", "long-enough-pw", true)
        .await
        .unwrap();
    assert_eq!(again.user.email, "live@example.com");
    assert!(client.me().await.is_ok());

    let wrong = client.login("live@example.com", "not-the-password", false).await;
    assert_eq!(wrong.unwrap_err(), TransportError::Unauthorized);

    server.abort();
}

#[tokio::test]
async fn test_scheduler_redirects_once_after_session_ends() {
    let (base, server) = live_server().await;
    let client = Arc::new(HttpSessionClient::new(base).unwrap());
    client
        .signup("sched@example.com", "long-enough-pw", "Sched")
        .await
        .unwrap();

    let page = Page::at("/account");
    let transport: Arc<dyn SessionTransport> = client.clone();
    let scheduler = RefreshScheduler::with_timing(
        transport,
        page.clone(),
        Duration::from_secs(600),
        Duration::ZERO,
    );

    assert_eq!(scheduler.on_trigger(Trigger::Mount).await, AttemptOutcome::Refreshed);
    assert_eq!(scheduler.on_trigger(Trigger::Focus).await, AttemptOutcome::Refreshed);

    client.logout().await.unwrap();

    assert_eq!(scheduler.on_trigger(Trigger::Visible).await, AttemptOutcome::Redirected);
    assert_eq!(page.redirects.load(Ordering::SeqCst), 1);
    assert_eq!(page.current_path(), "/login");

    // Back on a protected page, the scheduler stays retired.
    *page.path.lock().unwrap() = "/account".to_string();
    assert!(matches!(
        scheduler.on_trigger(Trigger::Interval).await,
        AttemptOutcome::Skipped(_)
    ));
    assert_eq!(page.redirects.load(Ordering::SeqCst), 1);

    server.abort();
}

#[tokio::test]
async fn test_scheduler_ignores_dead_session_on_public_page() {
    let (base, server) = live_server().await;
    let client: Arc<dyn SessionTransport> = Arc::new(HttpSessionClient::new(base).unwrap());
    let page = Page::at("/companies");
    let scheduler = RefreshScheduler::with_timing(
        client,
        page.clone(),
        Duration::from_secs(600),
        Duration::ZERO,
    );

    assert_eq!(
        scheduler.on_trigger(Trigger::Mount).await,
        AttemptOutcome::Ignored(TransportError::Unauthorized)
    );
    assert_eq!(page.redirects.load(Ordering::SeqCst), 0);

    server.abort();
}

#[tokio::test]
async fn test_unreachable_server_ends_session_on_protected_page() {
    // Bind and drop a listener to get a port nobody is serving.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = Url::parse(&format!("http://{}", addr)).unwrap();
    let client: Arc<dyn SessionTransport> = Arc::new(HttpSessionClient::new(base).unwrap());
    let page = Page::at("/my-listings");
    let scheduler = RefreshScheduler::new(client, page.clone());

    assert_eq!(scheduler.on_trigger(Trigger::Mount).await, AttemptOutcome::Redirected);
    assert_eq!(page.redirects.load(Ordering::SeqCst), 1);
}
