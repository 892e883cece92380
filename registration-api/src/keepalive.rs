use std::time::Duration;

use tracing::{debug, warn};

/// URL of the health endpoint under the service's public base URL.
pub fn health_url(base_url: &str) -> String {
    format!("{}/health", base_url.trim_end_matches('/'))
}

/// Periodically request our own health endpoint through the public URL, so the
/// hosting platform does not put the process to sleep between sign-ups.
/// Failures are logged and the loop keeps going.
pub async fn keepalive_loop(client: reqwest::Client, url: String, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately, the server is not listening yet.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
        {
            Ok(response) => debug!(url = %url, status = %response.status(), "keepalive ping"),
            Err(e) => warn!(url = %url, "keepalive ping failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{routing, Router};

    #[test]
    fn builds_health_url() {
        assert_eq!(
            health_url("https://registration.example.com"),
            "https://registration.example.com/health"
        );
        assert_eq!(
            health_url("https://registration.example.com/"),
            "https://registration.example.com/health"
        );
    }

    #[tokio::test]
    async fn pings_health_endpoint() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/health",
            routing::get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready("OK")
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let pinger = tokio::spawn(keepalive_loop(
            reqwest::Client::new(),
            health_url(&format!("http://{addr}")),
            Duration::from_millis(20),
        ));

        tokio::time::timeout(Duration::from_secs(5), async {
            while hits.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("health endpoint was not pinged");

        pinger.abort();
    }

    #[tokio::test]
    async fn survives_unreachable_target() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pinger = tokio::spawn(keepalive_loop(
            reqwest::Client::new(),
            health_url(&format!("http://{addr}")),
            Duration::from_millis(10),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!pinger.is_finished());
        pinger.abort();
    }
}
