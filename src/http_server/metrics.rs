// ============================================================================
// PulmoScan - Prometheus Metrics
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::HttpResponse;

/// Process-wide request counters.
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_client_error: AtomicU64,
    pub requests_error: AtomicU64,

    /// Unix timestamp of server start
    pub start_time: u64,

    /// Total request duration, for the running average
    pub total_duration_ms: AtomicU64,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    pub fn init() -> &'static Metrics {
        METRICS.get_or_init(|| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();

            Metrics {
                requests_total: AtomicU64::new(0),
                requests_success: AtomicU64::new(0),
                requests_client_error: AtomicU64::new(0),
                requests_error: AtomicU64::new(0),
                start_time: now,
                total_duration_ms: AtomicU64::new(0),
            }
        })
    }

    pub fn get() -> &'static Metrics {
        Self::init()
    }

    pub fn record_request(status: u16, duration_ms: u64) {
        let m = Self::get();
        m.requests_total.fetch_add(1, Ordering::Relaxed);
        m.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);

        match status {
            200..=399 => m.requests_success.fetch_add(1, Ordering::Relaxed),
            400..=499 => m.requests_client_error.fetch_add(1, Ordering::Relaxed),
            _ => m.requests_error.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn uptime_seconds(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now.saturating_sub(self.start_time)
    }

    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.requests_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_duration_ms.load(Ordering::Relaxed) as f64 / total as f64
    }
}

/// Middleware recording status and duration of every request.
pub async fn record(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let start = Instant::now();
    let res = next.call(req).await?;
    Metrics::record_request(
        res.status().as_u16(),
        start.elapsed().as_millis() as u64,
    );
    Ok(res)
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler() -> HttpResponse {
    let m = Metrics::get();

    let mut output = String::new();

    output.push_str("# HELP pulmoscan_requests_total Total number of HTTP requests\n");
    output.push_str("# TYPE pulmoscan_requests_total counter\n");
    output.push_str(&format!(
        "pulmoscan_requests_total {}\n",
        m.requests_total.load(Ordering::Relaxed)
    ));

    output.push_str("# HELP pulmoscan_requests_success_total Successful requests\n");
    output.push_str("# TYPE pulmoscan_requests_success_total counter\n");
    output.push_str(&format!(
        "pulmoscan_requests_success_total {}\n",
        m.requests_success.load(Ordering::Relaxed)
    ));

    output.push_str("# HELP pulmoscan_requests_client_error_total Rejected requests (4xx)\n");
    output.push_str("# TYPE pulmoscan_requests_client_error_total counter\n");
    output.push_str(&format!(
        "pulmoscan_requests_client_error_total {}\n",
        m.requests_client_error.load(Ordering::Relaxed)
    ));

    output.push_str("# HELP pulmoscan_requests_error_total Failed requests (5xx)\n");
    output.push_str("# TYPE pulmoscan_requests_error_total counter\n");
    output.push_str(&format!(
        "pulmoscan_requests_error_total {}\n",
        m.requests_error.load(Ordering::Relaxed)
    ));

    output.push_str(
        "# HELP pulmoscan_request_duration_avg_ms Average request duration in milliseconds\n",
    );
    output.push_str("# TYPE pulmoscan_request_duration_avg_ms gauge\n");
    output.push_str(&format!(
        "pulmoscan_request_duration_avg_ms {:.2}\n",
        m.avg_duration_ms()
    ));

    output.push_str("# HELP pulmoscan_uptime_seconds Server uptime in seconds\n");
    output.push_str("# TYPE pulmoscan_uptime_seconds gauge\n");
    output.push_str(&format!("pulmoscan_uptime_seconds {}\n", m.uptime_seconds()));

    output.push_str("# HELP pulmoscan_info Application info\n");
    output.push_str("# TYPE pulmoscan_info gauge\n");
    output.push_str(&format!(
        "pulmoscan_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    ));

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_hit_the_right_counter() {
        let before_success = Metrics::get().requests_success.load(Ordering::Relaxed);
        let before_client = Metrics::get().requests_client_error.load(Ordering::Relaxed);
        let before_error = Metrics::get().requests_error.load(Ordering::Relaxed);

        Metrics::record_request(200, 5);
        Metrics::record_request(400, 5);
        Metrics::record_request(500, 5);

        let m = Metrics::get();
        assert_eq!(m.requests_success.load(Ordering::Relaxed), before_success + 1);
        assert_eq!(m.requests_client_error.load(Ordering::Relaxed), before_client + 1);
        assert_eq!(m.requests_error.load(Ordering::Relaxed), before_error + 1);
    }
}
