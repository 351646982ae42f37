use actix_web::{HttpResponse, get, post, web};
use fleetwatch::Monitor;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::view::{ForcedView, StatusView};

/// Status of every monitored device, ordered by name
#[get("/devices")]
pub async fn list_devices(monitor: web::Data<Monitor>) -> HttpResponse {
    let statuses = monitor.statuses().await;
    let views: Vec<StatusView> = statuses.iter().map(StatusView::from).collect();
    HttpResponse::Ok().json(views)
}

#[get("/devices/{name}")]
pub async fn get_device(monitor: web::Data<Monitor>, name: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let status = monitor.status(&name).await?;
    Ok(HttpResponse::Ok().json(StatusView::from(&status)))
}

/// Run every checker against the device now, bypassing cached backend data
#[post("/devices/{name}/check")]
pub async fn force_check(monitor: web::Data<Monitor>, name: web::Path<String>) -> Result<HttpResponse, ApiError> {
    debug!(device = %name, "forced check requested");
    let results = monitor.force_check(&name).await?;
    Ok(HttpResponse::Ok().json(ForcedView::new(&name, &results)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::routes;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use fleetwatch::{CheckResult, Checker, Device, Event, MonitorConfig};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixed {
        passed: bool,
    }

    #[async_trait::async_trait]
    impl Checker for Fixed {
        async fn check(&self, device: &Arc<Device>, _force_recheck: bool) -> CheckResult {
            let result = CheckResult::new(Event::new(device.clone(), "online", "Online"));
            if self.passed { result } else { result.failure("lost 3 of 3 probes", "Offline") }
        }

        fn event_key(&self) -> &str {
            "online"
        }
    }

    async fn monitor(passed: bool) -> Monitor {
        let monitor = Monitor::new(MonitorConfig::default());
        monitor
            .register_checker("ping", Duration::from_secs(3600), Arc::new(Fixed { passed }))
            .await
            .unwrap();
        monitor.register_device(Device::new("ITB-1101-D1", "10.5.34.12").with_room("ITB-1101")).await.unwrap();
        monitor
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(App::new().configure(routes)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_unchecked_device_listed() {
        let app =
            test::init_service(App::new().app_data(web::Data::new(monitor(true).await)).configure(routes)).await;

        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/devices").to_request()).await;

        assert_eq!(body[0]["device"]["name"], "ITB-1101-D1");
        assert_eq!(body[0]["device"]["room"], "ITB-1101");
        assert_eq!(body[0]["healthy"], false);
        assert_eq!(body[0]["checks"], serde_json::json!({}));
    }

    #[actix_web::test]
    async fn test_unknown_device_is_404() {
        let app =
            test::init_service(App::new().app_data(web::Data::new(monitor(true).await)).configure(routes)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/devices/ITB-9999-D1").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "no device found with name ITB-9999-D1");

        let resp =
            test::call_service(&app, test::TestRequest::post().uri("/devices/ITB-9999-D1/check").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_force_check_updates_status() {
        let monitor = monitor(false).await;
        let app = test::init_service(App::new().app_data(web::Data::new(monitor.clone())).configure(routes)).await;

        let forced: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/devices/ITB-1101-D1/check").to_request(),
        )
        .await;

        assert_eq!(forced["device"], "ITB-1101-D1");
        assert_eq!(forced["passed"], false);
        assert_eq!(forced["checks"]["ping"]["value"], "Offline");

        // the forced result reaches the registry through the aggregation loop
        for _ in 0..100 {
            if !monitor.status("ITB-1101-D1").await.unwrap().check_status.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let status: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/devices/ITB-1101-D1").to_request(),
        )
        .await;

        assert_eq!(status["healthy"], false);
        assert_eq!(status["checks"]["ping"]["error"], "lost 3 of 3 probes");
    }
}
