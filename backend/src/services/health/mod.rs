use actix_web::{HttpResponse, Responder};
use cms_common::responses::HealthResponse;

/// Liveness probe. Does not touch the repository.
pub async fn process() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::configure_routes;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn reports_ok() {
        let app = test::init_service(App::new().service(configure_routes())).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, HealthResponse::ok());
    }
}
