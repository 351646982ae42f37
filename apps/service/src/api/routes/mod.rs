mod devices;
mod health;

use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route)
        .service(devices::list_devices)
        .service(devices::get_device)
        .service(devices::force_check);
}
