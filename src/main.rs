use std::env;

use actix_identity::IdentityMiddleware;
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::Key;
use actix_web::{App, HttpServer, middleware, web};
use dotenvy::dotenv;
use pushkind_common::db::establish_connection_pool;
use pushkind_common::models::config::CommonServerConfig;

use pushkind_construction::AppConfig;
use pushkind_construction::dw::DwClient;
use pushkind_construction::repository::DieselRepository;
use pushkind_construction::routes::analytics::{
    customer_segmentation, ledger_revenue_forecast, revenue_forecast,
};
use pushkind_construction::routes::approval_flows::{
    create_approval_flow, delete_approval_flow, get_approval_flow, list_approval_flows,
    update_approval_flow,
};
use pushkind_construction::routes::approvals::{
    act_on_approval, approval_inbox, approval_stats, cancel_approval, expire_approvals,
    get_approval, list_approvals, request_approval,
};
use pushkind_construction::routes::customers::{create_customer, get_customer, list_customers};
use pushkind_construction::routes::ledgers::{
    adjust_ledger_budget, create_ledger, get_ledger, list_ledgers, reconcile_ledger,
};
use pushkind_construction::routes::orders::{
    create_order, delete_order, get_order, import_dw_costs, list_orders, order_alerts,
    pull_order_dw_costs, submit_order, sync_order_from_dw, sync_order_to_dw, update_order_status,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    dotenv().ok(); // Load .env file

    let database_url = env::var("DATABASE_URL").unwrap_or("app.db".to_string());
    let port = env::var("PORT").unwrap_or("8080".to_string());
    let port = port.parse::<u16>().unwrap_or(8080);
    let address = env::var("ADDRESS").unwrap_or("127.0.0.1".to_string());

    let secret = env::var("SECRET_KEY");
    let secret_key = match &secret {
        Ok(key) => Key::from(key.as_bytes()),
        Err(_) => Key::generate(),
    };

    let auth_service_url = env::var("AUTH_SERVICE_URL");
    let auth_service_url = match auth_service_url {
        Ok(auth_service_url) => auth_service_url,
        Err(_) => {
            log::error!("AUTH_SERVICE_URL environment variable not set");
            std::process::exit(1);
        }
    };

    let common_config = CommonServerConfig {
        secret: secret.unwrap_or_default(),
        auth_service_url,
    };

    let domain = env::var("DOMAIN").unwrap_or("localhost".to_string());

    let app_config = AppConfig::from_env();
    let dw_client = match app_config.dw.clone() {
        Some(dw_config) => match DwClient::new(dw_config) {
            Ok(client) => Some(client),
            Err(e) => {
                log::error!("Failed to build DW client: {e}");
                std::process::exit(1);
            }
        },
        None => {
            log::warn!("DW_API_ENDPOINT or DW_API_KEY not set, DW sync is disabled");
            None
        }
    };

    let pool = match establish_connection_pool(&database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };
    let repo = DieselRepository::new(pool);

    HttpServer::new(move || {
        App::new()
            .wrap(IdentityMiddleware::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_secure(false) // set to true in prod
                    .cookie_domain(Some(format!(".{domain}")))
                    .build(),
            )
            .wrap(middleware::Compress::default())
            .wrap(middleware::Logger::default())
            .service(
                web::scope("/api/v1")
                    .service(list_customers)
                    .service(create_customer)
                    .service(get_customer)
                    .service(list_ledgers)
                    .service(create_ledger)
                    .service(get_ledger)
                    .service(adjust_ledger_budget)
                    .service(reconcile_ledger)
                    // Literal order paths go before `/orders/{order_id}`.
                    .service(order_alerts)
                    .service(sync_order_from_dw)
                    .service(import_dw_costs)
                    .service(list_orders)
                    .service(create_order)
                    .service(get_order)
                    .service(update_order_status)
                    .service(delete_order)
                    .service(submit_order)
                    .service(sync_order_to_dw)
                    .service(pull_order_dw_costs)
                    .service(list_approval_flows)
                    .service(create_approval_flow)
                    .service(get_approval_flow)
                    .service(update_approval_flow)
                    .service(delete_approval_flow)
                    .service(approval_inbox)
                    .service(approval_stats)
                    .service(expire_approvals)
                    .service(list_approvals)
                    .service(request_approval)
                    .service(get_approval)
                    .service(act_on_approval)
                    .service(cancel_approval)
                    .service(ledger_revenue_forecast)
                    .service(revenue_forecast)
                    .service(customer_segmentation),
            )
            .app_data(web::Data::new(repo.clone()))
            .app_data(web::Data::new(common_config.clone()))
            .app_data(web::Data::new(app_config.clone()))
            .app_data(web::Data::new(dw_client.clone()))
    })
    .bind((address, port))?
    .run()
    .await
}
