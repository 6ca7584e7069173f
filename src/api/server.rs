use crate::api::routes;
use crate::binding_store::DynBindingStore;
use crate::config::Shared;
use axum::routing::IntoMakeService;
use axum::Router;
use hyper::server::conn::AddrIncoming;
use std::net::SocketAddr;

pub type APIServer = axum::Server<AddrIncoming, IntoMakeService<Router>>;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: Shared,
    pub store: DynBindingStore,
}

pub fn new(config: Shared, store: DynBindingStore, bind_addr: SocketAddr) -> APIServer {
    axum::Server::bind(&bind_addr).serve(routes::new(AppState { config, store }).into_make_service())
}
