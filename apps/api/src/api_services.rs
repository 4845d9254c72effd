mod database;
mod sessions;
pub(crate) mod state_builder;

pub use database::connect_and_migrate;
pub use sessions::build_postgres_session_layer;
pub use state_builder::build_app_state;
