pub mod api;
pub mod discovery;
pub mod model;
pub mod normalize;
pub mod sensor;
pub mod settings;

pub use api::Error;
