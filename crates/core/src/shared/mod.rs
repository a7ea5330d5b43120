pub mod constants;
pub mod frame;
pub mod math;
pub mod model_resolver;
pub mod region;
pub mod settings;
pub mod threshold;
