pub mod draft;
pub mod pricing_factor;
pub mod request;
