pub mod paths;
pub mod redact;
pub mod sandbox;
pub mod suggest;
pub mod text;
