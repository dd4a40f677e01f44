mod fixture_sandbox;

pub use fixture_sandbox::*;
