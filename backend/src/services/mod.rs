pub mod upstream;

pub use upstream::{ForwardHeaders, Upstream, UpstreamBody, UpstreamClient, UpstreamRequest};
