pub mod hire_request;

pub use hire_request::{HireRequest, HireRequestEvent, UserProfile};
