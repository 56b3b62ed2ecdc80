pub mod candidates;
pub mod dispatch;
pub mod transitions;
