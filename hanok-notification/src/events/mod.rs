pub mod dispatcher;
pub mod queries;
pub mod subscriber;
