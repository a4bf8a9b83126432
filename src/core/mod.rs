pub mod async_op;
pub mod call;
pub mod callback;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod handle;
pub mod registry;
