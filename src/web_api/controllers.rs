pub mod account_controller;
pub mod api_controller;
pub mod task_controller;
