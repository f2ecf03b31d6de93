// Requests
pub mod task_form;
pub mod login_request;
pub mod register_request;

// Responses
pub mod task_response;
pub mod user_response;
