pub mod home_controller;
pub mod users_controller;
pub mod requests_controller;
