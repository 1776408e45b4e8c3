pub mod badge_service_errors;
pub mod grouping_errors;
pub mod identity_service_errors;
pub mod pick_pool_errors;
pub mod selector_errors;
pub mod sync_service_errors;
