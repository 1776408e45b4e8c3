pub mod badge_service;
pub mod errors;
pub mod grouping;
pub mod identity_service;
pub mod pick_pool;
pub mod selector;
pub mod sync_service;
