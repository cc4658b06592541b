pub mod chat_delivery;
pub mod keyed_lock;
pub mod lifecycle_scheduler;
pub mod post_domain_service;
pub mod projection;
pub mod rating_aggregator;

pub use chat_delivery::ChatDeliveryService;
pub use keyed_lock::KeyedLocks;
pub use lifecycle_scheduler::{
    LifecycleConfig, LifecycleScheduler, OwnerReservation, RecoveryReport,
};
pub use post_domain_service::PostDomainService;
pub use projection::ProjectionService;
pub use rating_aggregator::RatingAggregator;
