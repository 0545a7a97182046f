//! Publishing-target adapters. Each module implements `alert_core::ports::TargetPublisher`
//! for one target kind; the fan-out, circuit breaking and retry scheduling that sits in
//! front of them lives in `alert_core::publishing::PublishingManager`.

mod generic_webhook;
mod http;
mod pagerduty;
mod rootly;
mod slack;

pub use generic_webhook::GenericWebhookPublisher;
pub use pagerduty::PagerDutyPublisher;
pub use rootly::RootlyPublisher;
pub use slack::SlackPublisher;
