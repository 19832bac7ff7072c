// Unified monitoring facade over AWS CloudWatch, Google Cloud Monitoring and Azure Monitor
pub mod application;
pub mod domain;
pub mod infrastructure;
