// Infrastructure layer - Provider SDKs, native codecs and configuration
pub mod cloud_adapter;
pub mod config;
pub mod in_memory_sdk;
pub mod normalization;
pub mod sdk;
