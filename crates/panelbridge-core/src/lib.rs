//! panelbridge-core: chat relay between a panel UI and generation providers.
//!
//! This crate contains the building blocks for routing a user prompt
//! (plus optional media attachment) to a provider and relaying the
//! response back to the panel:
//!
//! - [`config`] — Typed configuration loading from JSON
//! - [`catalog`] — Static model catalog and the provider/media enums
//! - [`media`] — Attachment parsing and validation
//! - [`provider`] — Adapter trait and the three provider implementations
//! - [`relay`] — Panel message types and the channel boundary
//! - [`dispatch`] — Per-request validation, routing, and relay
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use panelbridge_core::catalog::ModelCatalog;
//! use panelbridge_core::config::Config;
//! use panelbridge_core::dispatch::{AdapterSet, DispatchDefaults, Dispatcher};
//! use panelbridge_core::provider::host::{HostModelAdapter, UnavailableHostApi};
//! use panelbridge_core::provider::local::OllamaAdapter;
//! use panelbridge_core::provider::multimodal::GeminiAdapter;
//! use panelbridge_core::relay::stdio::StdioPanel;
//!
//! let config = Config::load().unwrap();
//! let client = reqwest::Client::new();
//!
//! let adapters = AdapterSet {
//!     local: Arc::new(OllamaAdapter::new(
//!         client.clone(),
//!         &config.providers.ollama.base_url,
//!     )),
//!     multimodal: Arc::new(GeminiAdapter::new(
//!         client.clone(),
//!         &config.providers.gemini.base_url,
//!         config.providers.gemini.api_key(),
//!     )),
//!     host: Arc::new(HostModelAdapter::new(
//!         Arc::new(UnavailableHostApi),
//!         config.providers.host.selector.clone(),
//!     )),
//! };
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(ModelCatalog::builtin()),
//!     adapters,
//!     Arc::new(StdioPanel::new()),
//!     DispatchDefaults::default(),
//! );
//! # let _ = dispatcher;
//! ```

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod media;
pub mod provider;
pub mod relay;
