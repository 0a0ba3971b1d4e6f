// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request pipeline: named layers applied to every outgoing request.

use crate::services::transport::ApiRequest;
use std::sync::Arc;

/// A named transformation of outgoing requests.
pub trait RequestLayer: Send + Sync {
    /// Unique name; a second layer with the same name is not installed.
    fn name(&self) -> &'static str;

    fn apply(&self, request: &mut ApiRequest);
}

/// Ordered set of request layers.
#[derive(Clone, Default)]
pub struct RequestPipeline {
    layers: Vec<Arc<dyn RequestLayer>>,
}

impl RequestPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline with the layers every backend request needs.
    pub fn standard(anon_key: &str) -> Self {
        let mut pipeline = Self::new();
        pipeline.install(ApiKeyLayer::new(anon_key));
        pipeline.install(ClientInfoLayer);
        pipeline.install(JsonAcceptLayer);
        pipeline
    }

    /// Install a layer. Returns false (and changes nothing) if a layer with
    /// the same name is already installed.
    pub fn install(&mut self, layer: impl RequestLayer + 'static) -> bool {
        if self.is_installed(layer.name()) {
            tracing::debug!(layer = layer.name(), "Request layer already installed");
            return false;
        }
        self.layers.push(Arc::new(layer));
        true
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l.name() == name)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn apply(&self, request: &mut ApiRequest) {
        for layer in &self.layers {
            layer.apply(request);
        }
    }
}

/// Adds the project `apikey` header.
pub struct ApiKeyLayer {
    key: String,
}

impl ApiKeyLayer {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl RequestLayer for ApiKeyLayer {
    fn name(&self) -> &'static str {
        "api-key"
    }

    fn apply(&self, request: &mut ApiRequest) {
        request.set_header("apikey", self.key.clone());
    }
}

/// Identifies this client to the backend.
pub struct ClientInfoLayer;

impl RequestLayer for ClientInfoLayer {
    fn name(&self) -> &'static str {
        "client-info"
    }

    fn apply(&self, request: &mut ApiRequest) {
        request.set_header(
            "X-Client-Info",
            concat!("wellness-client/", env!("CARGO_PKG_VERSION")),
        );
    }
}

/// Asks for JSON unless the request already chose an Accept type.
pub struct JsonAcceptLayer;

impl RequestLayer for JsonAcceptLayer {
    fn name(&self) -> &'static str {
        "json-accept"
    }

    fn apply(&self, request: &mut ApiRequest) {
        if request.header("Accept").is_none() {
            request.set_header("Accept", "application/json");
        }
    }
}
