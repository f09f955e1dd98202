// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VizError {
    /// The renderer sink failed while drawing a frame on the calling thread.
    #[error("Render failed: {0}")]
    Render(String),

    /// The delivery thread stopped because the renderer sink failed.
    #[error("Frame delivery stopped: {0}")]
    DeliveryFailed(String),

    #[error("Failed to spawn delivery thread: {0}")]
    Spawn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VizError {
    pub fn render(msg: impl Into<String>) -> Self {
        VizError::Render(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, VizError>;
