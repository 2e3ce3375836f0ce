//! Inference module: the hosted image-to-3D service.
//!
//! This module provides the `InferenceClient` trait and a Gradio
//! implementation that drives a TRELLIS space over its HTTP API.
//!
//! # Example
//!
//! ```ignore
//! use relay3d_core::inference::{GradioClient, InferenceClient, RemoteCall};
//!
//! let client = GradioClient::new(InferenceConfig::new("https://eleelenawa-trellis.hf.space"))?;
//! let session = client.start_session().await?;
//!
//! let output = client
//!     .predict(&session, RemoteCall::preprocess_image(&image), Duration::from_secs(300))
//!     .await?;
//! println!("Preprocessed image at {:?}", output.first_path());
//! ```

mod error;
mod gradio;
mod traits;
mod types;

pub use error::InferenceError;
pub use gradio::GradioClient;
pub use traits::InferenceClient;
pub use types::{api, Param, RemoteCall, RemoteOutput, Session};
