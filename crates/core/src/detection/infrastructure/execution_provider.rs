use std::path::Path;

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Build an inference session for a model file on the preferred providers.
///
/// Both face mesh models are small, so a single intra-op thread keeps the
/// per-frame latency predictable without competing with capture.
pub fn open_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    log::debug!("Loading ONNX model {}", model_path.display());
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(1)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Reads the `[N, C, H, W]` or `[N, H, W, C]` input shape of a session.
///
/// Returns `(size, channels_first)`; `None` when the shape is dynamic.
pub fn square_image_input(session: &ort::session::Session) -> Option<(u32, bool)> {
    let input = session.inputs().first()?;
    let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() else {
        return None;
    };
    if shape.len() != 4 {
        return None;
    }
    if shape[1] == 3 && shape[2] > 0 {
        Some((shape[2] as u32, true))
    } else if shape[3] == 3 && shape[1] > 0 {
        Some((shape[1] as u32, false))
    } else {
        None
    }
}
