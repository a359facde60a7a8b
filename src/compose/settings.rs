use crate::{
    engine::api::{DiagnosticLevel, MergeMode, PipelineConfig, SingleImageStrategy, Strategy},
    foundation::error::{CompositeError, CompositeResult},
};

/// Context-wide configuration applied at `setup` and on every composite call.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositeSettings {
    /// Engine diagnostic verbosity, set once per session.
    pub diagnostics: DiagnosticLevel,
    pub strategy: Strategy,
    pub single_image_strategy: SingleImageStrategy,
    /// Straight RGBA in `[0, 1]`.
    pub background: [f32; 4],
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self {
            diagnostics: DiagnosticLevel::default(),
            strategy: Strategy::Sequential,
            single_image_strategy: SingleImageStrategy::RadixK,
            background: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl CompositeSettings {
    pub fn from_json_str(s: &str) -> CompositeResult<Self> {
        let settings: Self = serde_json::from_str(s)
            .map_err(|e| CompositeError::validation(format!("invalid settings JSON: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> CompositeResult<()> {
        if self.background.iter().any(|c| !c.is_finite()) {
            return Err(CompositeError::validation(
                "background color components must be finite",
            ));
        }
        Ok(())
    }

    pub(crate) fn pipeline(&self, mode: MergeMode) -> PipelineConfig {
        PipelineConfig {
            mode,
            ordered: mode == MergeMode::Blend,
            strategy: self.strategy,
            single_image_strategy: self.single_image_strategy,
            background: self.background,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/settings.rs"]
mod tests;
