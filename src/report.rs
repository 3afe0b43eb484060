use std::fmt;
use std::path::PathBuf;

use crate::advisor::Advice;
use crate::model::{
    DecisionOutcome, Degradation, ExecutionResult, ImageAsset, InferenceMode, Outcome, SkipReason,
};
use crate::plan::DroppedEntry;
use crate::verify::Verification;

/// An extracted image that did not make it into the output.
#[derive(Clone, Debug, PartialEq)]
pub struct Skip {
    pub asset: usize,
    pub reason: SkipReason,
}

/// Everything a run did, for printing and for tests.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub provider: String,
    pub mode: InferenceMode,
    pub degradation: Option<Degradation>,
    pub images_sent: usize,
    /// Images extracted from the source.
    pub requested: usize,
    pub applied: usize,
    pub skipped: usize,
    /// One entry per skipped image, in source order.
    pub skips: Vec<Skip>,
    /// Reply entries rejected while validating the plan.
    pub dropped: Vec<DroppedEntry>,
    pub outcomes: Vec<DecisionOutcome>,
    pub output_path: PathBuf,
    pub backup_path: PathBuf,
    /// Set when extracted images were kept on disk.
    pub temp_dir: Option<PathBuf>,
    pub verification: Verification,
}

impl RunSummary {
    pub fn new(
        assets: &[ImageAsset],
        advice: Advice,
        execution: ExecutionResult,
        verification: Verification,
        temp_dir: Option<PathBuf>,
    ) -> Self {
        let mut ordered: Vec<&ImageAsset> = assets.iter().collect();
        ordered.sort_by_key(|a| a.ordinal);

        let mut skips = Vec::new();
        for asset in ordered {
            let outcome = execution
                .outcomes
                .iter()
                .find(|o| o.decision.asset == asset.id)
                .map(|o| &o.outcome);
            let reason = match outcome {
                Some(Outcome::Applied) => continue,
                Some(Outcome::Skipped(reason)) => reason.clone(),
                None => match advice.dropped.iter().find(|d| d.asset == Some(asset.id)) {
                    Some(entry) => SkipReason::InvalidPlanReference(entry.error.to_string()),
                    None => SkipReason::Declined,
                },
            };
            skips.push(Skip {
                asset: asset.id,
                reason,
            });
        }

        let applied = execution.applied_count();
        RunSummary {
            provider: advice.provider,
            mode: advice.mode,
            degradation: advice.degradation,
            images_sent: advice.images_sent,
            requested: assets.len(),
            applied,
            skipped: assets.len().saturating_sub(applied),
            skips,
            dropped: advice.dropped,
            outcomes: execution.outcomes,
            output_path: execution.output_path,
            backup_path: execution.backup_path,
            temp_dir,
            verification,
        }
    }

    pub fn invalid_references(&self) -> impl Iterator<Item = &Skip> {
        self.skips
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::InvalidPlanReference(_)))
    }

    pub fn is_success(&self) -> bool {
        self.verification.is_ok()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_success() { "SUCCESS" } else { "COMPLETED WITH PROBLEMS" };
        writeln!(f, "Status:      {status}")?;
        writeln!(f, "Provider:    {} ({})", self.provider, self.mode)?;
        if self.mode == InferenceMode::Multimodal {
            writeln!(f, "Images sent: {}", self.images_sent)?;
        }
        if let Some(degradation) = &self.degradation {
            writeln!(f, "Degraded:    {degradation}")?;
        }
        writeln!(
            f,
            "Images:      {} requested, {} applied, {} skipped",
            self.requested, self.applied, self.skipped
        )?;
        for outcome in &self.outcomes {
            if outcome.outcome == Outcome::Applied {
                let d = &outcome.decision;
                writeln!(f, "  image {} {} node {}", d.asset, d.position, d.node)?;
            }
        }
        for skip in &self.skips {
            writeln!(f, "  image {} skipped: {}", skip.asset, skip.reason)?;
        }
        for entry in &self.dropped {
            writeln!(f, "  dropped {}: {}", entry.raw, entry.error)?;
        }
        writeln!(f, "Output:      {}", self.output_path.display())?;
        writeln!(f, "Backup:      {}", self.backup_path.display())?;
        if let Some(dir) = &self.temp_dir {
            writeln!(f, "Images kept: {}", dir.display())?;
        }
        write!(
            f,
            "Verified:    {}/{} images found",
            self.verification.found_images, self.verification.expected_images
        )?;
        for problem in &self.verification.problems {
            write!(f, "\n  {problem}")?;
        }
        Ok(())
    }
}
