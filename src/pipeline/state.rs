// src/pipeline/state.rs
//! Campaign pipeline state machine.
//!
//! [`PipelineState::apply`] is the only way state changes. It performs no
//! IO: every external call is returned as an [`Effect`] and its completion
//! comes back later as another [`Action`], tagged with the epoch (one per
//! submission) and, for video work, the attempt it belongs to. Completions
//! that no longer match the current epoch or attempt are dropped.

use crate::errors::CampaignError;
use crate::models::*;
use crate::services::credentials::CredentialOutcome;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PREVIEW_FAILED_MESSAGE: &str =
    "Failed to generate preview. Ensure a paid-tier credential is selected.";
pub const FINAL_FAILED_MESSAGE: &str = "Failed to generate final video.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Input,
    Analyzing,
    Selection,
    AwaitingCredential,
    Animating,
    Previewing,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoPhase {
    Idle,
    /// Credential lookup in flight; still shown as Selection.
    CheckingCredential {
        attempt: u64,
    },
    AwaitingCredential {
        attempt: u64,
    },
    Animating {
        attempt: u64,
        tier: QualityTier,
        /// Preview kept while the final render runs.
        preview: Option<VideoArtifact>,
    },
    Previewing {
        preview: VideoArtifact,
    },
    Completed {
        final_video: VideoArtifact,
    },
}

/// Everything that exists once analysis has succeeded.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub brief: Arc<CampaignBrief>,
    pub analysis: Arc<CreativeAnalysis>,
    pub slots: Vec<ImageSlot>,
    pub selected: Option<SlotId>,
    pub video: VideoPhase,
}

impl Campaign {
    fn selected_image(&self) -> Option<&ImageData> {
        let id = self.selected?;
        self.slots.iter().find(|s| s.id == id)?.image()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Phase {
    #[default]
    Input,
    Analyzing {
        brief: Arc<CampaignBrief>,
    },
    Active(Box<Campaign>),
}

#[derive(Debug)]
pub enum Action {
    Submit(CampaignBrief),
    AnalysisFinished {
        epoch: u64,
        result: Result<CreativeAnalysis, CampaignError>,
    },
    ImageFinished {
        epoch: u64,
        style_name: String,
        result: Result<ImageData, CampaignError>,
    },
    SelectImage(SlotId),
    RequestPreview,
    CredentialMissing {
        epoch: u64,
        attempt: u64,
    },
    CredentialResolved {
        epoch: u64,
        attempt: u64,
        result: Result<CredentialOutcome, CampaignError>,
    },
    ConfirmFinal,
    VideoFinished {
        epoch: u64,
        attempt: u64,
        result: Result<VideoArtifact, CampaignError>,
    },
    DiscardPreview,
    Reset,
    DismissError,
}

#[derive(Debug, Clone)]
pub enum Effect {
    Analyze {
        epoch: u64,
        brief: Arc<CampaignBrief>,
    },
    SynthesizeImage {
        epoch: u64,
        prompt: StylePrompt,
        brief: Arc<CampaignBrief>,
    },
    AcquireCredential {
        epoch: u64,
        attempt: u64,
    },
    SynthesizeVideo {
        epoch: u64,
        attempt: u64,
        tier: QualityTier,
        image: ImageData,
        brief: Arc<CampaignBrief>,
    },
    ReleaseMedia(MediaHandle),
}

#[derive(Debug)]
pub struct Transition {
    pub effects: Vec<Effect>,
    /// Set when the action was rejected by a guard; state is unchanged.
    pub ignored: Option<&'static str>,
}

impl Transition {
    fn applied(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            ignored: None,
        }
    }

    fn ignored(reason: &'static str) -> Self {
        Self {
            effects: Vec::new(),
            ignored: Some(reason),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.ignored.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    epoch: u64,
    next_attempt: u64,
    phase: Phase,
    error: Option<String>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn campaign(&self) -> Option<&Campaign> {
        match &self.phase {
            Phase::Active(campaign) => Some(&**campaign),
            _ => None,
        }
    }

    pub fn stage(&self) -> Stage {
        match &self.phase {
            Phase::Input => Stage::Input,
            Phase::Analyzing { .. } => Stage::Analyzing,
            Phase::Active(campaign) => match campaign.video {
                VideoPhase::Idle | VideoPhase::CheckingCredential { .. } => Stage::Selection,
                VideoPhase::AwaitingCredential { .. } => Stage::AwaitingCredential,
                VideoPhase::Animating { .. } => Stage::Animating,
                VideoPhase::Previewing { .. } => Stage::Previewing,
                VideoPhase::Completed { .. } => Stage::Completed,
            },
        }
    }

    pub fn apply(&mut self, action: Action) -> Transition {
        match action {
            Action::Submit(brief) => self.submit(brief),
            Action::AnalysisFinished { epoch, result } => self.analysis_finished(epoch, result),
            Action::ImageFinished {
                epoch,
                style_name,
                result,
            } => self.image_finished(epoch, &style_name, result),
            Action::SelectImage(id) => self.select_image(id),
            Action::RequestPreview => self.request_preview(),
            Action::CredentialMissing { epoch, attempt } => self.credential_missing(epoch, attempt),
            Action::CredentialResolved {
                epoch,
                attempt,
                result,
            } => self.credential_resolved(epoch, attempt, result),
            Action::ConfirmFinal => self.confirm_final(),
            Action::VideoFinished {
                epoch,
                attempt,
                result,
            } => self.video_finished(epoch, attempt, result),
            Action::DiscardPreview => self.discard_preview(),
            Action::Reset => self.reset(),
            Action::DismissError => {
                self.error = None;
                Transition::applied(Vec::new())
            }
        }
    }

    fn active_mut(&mut self, epoch: u64) -> Option<&mut Campaign> {
        if epoch != self.epoch {
            return None;
        }
        match &mut self.phase {
            Phase::Active(campaign) => Some(&mut **campaign),
            _ => None,
        }
    }

    fn submit(&mut self, brief: CampaignBrief) -> Transition {
        if !matches!(self.phase, Phase::Input) {
            return Transition::ignored("a campaign is already in progress");
        }
        if let Err(e) = brief.validate() {
            self.error = Some(e.to_string());
            return Transition::ignored("brief failed validation");
        }

        self.epoch += 1;
        self.error = None;
        let brief = Arc::new(brief);
        self.phase = Phase::Analyzing {
            brief: brief.clone(),
        };

        info!("Campaign {} submitted (epoch {})", brief.id, self.epoch);
        Transition::applied(vec![Effect::Analyze {
            epoch: self.epoch,
            brief,
        }])
    }

    fn analysis_finished(
        &mut self,
        epoch: u64,
        result: Result<CreativeAnalysis, CampaignError>,
    ) -> Transition {
        if epoch != self.epoch {
            return Transition::ignored("stale analysis result");
        }
        let brief = match &self.phase {
            Phase::Analyzing { brief } => brief.clone(),
            _ => return Transition::ignored("not analyzing"),
        };

        let analysis = match result {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Analysis failed: {}", e);
                self.error = Some(e.to_string());
                self.phase = Phase::Input;
                return Transition::applied(Vec::new());
            }
        };

        let slots: Vec<ImageSlot> = analysis
            .prompts
            .iter()
            .enumerate()
            .map(|(i, prompt)| ImageSlot::pending(SlotId(i), prompt))
            .collect();

        let effects = analysis
            .prompts
            .iter()
            .map(|prompt| Effect::SynthesizeImage {
                epoch,
                prompt: prompt.clone(),
                brief: brief.clone(),
            })
            .collect();

        self.phase = Phase::Active(Box::new(Campaign {
            brief,
            analysis: Arc::new(analysis),
            slots,
            selected: None,
            video: VideoPhase::Idle,
        }));

        Transition::applied(effects)
    }

    /// Merge one image result into every pending slot with that style name.
    /// The first result for a slot wins, so delivery order and duplicate
    /// deliveries do not change the outcome.
    fn image_finished(
        &mut self,
        epoch: u64,
        style_name: &str,
        result: Result<ImageData, CampaignError>,
    ) -> Transition {
        let Some(campaign) = self.active_mut(epoch) else {
            return Transition::ignored("stale image result");
        };

        let mut matched = false;
        let mut updated = 0;
        for slot in campaign
            .slots
            .iter_mut()
            .filter(|s| s.style_name == style_name)
        {
            matched = true;
            if slot.state != SlotState::Pending {
                continue;
            }
            slot.state = match &result {
                Ok(image) => SlotState::Ready(image.clone()),
                Err(e) => SlotState::Failed {
                    reason: e.to_string(),
                },
            };
            updated += 1;
        }

        if !matched {
            return Transition::ignored("no slot for style");
        }
        if updated == 0 {
            return Transition::ignored("slot already resolved");
        }

        match &result {
            Ok(_) => info!("Image ready for {}", style_name),
            Err(e) => warn!("Image failed for {}: {}", style_name, e),
        }
        if updated > 1 {
            warn!(
                "Style name {} is shared by {} slots; updated all of them",
                style_name, updated
            );
        }
        Transition::applied(Vec::new())
    }

    fn select_image(&mut self, id: SlotId) -> Transition {
        let Phase::Active(campaign) = &mut self.phase else {
            return Transition::ignored("no images to select");
        };
        if campaign.video != VideoPhase::Idle {
            return Transition::ignored("selection is locked while video work is in progress");
        }
        match campaign.slots.iter().find(|s| s.id == id) {
            Some(slot) if slot.status() == SlotStatus::Ready => {
                campaign.selected = Some(id);
                Transition::applied(Vec::new())
            }
            Some(_) => Transition::ignored("image is not ready"),
            None => Transition::ignored("unknown image"),
        }
    }

    fn request_preview(&mut self) -> Transition {
        let epoch = self.epoch;
        let Phase::Active(campaign) = &mut self.phase else {
            return Transition::ignored("no campaign to animate");
        };
        if campaign.video != VideoPhase::Idle {
            return Transition::ignored("video generation already in progress");
        }
        if campaign.selected_image().is_none() {
            return Transition::ignored("no image selected");
        }

        self.next_attempt += 1;
        let attempt = self.next_attempt;
        campaign.video = VideoPhase::CheckingCredential { attempt };
        self.error = None;

        Transition::applied(vec![Effect::AcquireCredential { epoch, attempt }])
    }

    fn credential_missing(&mut self, epoch: u64, attempt: u64) -> Transition {
        let Some(campaign) = self.active_mut(epoch) else {
            return Transition::ignored("stale credential check");
        };
        if campaign.video != (VideoPhase::CheckingCredential { attempt }) {
            return Transition::ignored("stale credential check");
        }
        campaign.video = VideoPhase::AwaitingCredential { attempt };
        Transition::applied(Vec::new())
    }

    fn credential_resolved(
        &mut self,
        epoch: u64,
        attempt: u64,
        result: Result<CredentialOutcome, CampaignError>,
    ) -> Transition {
        let Some(campaign) = self.active_mut(epoch) else {
            return Transition::ignored("stale credential result");
        };
        match campaign.video {
            VideoPhase::CheckingCredential { attempt: a }
            | VideoPhase::AwaitingCredential { attempt: a }
                if a == attempt => {}
            _ => return Transition::ignored("stale credential result"),
        }

        match result {
            Ok(CredentialOutcome::Selected) => {
                let Some(image) = campaign.selected_image().cloned() else {
                    campaign.video = VideoPhase::Idle;
                    return Transition::applied(Vec::new());
                };
                campaign.video = VideoPhase::Animating {
                    attempt,
                    tier: QualityTier::Preview,
                    preview: None,
                };
                let brief = campaign.brief.clone();
                Transition::applied(vec![Effect::SynthesizeVideo {
                    epoch,
                    attempt,
                    tier: QualityTier::Preview,
                    image,
                    brief,
                }])
            }
            Ok(CredentialOutcome::Cancelled) => {
                info!("Credential selection cancelled");
                campaign.video = VideoPhase::Idle;
                Transition::applied(Vec::new())
            }
            Err(e) => {
                warn!("Credential gate failed: {}", e);
                campaign.video = VideoPhase::Idle;
                self.error = Some(e.to_string());
                Transition::applied(Vec::new())
            }
        }
    }

    fn confirm_final(&mut self) -> Transition {
        let epoch = self.epoch;
        let Phase::Active(campaign) = &mut self.phase else {
            return Transition::ignored("no preview to confirm");
        };
        let Some(image) = campaign.selected_image().cloned() else {
            return Transition::ignored("no image selected");
        };
        let preview = match std::mem::replace(&mut campaign.video, VideoPhase::Idle) {
            VideoPhase::Previewing { preview } => preview,
            other => {
                campaign.video = other;
                return Transition::ignored("no preview to confirm");
            }
        };

        self.next_attempt += 1;
        let attempt = self.next_attempt;
        campaign.video = VideoPhase::Animating {
            attempt,
            tier: QualityTier::Final,
            preview: Some(preview),
        };
        self.error = None;

        Transition::applied(vec![Effect::SynthesizeVideo {
            epoch,
            attempt,
            tier: QualityTier::Final,
            image,
            brief: campaign.brief.clone(),
        }])
    }

    fn video_finished(
        &mut self,
        epoch: u64,
        attempt: u64,
        result: Result<VideoArtifact, CampaignError>,
    ) -> Transition {
        if epoch != self.epoch {
            return Self::stale_video(attempt, result);
        }
        let Phase::Active(campaign) = &mut self.phase else {
            return Self::stale_video(attempt, result);
        };
        let (tier, preview) = match std::mem::replace(&mut campaign.video, VideoPhase::Idle) {
            VideoPhase::Animating {
                attempt: current,
                tier,
                preview,
            } if current == attempt => (tier, preview),
            other => {
                campaign.video = other;
                return Self::stale_video(attempt, result);
            }
        };

        let mut effects = Vec::new();
        match (tier, result) {
            (QualityTier::Preview, Ok(artifact)) => {
                info!("Preview video ready: {}", artifact.handle);
                campaign.video = VideoPhase::Previewing { preview: artifact };
            }
            (QualityTier::Preview, Err(e)) => {
                warn!("Preview video failed: {}", e);
                self.error = Some(PREVIEW_FAILED_MESSAGE.to_string());
            }
            (QualityTier::Final, Ok(artifact)) => {
                info!("Final video ready: {}", artifact.handle);
                if let Some(preview) = preview {
                    effects.push(Effect::ReleaseMedia(preview.handle));
                }
                campaign.video = VideoPhase::Completed {
                    final_video: artifact,
                };
            }
            (QualityTier::Final, Err(e)) => {
                warn!("Final video failed: {}", e);
                self.error = Some(FINAL_FAILED_MESSAGE.to_string());
                if let Some(preview) = preview {
                    campaign.video = VideoPhase::Previewing { preview };
                }
            }
        }

        Transition::applied(effects)
    }

    /// A finished video nobody is waiting for still owns stored media.
    fn stale_video(attempt: u64, result: Result<VideoArtifact, CampaignError>) -> Transition {
        debug!("Dropping stale video result for attempt {}", attempt);
        let mut transition = Transition::ignored("stale video result");
        if let Ok(artifact) = result {
            transition.effects.push(Effect::ReleaseMedia(artifact.handle));
        }
        transition
    }

    fn discard_preview(&mut self) -> Transition {
        let Phase::Active(campaign) = &mut self.phase else {
            return Transition::ignored("no preview to discard");
        };
        match std::mem::replace(&mut campaign.video, VideoPhase::Idle) {
            VideoPhase::Previewing { preview } => {
                Transition::applied(vec![Effect::ReleaseMedia(preview.handle)])
            }
            other => {
                campaign.video = other;
                Transition::ignored("no preview to discard")
            }
        }
    }

    fn reset(&mut self) -> Transition {
        let mut effects = Vec::new();
        if let Phase::Active(campaign) = &self.phase {
            let held = match &campaign.video {
                VideoPhase::Animating { preview, .. } => preview.as_ref(),
                VideoPhase::Previewing { preview } => Some(preview),
                VideoPhase::Completed { final_video } => Some(final_video),
                _ => None,
            };
            effects.extend(held.map(|artifact| Effect::ReleaseMedia(artifact.handle)));
        }

        *self = PipelineState {
            epoch: self.epoch + 1,
            next_attempt: self.next_attempt,
            ..PipelineState::default()
        };
        info!("Pipeline reset (epoch {})", self.epoch);
        Transition::applied(effects)
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        let mut snapshot = PipelineSnapshot {
            stage: self.stage(),
            error: self.error.clone(),
            ..PipelineSnapshot::default()
        };

        match &self.phase {
            Phase::Input => {}
            Phase::Analyzing { brief } => snapshot.brief = Some(brief.summary()),
            Phase::Active(campaign) => {
                snapshot.brief = Some(campaign.brief.summary());
                snapshot.analysis = Some(campaign.analysis.as_ref().clone());
                snapshot.slots = campaign.slots.iter().map(ImageSlot::view).collect();
                snapshot.selected = campaign.selected;
                match &campaign.video {
                    VideoPhase::Animating { preview, .. } => snapshot.preview = preview.clone(),
                    VideoPhase::Previewing { preview } => snapshot.preview = Some(preview.clone()),
                    VideoPhase::Completed { final_video } => {
                        snapshot.final_video = Some(final_video.clone())
                    }
                    _ => {}
                }
            }
        }

        snapshot
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PipelineSnapshot {
    pub stage: Stage,
    pub error: Option<String>,
    pub brief: Option<BriefSummary>,
    pub analysis: Option<CreativeAnalysis>,
    pub slots: Vec<ImageSlotView>,
    pub selected: Option<SlotId>,
    pub preview: Option<VideoArtifact>,
    pub final_video: Option<VideoArtifact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: [&str; 6] = ["Surreal", "Futurist", "Cinematic", "Clean", "Abstract", "Symbolic"];

    fn brief() -> CampaignBrief {
        CampaignBrief::new(
            "Cold brew coffee in a matte black can",
            ImageData::new("image/png", vec![0x89, 0x50]),
            StyleSetId::CinematicAd,
            AspectRatio::Portrait,
            CameraMovement::Orbit,
        )
    }

    fn analysis(names: &[&str]) -> CreativeAnalysis {
        CreativeAnalysis {
            category: "Beverage".to_string(),
            audience: "Commuters".to_string(),
            emotion: "Energy".to_string(),
            marketing_copy: MarketingCopy {
                instagram_caption: "ig".to_string(),
                linkedin_post: "li".to_string(),
                tiktok_hook: "tt".to_string(),
                hashtags: vec!["coldbrew".to_string()],
                one_liner: "Stay cold".to_string(),
            },
            prompts: names
                .iter()
                .map(|n| StylePrompt {
                    style_name: n.to_string(),
                    prompt_text: format!("{} scene", n),
                    marketing_hook: format!("{} hook", n),
                })
                .collect(),
        }
    }

    fn image(tag: u8) -> ImageData {
        ImageData::new("image/png", vec![tag])
    }

    fn artifact(tier: QualityTier) -> VideoArtifact {
        VideoArtifact::new(MediaHandle::new(), "video/mp4", tier)
    }

    fn in_selection() -> PipelineState {
        let mut state = PipelineState::new();
        state.apply(Action::Submit(brief()));
        let epoch = state.epoch();
        state.apply(Action::AnalysisFinished {
            epoch,
            result: Ok(analysis(&STYLES)),
        });
        state
    }

    fn finish_image(state: &mut PipelineState, name: &str, ok: bool) -> Transition {
        let epoch = state.epoch();
        state.apply(Action::ImageFinished {
            epoch,
            style_name: name.to_string(),
            result: if ok {
                Ok(image(name.len() as u8))
            } else {
                Err(CampaignError::ImageSynthesis(format!("{}: no image generated", name)))
            },
        })
    }

    fn with_selection() -> PipelineState {
        let mut state = in_selection();
        finish_image(&mut state, "Clean", true);
        assert!(state.apply(Action::SelectImage(SlotId(3))).is_applied());
        state
    }

    /// Returns the attempt id of the preview job.
    fn start_preview(state: &mut PipelineState) -> u64 {
        let transition = state.apply(Action::RequestPreview);
        let Some(Effect::AcquireCredential { attempt, .. }) = transition.effects.first() else {
            panic!("expected a credential check");
        };
        let attempt = *attempt;
        let epoch = state.epoch();
        state.apply(Action::CredentialResolved {
            epoch,
            attempt,
            result: Ok(CredentialOutcome::Selected),
        });
        attempt
    }

    fn in_previewing() -> (PipelineState, VideoArtifact) {
        let mut state = with_selection();
        let attempt = start_preview(&mut state);
        let preview = artifact(QualityTier::Preview);
        let epoch = state.epoch();
        state.apply(Action::VideoFinished {
            epoch,
            attempt,
            result: Ok(preview.clone()),
        });
        assert_eq!(state.stage(), Stage::Previewing);
        (state, preview)
    }

    fn final_attempt(transition: &Transition) -> u64 {
        match transition.effects.first() {
            Some(Effect::SynthesizeVideo {
                attempt,
                tier: QualityTier::Final,
                ..
            }) => *attempt,
            other => panic!("expected a final render, got {:?}", other),
        }
    }

    fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn submit_moves_to_analyzing_and_requests_analysis() {
        let mut state = PipelineState::new();
        let transition = state.apply(Action::Submit(brief()));

        assert!(transition.is_applied());
        assert_eq!(state.stage(), Stage::Analyzing);
        assert!(matches!(
            transition.effects.as_slice(),
            [Effect::Analyze { epoch: 1, .. }]
        ));
    }

    #[test]
    fn invalid_brief_stays_in_input_with_error() {
        let mut state = PipelineState::new();
        let mut bad = brief();
        bad.description = String::new();

        let transition = state.apply(Action::Submit(bad));

        assert!(!transition.is_applied());
        assert!(transition.effects.is_empty());
        assert_eq!(state.stage(), Stage::Input);
        assert!(state.error().is_some());
    }

    #[test]
    fn analysis_creates_one_pending_slot_per_prompt() {
        let mut state = PipelineState::new();
        state.apply(Action::Submit(brief()));
        let transition = state.apply(Action::AnalysisFinished {
            epoch: 1,
            result: Ok(analysis(&STYLES)),
        });

        assert_eq!(state.stage(), Stage::Selection);
        let campaign = state.campaign().unwrap();
        assert_eq!(campaign.slots.len(), STYLES.len());
        for (i, name) in STYLES.iter().enumerate() {
            let matching: Vec<_> = campaign
                .slots
                .iter()
                .filter(|s| s.style_name == *name)
                .collect();
            assert_eq!(matching.len(), 1);
            assert_eq!(matching[0].id, SlotId(i));
            assert_eq!(matching[0].status(), SlotStatus::Pending);
        }

        let dispatched: Vec<_> = transition
            .effects
            .iter()
            .map(|e| match e {
                Effect::SynthesizeImage { prompt, .. } => prompt.style_name.clone(),
                other => panic!("unexpected effect {:?}", other),
            })
            .collect();
        assert_eq!(dispatched, STYLES);
    }

    #[test]
    fn analysis_failure_returns_to_input_with_error() {
        let mut state = PipelineState::new();
        state.apply(Action::Submit(brief()));
        state.apply(Action::AnalysisFinished {
            epoch: 1,
            result: Err(CampaignError::Analysis("No content in analysis response".into())),
        });

        assert_eq!(state.stage(), Stage::Input);
        assert_eq!(
            state.error(),
            Some("Analysis error: No content in analysis response")
        );
        assert!(state.snapshot().slots.is_empty());
    }

    #[test]
    fn merge_is_independent_of_arrival_order() {
        let outcomes = [true, false, true, true, false, true];
        let mut reference = None;

        for order in permutations(&[0, 1, 2, 3, 4, 5]) {
            let mut state = in_selection();
            for i in order {
                assert!(finish_image(&mut state, STYLES[i], outcomes[i]).is_applied());
            }
            let slots = state.snapshot().slots;
            match &reference {
                None => reference = Some(slots),
                Some(expected) => assert_eq!(&slots, expected),
            }
        }

        let slots = reference.unwrap();
        for (slot, ok) in slots.iter().zip(outcomes) {
            let expected = if ok { SlotStatus::Ready } else { SlotStatus::Failed };
            assert_eq!(slot.status, expected);
        }
    }

    #[test]
    fn repeated_delivery_does_not_change_a_resolved_slot() {
        let mut state = in_selection();
        finish_image(&mut state, "Abstract", true);
        let before = state.snapshot();

        let transition = finish_image(&mut state, "Abstract", false);

        assert_eq!(transition.ignored, Some("slot already resolved"));
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn slot_failure_is_local() {
        let mut state = in_selection();
        finish_image(&mut state, "Surreal", true);
        let before = state.snapshot();

        finish_image(&mut state, "Futurist", false);

        let after = state.snapshot();
        assert_eq!(after.stage, Stage::Selection);
        assert_eq!(after.error, None);
        for (b, a) in before.slots.iter().zip(&after.slots) {
            if a.style_name == "Futurist" {
                assert_eq!(a.status, SlotStatus::Failed);
                assert!(a.error.as_deref().unwrap().contains("no image generated"));
            } else {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn duplicate_style_names_are_updated_together() {
        let mut state = PipelineState::new();
        state.apply(Action::Submit(brief()));
        state.apply(Action::AnalysisFinished {
            epoch: 1,
            result: Ok(analysis(&["A", "B", "A", "C", "D", "E"])),
        });

        finish_image(&mut state, "A", true);

        let slots = state.snapshot().slots;
        assert_eq!(slots[0].status, SlotStatus::Ready);
        assert_eq!(slots[2].status, SlotStatus::Ready);
        assert_eq!(slots[0].image_url, slots[2].image_url);
        assert_eq!(slots[1].status, SlotStatus::Pending);
    }

    #[test]
    fn image_for_unknown_style_is_ignored() {
        let mut state = in_selection();
        let before = state.snapshot();
        assert_eq!(
            finish_image(&mut state, "Vaporwave", true).ignored,
            Some("no slot for style")
        );
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn selecting_a_slot_that_is_not_ready_is_a_no_op() {
        let mut state = in_selection();
        finish_image(&mut state, "Futurist", false);
        let before = state.snapshot();

        assert!(!state.apply(Action::SelectImage(SlotId(0))).is_applied());
        assert!(!state.apply(Action::SelectImage(SlotId(1))).is_applied());
        assert!(!state.apply(Action::SelectImage(SlotId(42))).is_applied());

        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn selecting_replaces_previous_selection() {
        let mut state = in_selection();
        finish_image(&mut state, "Surreal", true);
        finish_image(&mut state, "Clean", true);

        state.apply(Action::SelectImage(SlotId(0)));
        state.apply(Action::SelectImage(SlotId(3)));

        assert_eq!(state.snapshot().selected, Some(SlotId(3)));
    }

    #[test]
    fn preview_requires_a_selection() {
        let mut state = in_selection();
        let transition = state.apply(Action::RequestPreview);
        assert_eq!(transition.ignored, Some("no image selected"));
        assert_eq!(state.stage(), Stage::Selection);
    }

    #[test]
    fn credential_prompt_then_preview_reaches_previewing() {
        let mut state = with_selection();

        let transition = state.apply(Action::RequestPreview);
        let attempt = match transition.effects.as_slice() {
            [Effect::AcquireCredential { attempt, .. }] => *attempt,
            other => panic!("unexpected effects {:?}", other),
        };
        assert_eq!(state.stage(), Stage::Selection);

        state.apply(Action::CredentialMissing { epoch: 1, attempt });
        assert_eq!(state.stage(), Stage::AwaitingCredential);

        let transition = state.apply(Action::CredentialResolved {
            epoch: 1,
            attempt,
            result: Ok(CredentialOutcome::Selected),
        });
        assert_eq!(state.stage(), Stage::Animating);
        match transition.effects.as_slice() {
            [Effect::SynthesizeVideo { tier, image, brief, .. }] => {
                assert_eq!(*tier, QualityTier::Preview);
                assert_eq!(image, &ImageData::new("image/png", vec![5]));
                assert_eq!(brief.camera_movement, CameraMovement::Orbit);
                assert_eq!(brief.aspect_ratio, AspectRatio::Portrait);
            }
            other => panic!("unexpected effects {:?}", other),
        }

        let preview = artifact(QualityTier::Preview);
        state.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Ok(preview.clone()),
        });
        assert_eq!(state.stage(), Stage::Previewing);
        assert_eq!(state.snapshot().preview, Some(preview));
    }

    #[test]
    fn repeated_preview_requests_are_ignored_while_busy() {
        let mut state = with_selection();
        let first = state.apply(Action::RequestPreview);
        let attempt = match first.effects.as_slice() {
            [Effect::AcquireCredential { attempt, .. }] => *attempt,
            other => panic!("unexpected effects {:?}", other),
        };
        assert!(!state.apply(Action::RequestPreview).is_applied());

        state.apply(Action::CredentialMissing { epoch: 1, attempt });
        assert!(!state.apply(Action::RequestPreview).is_applied());
        assert_eq!(state.stage(), Stage::AwaitingCredential);

        state.apply(Action::CredentialResolved {
            epoch: 1,
            attempt,
            result: Ok(CredentialOutcome::Selected),
        });
        let again = state.apply(Action::RequestPreview);
        assert!(!again.is_applied());
        assert!(again.effects.is_empty());
        assert_eq!(state.stage(), Stage::Animating);
    }

    #[test]
    fn cancelled_credential_returns_to_selection_quietly() {
        let mut state = with_selection();
        let transition = state.apply(Action::RequestPreview);
        let Some(Effect::AcquireCredential { attempt, .. }) = transition.effects.first() else {
            panic!("expected a credential check");
        };
        let attempt = *attempt;
        state.apply(Action::CredentialMissing { epoch: 1, attempt });

        state.apply(Action::CredentialResolved {
            epoch: 1,
            attempt,
            result: Ok(CredentialOutcome::Cancelled),
        });

        let snapshot = state.snapshot();
        assert_eq!(snapshot.stage, Stage::Selection);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.selected, Some(SlotId(3)));
    }

    #[test]
    fn credential_gate_failure_is_reported() {
        let mut state = with_selection();
        let transition = state.apply(Action::RequestPreview);
        let Some(Effect::AcquireCredential { attempt, .. }) = transition.effects.first() else {
            panic!("expected a credential check");
        };
        let attempt = *attempt;

        let transition = state.apply(Action::CredentialResolved {
            epoch: 1,
            attempt,
            result: Err(CampaignError::Credential("no key behind selection".into())),
        });

        assert!(transition.effects.is_empty());
        assert_eq!(state.stage(), Stage::Selection);
        assert_eq!(
            state.error(),
            Some("Credential error: no key behind selection")
        );
    }

    #[test]
    fn preview_failure_returns_to_selection_with_message() {
        let mut state = with_selection();
        let attempt = start_preview(&mut state);

        state.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Err(CampaignError::VideoTimedOut { attempts: 120 }),
        });

        assert_eq!(state.stage(), Stage::Selection);
        assert_eq!(state.error(), Some(PREVIEW_FAILED_MESSAGE));
        assert_eq!(state.snapshot().selected, Some(SlotId(3)));
    }

    #[test]
    fn failed_final_keeps_the_preview() {
        let (mut state, preview) = in_previewing();

        let transition = state.apply(Action::ConfirmFinal);
        let attempt = final_attempt(&transition);
        assert_eq!(state.stage(), Stage::Animating);

        let transition = state.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Err(CampaignError::VideoFetch("Failed to download generated video".into())),
        });

        assert!(transition.effects.is_empty());
        let snapshot = state.snapshot();
        assert_eq!(snapshot.stage, Stage::Previewing);
        assert_eq!(snapshot.preview, Some(preview));
        assert_eq!(snapshot.error.as_deref(), Some(FINAL_FAILED_MESSAGE));
    }

    #[test]
    fn final_video_completes_and_releases_preview() {
        let (mut state, preview) = in_previewing();
        let attempt = final_attempt(&state.apply(Action::ConfirmFinal));
        let final_video = artifact(QualityTier::Final);

        let transition = state.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Ok(final_video.clone()),
        });

        assert!(matches!(
            transition.effects.as_slice(),
            [Effect::ReleaseMedia(h)] if *h == preview.handle
        ));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.stage, Stage::Completed);
        assert_eq!(snapshot.final_video, Some(final_video));
        assert_eq!(snapshot.preview, None);
    }

    #[test]
    fn discard_preview_releases_media_and_keeps_selection() {
        let (mut state, preview) = in_previewing();
        let slots_before = state.snapshot().slots;

        let transition = state.apply(Action::DiscardPreview);

        assert!(matches!(
            transition.effects.as_slice(),
            [Effect::ReleaseMedia(h)] if *h == preview.handle
        ));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.stage, Stage::Selection);
        assert_eq!(snapshot.preview, None);
        assert_eq!(snapshot.selected, Some(SlotId(3)));
        assert_eq!(snapshot.slots, slots_before);
    }

    #[test]
    fn video_finishing_after_reset_is_released() {
        let (mut state, _) = in_previewing();
        state.apply(Action::DiscardPreview);

        let attempt = start_preview(&mut state);
        state.apply(Action::Reset);
        let late = artifact(QualityTier::Preview);
        let transition = state.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Ok(late.clone()),
        });

        assert_eq!(state.stage(), Stage::Input);
        assert!(!transition.is_applied());
        assert!(matches!(
            transition.effects.as_slice(),
            [Effect::ReleaseMedia(h)] if *h == late.handle
        ));
    }

    #[test]
    fn duplicate_preview_result_after_discard_is_dropped() {
        let mut state = with_selection();
        let attempt = start_preview(&mut state);
        let preview = artifact(QualityTier::Preview);
        state.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Ok(preview.clone()),
        });
        state.apply(Action::DiscardPreview);

        let duplicate = artifact(QualityTier::Preview);
        let transition = state.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Ok(duplicate.clone()),
        });

        assert_eq!(state.stage(), Stage::Selection);
        assert_eq!(state.snapshot().preview, None);
        assert!(matches!(
            transition.effects.as_slice(),
            [Effect::ReleaseMedia(h)] if *h == duplicate.handle
        ));
    }

    #[test]
    fn reset_from_every_stage_restores_initial_shape() {
        let mut states = vec![PipelineState::new()];

        let mut analyzing = PipelineState::new();
        analyzing.apply(Action::Submit(brief()));
        states.push(analyzing);

        states.push(in_selection());

        let mut awaiting = with_selection();
        let t = awaiting.apply(Action::RequestPreview);
        if let Some(Effect::AcquireCredential { attempt, .. }) = t.effects.first() {
            let attempt = *attempt;
            awaiting.apply(Action::CredentialMissing { epoch: 1, attempt });
        }
        assert_eq!(awaiting.stage(), Stage::AwaitingCredential);
        states.push(awaiting);

        let mut animating = with_selection();
        start_preview(&mut animating);
        states.push(animating);

        let (previewing, _) = in_previewing();
        states.push(previewing);

        let (mut completed, _) = in_previewing();
        let attempt = final_attempt(&completed.apply(Action::ConfirmFinal));
        completed.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Ok(artifact(QualityTier::Final)),
        });
        assert_eq!(completed.stage(), Stage::Completed);
        let completed_releases = 1;
        states.push(completed);

        for mut state in states {
            let stage = state.stage();
            let transition = state.apply(Action::Reset);
            assert!(transition.is_applied());
            assert_eq!(state.snapshot(), PipelineSnapshot::default(), "from {:?}", stage);

            let expected_releases = match stage {
                Stage::Previewing | Stage::Completed => completed_releases,
                _ => 0,
            };
            assert_eq!(transition.effects.len(), expected_releases, "from {:?}", stage);
        }
    }

    #[test]
    fn results_from_before_reset_are_dropped() {
        let mut state = in_selection();
        let old_epoch = state.epoch();
        state.apply(Action::Reset);
        state.apply(Action::Submit(brief()));

        let transition = state.apply(Action::AnalysisFinished {
            epoch: old_epoch,
            result: Ok(analysis(&STYLES)),
        });
        assert!(!transition.is_applied());
        assert_eq!(state.stage(), Stage::Analyzing);

        let transition = state.apply(Action::ImageFinished {
            epoch: old_epoch,
            style_name: "Surreal".to_string(),
            result: Ok(image(1)),
        });
        assert!(!transition.is_applied());
    }

    #[test]
    fn dismiss_error_only_clears_the_banner() {
        let mut state = with_selection();
        let attempt = start_preview(&mut state);
        state.apply(Action::VideoFinished {
            epoch: 1,
            attempt,
            result: Err(CampaignError::VideoSynthesis("boom".into())),
        });
        let mut expected = state.snapshot();
        expected.error = None;

        state.apply(Action::DismissError);

        assert_eq!(state.snapshot(), expected);
    }

    #[test]
    fn submit_is_ignored_while_a_campaign_is_active() {
        let mut state = in_selection();
        let transition = state.apply(Action::Submit(brief()));
        assert_eq!(transition.ignored, Some("a campaign is already in progress"));
        assert_eq!(state.stage(), Stage::Selection);
    }
}
